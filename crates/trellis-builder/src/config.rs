//! Translator configuration consulted by the parsing context.

/// How implicit runtime checks are materialized in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionMode {
    /// Emit a compare-and-branch to a constructed exception for every
    /// implicit check. Used when the runtime cannot deoptimize, or when a
    /// profile says the exceptional path is actually taken.
    Explicit,
    /// Emit guards that leave compiled code when they fail. The default
    /// speculative mode.
    #[default]
    Guard,
}

impl ExceptionMode {
    /// Whether implicit checks must become explicit branches.
    #[inline]
    pub const fn is_explicit(self) -> bool {
        matches!(self, ExceptionMode::Explicit)
    }
}

/// Configuration shared by every builder of one compilation.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    exception_mode: ExceptionMode,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exception_mode(mut self, mode: ExceptionMode) -> Self {
        self.exception_mode = mode;
        self
    }

    #[inline]
    pub const fn exception_mode(&self) -> ExceptionMode {
        self.exception_mode
    }
}
