//! Behavior switches for a [`PluginRegistry`](crate::registry::PluginRegistry).

/// Options fixed at registry construction.
///
/// # Example
///
/// ```
/// use trellis_registry::options::RegistryOptions;
///
/// let options = RegistryOptions::new()
///     .with_disabled_plugins("demo.Math.abs,demo.Math.min")
///     .with_warn_missing(true);
/// assert_eq!(options.disabled_plugins(), Some("demo.Math.abs,demo.Math.min"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Comma-separated `Type.method` patterns (with `*` wildcards) naming
    /// plugins to suppress at lookup time. Plugins that report
    /// `can_be_disabled() == false` ignore the filter.
    disabled_plugins: Option<String>,

    /// Log a warning when a lookup that was expected to hit a plugin
    /// comes back empty.
    warn_missing: bool,

    /// Log the full binding table when the registry is sealed.
    dump_on_seal: bool,
}

impl RegistryOptions {
    /// Default options: no filter, quiet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the disabled-plugin filter patterns.
    pub fn with_disabled_plugins(mut self, patterns: impl Into<String>) -> Self {
        self.disabled_plugins = Some(patterns.into());
        self
    }

    /// Warn when [`notify_no_plugin`](crate::registry::PluginRegistry::notify_no_plugin)
    /// fires.
    pub fn with_warn_missing(mut self, warn: bool) -> Self {
        self.warn_missing = warn;
        self
    }

    /// Dump the binding table when the registry is sealed.
    pub fn with_dump_on_seal(mut self, dump: bool) -> Self {
        self.dump_on_seal = dump;
        self
    }

    /// The raw filter pattern string, if one was set.
    pub fn disabled_plugins(&self) -> Option<&str> {
        self.disabled_plugins.as_deref()
    }

    /// Whether missing-plugin notifications log a warning.
    pub fn warn_missing(&self) -> bool {
        self.warn_missing
    }

    /// Whether sealing dumps the binding table.
    pub fn dump_on_seal(&self) -> bool {
        self.dump_on_seal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quiet_and_unfiltered() {
        let options = RegistryOptions::new();
        assert_eq!(options.disabled_plugins(), None);
        assert!(!options.warn_missing());
        assert!(!options.dump_on_seal());
    }

    #[test]
    fn builder_setters_accumulate() {
        let options = RegistryOptions::new()
            .with_disabled_plugins("demo.*")
            .with_warn_missing(true)
            .with_dump_on_seal(true);
        assert_eq!(options.disabled_plugins(), Some("demo.*"));
        assert!(options.warn_missing());
        assert!(options.dump_on_seal());
    }
}
