//! Interpreter-state snapshots attached to side-effecting nodes.
//!
//! A snapshot records everything needed to resume in the unoptimized
//! interpreter: where (the [`StateMarker`]) and with what (captured operand
//! stack and locals). During intrinsic substitution the exact resume offset
//! inside the substituted body is meaningless to the caller, so snapshots
//! carry placeholder markers relative to the replaced call instead of a
//! real instruction offset; the enclosing translation rewrites placeholders
//! into real states once the intrinsic is stitched in.

use std::fmt;

use crate::kind::ValueKind;
use crate::node::NodeId;

/// Index of a snapshot in its graph's state arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameStateId(u32);

impl FrameStateId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Where a snapshot resumes, relative to the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateMarker {
    /// A concrete instruction offset in the method being translated.
    At(u32),
    /// Placeholder: before the replaced call executed.
    BeforeCall,
    /// Placeholder: after the replaced call completed.
    AfterCall,
    /// Placeholder: after the replaced call completed exceptionally; the
    /// snapshot carries the materialized exception object.
    AfterException,
    /// Resuming here is a compiler bug; the runtime must trap instead.
    Invalid,
}

impl StateMarker {
    /// Whether this marker still needs rewriting by the enclosing
    /// translation.
    #[inline]
    pub const fn is_placeholder(self) -> bool {
        !matches!(self, StateMarker::At(_))
    }

    /// Whether execution may legitimately resume from this snapshot.
    #[inline]
    pub const fn is_resumable(self) -> bool {
        !matches!(self, StateMarker::Invalid)
    }
}

impl fmt::Display for StateMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateMarker::At(offset) => write!(f, "@{offset}"),
            StateMarker::BeforeCall => write!(f, "before-call"),
            StateMarker::AfterCall => write!(f, "after-call"),
            StateMarker::AfterException => write!(f, "after-exception"),
            StateMarker::Invalid => write!(f, "invalid"),
        }
    }
}

/// A captured interpreter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameState {
    pub marker: StateMarker,
    /// Operand stack, bottom first.
    pub stack: Vec<(ValueKind, NodeId)>,
    /// Local variable slots; `None` for dead slots.
    pub locals: Vec<Option<NodeId>>,
    /// The exception object for [`StateMarker::AfterException`] snapshots.
    pub exception_object: Option<NodeId>,
}

impl FrameState {
    /// An empty snapshot carrying only a marker.
    pub fn placeholder(marker: StateMarker) -> Self {
        Self { marker, stack: Vec::new(), locals: Vec::new(), exception_object: None }
    }

    /// A snapshot at a concrete instruction offset.
    pub fn at(offset: u32, stack: Vec<(ValueKind, NodeId)>, locals: Vec<Option<NodeId>>) -> Self {
        Self { marker: StateMarker::At(offset), stack, locals, exception_object: None }
    }

    /// An after-exception snapshot bound to its materialized exception.
    pub fn after_exception(exception: NodeId) -> Self {
        Self {
            marker: StateMarker::AfterException,
            stack: Vec::new(),
            locals: Vec::new(),
            exception_object: Some(exception),
        }
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.marker.is_placeholder()
    }
}
