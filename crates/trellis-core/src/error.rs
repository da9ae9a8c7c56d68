//! Error types for the substitution engine.
//!
//! Two phases, two enums:
//!
//! - [`RegistrationError`]: registry misconfiguration discovered while
//!   registering or resolving bindings. These are programming errors of the
//!   compiler integration, not guest-program faults; hosts abort on them.
//!   The enum is `Clone + PartialEq` because a failure recorded during the
//!   one-shot deferred flush is cached and replayed verbatim on every
//!   later lookup.
//! - [`BuildError`]: parsing-context contract violations while an
//!   extension runs (kind mismatches, arity mismatches, malformed
//!   descriptors). Also fatal to the enclosing compilation.
//!
//! Guest-visible failures (a null receiver, a zero divisor) are never
//! errors here; they become guards or explicit exception edges in the
//! graph.

use thiserror::Error;

use crate::kind::ValueKind;

/// Fatal registration-phase errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate binding {declaring}.{name}{descriptor} (overwrite not allowed)")]
    DuplicateBinding {
        declaring: String,
        name: String,
        descriptor: String,
    },

    #[error("registry is sealed; registration is closed")]
    Sealed,

    #[error("late registration chain is closed")]
    LateRegistrationClosed,

    #[error("late bindings already registered for {declaring}")]
    DuplicateLateRegistration { declaring: String },

    #[error("deferred registration task queued after the first lookup")]
    DeferredAfterFlush,

    #[error("recursive deferred registration: flush re-entered from its own task")]
    RecursiveDeferredFlush,

    #[error("required type {name} did not resolve")]
    UnresolvedType { name: String },

    #[error("required method {declaring}.{name}{descriptor} did not resolve")]
    UnresolvedMethod {
        declaring: String,
        name: String,
        descriptor: String,
    },

    #[error("invalid plugin signature: {reason}")]
    InvalidSignature { reason: String },
}

/// Fatal parsing-context contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("operand stack kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("void cannot be pushed on the operand stack")]
    VoidOnStack,

    #[error("plugin for {method} received {found} arguments, expected {expected}")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("plugin for {method} succeeded without null-checking the receiver")]
    UncheckedReceiver { method: String },

    #[error("malformed method descriptor {descriptor}")]
    MalformedDescriptor { descriptor: String },

    #[error("intrinsic for {original} cannot root a compilation: no executable body")]
    RootWithoutBody { original: String },
}

/// Unified error type for embedders that funnel both phases into one
/// result channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrellisError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl TrellisError {
    pub fn is_registration(&self) -> bool {
        matches!(self, TrellisError::Registration(_))
    }

    pub fn is_build(&self) -> bool {
        matches!(self, TrellisError::Build(_))
    }
}
