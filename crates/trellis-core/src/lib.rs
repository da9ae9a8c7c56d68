//! Shared vocabulary for the trellis substitution engine.
//!
//! This crate holds the types every other trellis crate speaks in:
//!
//! - [`ValueKind`] and the descriptor grammar ([`method`])
//! - [`MethodRef`] / [`MethodHash`] method identity
//! - the minimal IR arena ([`Graph`], [`Node`], [`Stamp`])
//! - interpreter-state snapshots ([`FrameState`], [`StateMarker`])
//! - the error hierarchy ([`RegistrationError`], [`BuildError`], [`TrellisError`])
//!
//! Nothing here depends on the registry or the builder; dependency flow is
//! strictly one-way.

pub mod error;
pub mod frame_state;
pub mod graph;
pub mod hash;
pub mod kind;
pub mod method;
pub mod node;
pub mod stamp;

pub use error::{BuildError, RegistrationError, TrellisError};
pub use frame_state::{FrameState, FrameStateId, StateMarker};
pub use graph::Graph;
pub use hash::{MethodHash, TypeHash};
pub use kind::ValueKind;
pub use method::{InvokeKind, MethodRef, ParamSpec, Signature, TypeName};
pub use node::{
    BinaryOp, ConstantValue, DeoptAction, DeoptReason, ExceptionKind, Node, NodeFlags, NodeId,
    NodeOp, UnaryOp,
};
pub use stamp::{IntStamp, ObjectStamp, Stamp};
