//! Trellis: call-site substitution for graph-building translators.
//!
//! A translator walking a method body hands every invocation to this
//! engine before emitting a plain call node. If a plugin is bound for
//! the callee, the plugin builds replacement IR inline; otherwise the
//! call goes through untouched. The engine is split into four crates,
//! re-exported here under short names:
//!
//! - [`core`]: descriptors, method identity, the IR arena, errors
//! - [`registry`]: binding storage, deferred and late registration,
//!   lookup ([`PluginRegistry`](registry::PluginRegistry))
//! - [`builder`]: the [`GraphBuilder`](builder::GraphBuilder) contract,
//!   plugin dispatch, intrinsic bookkeeping, the inlining protocol
//! - [`plugins`]: the standard `lang.*` substitution suites
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use trellis::prelude::*;
//!
//! // Host side: fill a registry and seal it before translation starts.
//! let registry = PluginRegistry::new();
//! register_standard(&registry)?;
//! registry.seal()?;
//!
//! // Translator side: a static call to lang.Math.abs(I)I is about to
//! // be emitted; probe for a substitution instead.
//! let method = Arc::new(MethodRef::new(
//!     TypeName::new(trellis::plugins::MATH_TYPE),
//!     "abs",
//!     "(I)I",
//!     true,
//! ));
//! let plugin = registry.lookup(&method)?.expect("abs is bound");
//!
//! let mut builder = FragmentBuilder::for_invocation(
//!     Arc::clone(&method),
//!     InvokeKind::Static,
//!     BuilderConfig::new(),
//! )?;
//! assert!(builder.expand(plugin.as_ref())?);
//! let graph = builder.finish()?;
//! assert!(graph.node_count() > 0);
//! # Ok::<(), TrellisError>(())
//! ```

pub use trellis_builder as builder;
pub use trellis_core as core;
pub use trellis_plugins as plugins;
pub use trellis_registry as registry;

// Re-export the working set
pub mod prelude {
    pub use crate::builder::{
        BuilderConfig, CompilationKind, ExceptionMode, FnPlugin, FragmentBuilder, GraphBuilder,
        InlineDecision, InlinePolicy, InliningChain, IntrinsicContext, InvokePlugin, PluginLookup,
        Receiver, SideEffects, apply_plugin, try_substitute,
    };
    pub use crate::core::node::{BinaryOp, ExceptionKind, NodeId, NodeOp, UnaryOp};
    pub use crate::core::{
        BuildError, FrameState, Graph, InvokeKind, MethodRef, ParamSpec, RegistrationError,
        Signature, StateMarker, TrellisError, TypeName, ValueKind,
    };
    pub use crate::plugins::register_standard;
    pub use crate::registry::{
        Binding, HostResolver, LateRegistration, MethodFilter, PluginRegistry, Registration,
        RegistryOptions, TypeHandle,
    };
}
