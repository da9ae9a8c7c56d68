//! Call-site substitution machinery for the trellis engine.
//!
//! This crate defines the contract between a translator and its
//! graph-building extensions:
//!
//! - [`GraphBuilder`]: the parsing context an extension runs against
//! - [`InvokePlugin`] / [`Receiver`]: the extension interface and the
//!   receiver null-check protocol
//! - [`PluginLookup`] / [`try_substitute`]: call-site dispatch
//! - [`IntrinsicContext`]: identity and snapshot bookkeeping of an
//!   expansion in progress
//! - [`InlinePolicy`] / [`InliningChain`]: the inlining protocol
//! - [`FragmentBuilder`]: standalone expansion of one extension into its
//!   own graph
//!
//! The registry crate implements [`PluginLookup`] on top of these traits;
//! nothing here depends on how bindings are stored.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use trellis_builder::{
//!     BuilderConfig, FragmentBuilder, GraphBuilder, InvokePlugin, Receiver,
//! };
//! use trellis_core::node::{NodeId, UnaryOp};
//! use trellis_core::{InvokeKind, MethodRef, TrellisError, TypeName, ValueKind};
//!
//! struct AbsPlugin;
//!
//! impl InvokePlugin for AbsPlugin {
//!     fn apply(
//!         &self,
//!         b: &mut dyn GraphBuilder,
//!         _method: &Arc<MethodRef>,
//!         _receiver: Option<&mut Receiver>,
//!         args: &[NodeId],
//!     ) -> Result<bool, TrellisError> {
//!         let abs = b.graph_mut().unary(UnaryOp::Abs, ValueKind::I32, args[0]);
//!         b.add_push(ValueKind::I32, abs)?;
//!         Ok(true)
//!     }
//! }
//!
//! let method = Arc::new(MethodRef::new(TypeName::new("demo.Math"), "abs", "(I)I", true));
//! let mut builder =
//!     FragmentBuilder::for_invocation(method, InvokeKind::Static, BuilderConfig::new())?;
//! assert!(builder.expand(&AbsPlugin)?);
//! let graph = builder.finish()?;
//! assert!(graph.node_count() > 0);
//! # Ok::<(), TrellisError>(())
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod fragment;
pub mod inline;
pub mod intrinsic;
pub mod plugin;

pub use config::{BuilderConfig, ExceptionMode};
pub use context::{FAST_PATH_PROBABILITY, GraphBuilder};
pub use dispatch::{PluginLookup, apply_plugin, try_substitute};
pub use fragment::FragmentBuilder;
pub use inline::{InlineDecision, InlinePolicy, InliningChain};
pub use intrinsic::{CompilationKind, IntrinsicContext, SideEffects};
pub use plugin::{FnPlugin, InvokePlugin, Receiver};
