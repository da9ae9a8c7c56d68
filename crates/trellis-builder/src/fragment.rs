//! A self-contained builder that expands one extension into a fresh
//! graph, with no surrounding interpreter translation.
//!
//! Fragments root an extension as its own compilation: parameters stand
//! in for the call arguments, control flow is the straight line from
//! entry to return plus whatever exception edges the expansion emits, and
//! [`finish`](FragmentBuilder::finish) seals the graph with a return of
//! the method's declared kind.

use std::sync::Arc;

use smallvec::SmallVec;

use trellis_core::frame_state::FrameState;
use trellis_core::graph::Graph;
use trellis_core::node::{ExceptionKind, NodeId, NodeOp};
use trellis_core::stamp::{ObjectStamp, Stamp};
use trellis_core::{BuildError, InvokeKind, MethodRef, TrellisError, ValueKind};

use crate::config::BuilderConfig;
use crate::context::GraphBuilder;
use crate::dispatch::{self, PluginLookup};
use crate::intrinsic::IntrinsicContext;
use crate::plugin::InvokePlugin;

/// Standalone expansion of one extension into its own graph.
pub struct FragmentBuilder<'a> {
    graph: Graph,
    config: BuilderConfig,
    method: Arc<MethodRef>,
    invoke_kind: InvokeKind,
    intrinsic: Option<IntrinsicContext>,
    plugins: Option<&'a dyn PluginLookup>,
    args: SmallVec<[NodeId; 8]>,
    stack: Vec<(ValueKind, NodeId)>,
    last_fixed: NodeId,
}

impl<'a> FragmentBuilder<'a> {
    /// A fragment for expanding `method`'s extension, with parameter
    /// nodes standing in for the call arguments (receiver first for
    /// non-static methods).
    pub fn for_invocation(
        method: Arc<MethodRef>,
        invoke_kind: InvokeKind,
        config: BuilderConfig,
    ) -> Result<Self, BuildError> {
        let mut graph = Graph::new();
        let entry = graph.create(NodeOp::Begin, &[]);
        let mut args = SmallVec::new();
        let mut index = 0u16;
        if !method.is_static() {
            args.push(graph.parameter(index, Stamp::Object(ObjectStamp::any())));
            index += 1;
        }
        for kind in method.param_kinds()? {
            args.push(graph.parameter(index, Stamp::for_kind(kind)));
            index += 1;
        }
        Ok(Self {
            graph,
            config,
            method,
            invoke_kind,
            intrinsic: None,
            plugins: None,
            args,
            stack: Vec::new(),
            last_fixed: entry,
        })
    }

    /// Attach the expansion identity. Appended side effects then get
    /// placeholder snapshots instead of concrete ones.
    pub fn with_intrinsic(mut self, intrinsic: IntrinsicContext) -> Self {
        self.intrinsic = Some(intrinsic);
        self
    }

    /// Let replaced calls emitted by the expansion go through extension
    /// dispatch again before falling back to a call node.
    pub fn with_plugins(mut self, plugins: &'a dyn PluginLookup) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Call-site argument nodes, receiver first for non-static methods.
    pub fn args(&self) -> &[NodeId] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> NodeId {
        self.args[index]
    }

    /// Apply `plugin` to this fragment's method over its parameter nodes.
    pub fn expand(&mut self, plugin: &dyn InvokePlugin) -> Result<bool, TrellisError> {
        let method = self.method.clone();
        let args = self.args.clone();
        dispatch::apply_plugin(self, plugin, &method, &args)
    }

    /// Seal the fragment with a return of the method's declared kind and
    /// hand back the finished graph.
    pub fn finish(mut self) -> Result<Graph, BuildError> {
        let ret = self.method.return_kind()?;
        let ret_node = if ret == ValueKind::Void {
            self.graph.create(NodeOp::Return, &[])
        } else {
            let value = self.pop(ret)?;
            self.graph.create(NodeOp::Return, &[value])
        };
        self.append(ret_node)?;
        Ok(self.graph)
    }

    /// Attach the snapshot a freshly wired fixed node needs: placeholders
    /// while an expansion is in progress, a concrete snapshot of the
    /// fragment's state otherwise.
    fn attach_state(&mut self, node: NodeId) {
        if self.graph.state_after(node).is_some() {
            return;
        }
        if let Some(intrinsic) = self.intrinsic.as_mut() {
            intrinsic.synthesize_state(&mut self.graph, node);
        } else if self.graph.node(node).has_side_effect() {
            let state = self
                .graph
                .add_state(FrameState::at(0, self.stack.clone(), Vec::new()));
            self.graph.set_state_after(node, state);
        }
    }
}

impl GraphBuilder for FragmentBuilder<'_> {
    fn graph(&self) -> &Graph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn method(&self) -> &Arc<MethodRef> {
        &self.method
    }

    fn code_offset(&self) -> u32 {
        0
    }

    fn invoke_kind(&self) -> InvokeKind {
        self.invoke_kind
    }

    fn parent(&self) -> Option<&dyn GraphBuilder> {
        None
    }

    fn intrinsic(&self) -> Option<&IntrinsicContext> {
        self.intrinsic.as_ref()
    }

    fn intrinsic_mut(&mut self) -> Option<&mut IntrinsicContext> {
        self.intrinsic.as_mut()
    }

    fn push(&mut self, kind: ValueKind, value: NodeId) -> Result<(), BuildError> {
        if kind == ValueKind::Void {
            return Err(BuildError::VoidOnStack);
        }
        self.stack.push((kind.stack_kind(), value));
        Ok(())
    }

    fn pop(&mut self, kind: ValueKind) -> Result<NodeId, BuildError> {
        let (found, value) = self.stack.pop().ok_or(BuildError::StackUnderflow)?;
        let expected = kind.stack_kind();
        if found != expected {
            return Err(BuildError::KindMismatch { expected, found });
        }
        Ok(value)
    }

    fn append(&mut self, node: NodeId) -> Result<NodeId, BuildError> {
        if self.graph.node(node).is_floating() {
            return Ok(self.graph.unique(node));
        }
        // A node whose successors are already wired (a branch) keeps
        // them; anything else continues the straight line.
        if self.graph.node(self.last_fixed).successors.is_empty() {
            self.graph.set_next(self.last_fixed, node);
        }
        self.last_fixed = node;
        self.attach_state(node);
        Ok(node)
    }

    fn exception_edge(
        &mut self,
        kind: ExceptionKind,
        args: &[NodeId],
    ) -> Result<NodeId, BuildError> {
        let exception = self.graph.create(NodeOp::ExceptionObject(kind), args);
        self.attach_state(exception);
        let raise = self.graph.create(NodeOp::Raise(kind), &[exception]);
        self.graph.set_next(exception, raise);
        tracing::trace!(kind = %kind, "built exception edge");
        Ok(exception)
    }

    fn handle_replaced_invoke(
        &mut self,
        kind: InvokeKind,
        method: Arc<MethodRef>,
        args: &[NodeId],
        _force_inline: bool,
    ) -> Result<(), TrellisError> {
        // Calls back into the replaced method always stay as calls.
        let recursive = self
            .intrinsic
            .as_ref()
            .is_some_and(|ctx| ctx.is_call_to_original(&method));
        if !recursive {
            if let Some(plugins) = self.plugins {
                if dispatch::try_substitute(self, plugins, &method, args)? {
                    return Ok(());
                }
            }
        }
        let invoke = self.graph.invoke(method.clone(), kind, args)?;
        self.append(invoke)?;
        let ret = method.return_kind()?;
        if ret != ValueKind::Void {
            self.push(ret, invoke)?;
        }
        tracing::trace!(method = %method, "replaced call emitted as call node");
        Ok(())
    }
}
