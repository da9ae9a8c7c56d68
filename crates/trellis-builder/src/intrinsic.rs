//! Identity and snapshot bookkeeping of an extension expansion.
//!
//! While an expansion runs, appended nodes cannot capture real
//! interpreter state: the replacement's interior states do not exist in
//! the original program. [`IntrinsicContext::synthesize_state`] hands out
//! placeholder snapshots instead, following three rules:
//!
//! - the first side-effecting node gets a resumable after-call snapshot;
//!   every later side effect retroactively invalidates the snapshots of
//!   all earlier ones, because only the last effect on a path can stand
//!   in for the replaced call's completed state
//! - an exception-object entry gets an after-exception snapshot bound to
//!   the exception value
//! - a call left for later inlining gets an invalid snapshot immediately
//!   and is never treated as a resumption point
//!
//! Merge-like nodes without their own side effect snapshot as before-call
//! until the first side effect, after-call from then on.

use std::sync::Arc;

use smallvec::SmallVec;

use trellis_core::frame_state::{FrameState, FrameStateId, StateMarker};
use trellis_core::graph::Graph;
use trellis_core::node::NodeId;
use trellis_core::{BuildError, MethodRef};

/// How the body being expanded relates to the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationKind {
    /// Expanded inline while the caller is still being translated.
    InlineDuringParse,
    /// Inlined into an existing graph after its translation finished.
    InlineAfterParse,
    /// The expansion is itself the compilation root.
    RootCompilation,
    /// The expansion roots a graph being encoded for later reuse.
    RootCompilationEncoded,
}

impl CompilationKind {
    /// Whether the expansion roots its own compilation.
    #[inline]
    pub const fn is_root(self) -> bool {
        matches!(
            self,
            CompilationKind::RootCompilation | CompilationKind::RootCompilationEncoded
        )
    }
}

/// Ordered record of the side-effecting nodes an expansion has emitted.
#[derive(Debug, Default)]
pub struct SideEffects {
    nodes: SmallVec<[NodeId; 4]>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any side effect has been recorded yet.
    #[inline]
    pub fn any(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, node: NodeId) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }
}

/// Identity of an expansion in progress: which method is being replaced,
/// what replaces it, and how the result is used.
#[derive(Debug)]
pub struct IntrinsicContext {
    original: Arc<MethodRef>,
    substitute: Arc<MethodRef>,
    kind: CompilationKind,
    side_effects: SideEffects,
}

impl IntrinsicContext {
    /// Root expansions re-execute the original method when they bail out,
    /// so the original must carry an executable body.
    pub fn new(
        original: Arc<MethodRef>,
        substitute: Arc<MethodRef>,
        kind: CompilationKind,
    ) -> Result<Self, BuildError> {
        if kind.is_root() && !original.has_body() {
            return Err(BuildError::RootWithoutBody {
                original: original.to_string(),
            });
        }
        Ok(Self {
            original,
            substitute,
            kind,
            side_effects: SideEffects::new(),
        })
    }

    /// Expansion of a method as its own compilation root.
    pub fn root(method: Arc<MethodRef>) -> Result<Self, BuildError> {
        Self::new(method.clone(), method, CompilationKind::RootCompilation)
    }

    #[inline]
    pub fn original(&self) -> &Arc<MethodRef> {
        &self.original
    }

    #[inline]
    pub fn substitute(&self) -> &Arc<MethodRef> {
        &self.substitute
    }

    #[inline]
    pub fn kind(&self) -> CompilationKind {
        self.kind
    }

    #[inline]
    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    /// Whether the expansion is being inlined into a finished graph.
    #[inline]
    pub fn is_post_parse_inlined(&self) -> bool {
        matches!(self.kind, CompilationKind::InlineAfterParse)
    }

    #[inline]
    pub fn is_compilation_root(&self) -> bool {
        self.kind.is_root()
    }

    /// Whether `target` calls back into the method this expansion
    /// replaces, through either its original or its substitute identity.
    /// Such calls must stay as calls; re-dispatching them would recurse.
    pub fn is_call_to_original(&self, target: &MethodRef) -> bool {
        target == self.original.as_ref() || target == self.substitute.as_ref()
    }

    /// Attach the placeholder snapshot `node` needs, if any, per the rules
    /// in the module docs. Nodes that already carry a snapshot and nodes
    /// that need none are left alone.
    pub fn synthesize_state(&mut self, graph: &mut Graph, node: NodeId) -> Option<FrameStateId> {
        if graph.state_after(node).is_some() {
            return None;
        }
        let (side_effect, deferred_invoke, exception_object, merge_like) = {
            let n = graph.node(node);
            (
                n.has_side_effect(),
                n.is_deferred_invoke(),
                n.is_exception_object(),
                n.is_merge_like(),
            )
        };
        if side_effect {
            // Only the last side effect on a path can stand in for the
            // replaced call's completed state.
            if self.side_effects.any() {
                let invalid = graph.add_state(FrameState::placeholder(StateMarker::Invalid));
                for earlier in self.side_effects.iter() {
                    graph.set_state_after(earlier, invalid);
                }
                tracing::trace!(
                    invalidated = self.side_effects.len(),
                    "retroactively invalidated earlier side-effect snapshots"
                );
            }
            let state = if deferred_invoke {
                graph.add_state(FrameState::placeholder(StateMarker::Invalid))
            } else if exception_object {
                let state = graph.add_state(FrameState::after_exception(node));
                self.side_effects.add(node);
                state
            } else {
                let state = graph.add_state(FrameState::placeholder(StateMarker::AfterCall));
                self.side_effects.add(node);
                state
            };
            graph.set_state_after(node, state);
            Some(state)
        } else if merge_like {
            let marker = if self.side_effects.any() {
                StateMarker::AfterCall
            } else {
                StateMarker::BeforeCall
            };
            let state = graph.add_state(FrameState::placeholder(marker));
            graph.set_state_after(node, state);
            Some(state)
        } else {
            None
        }
    }
}
