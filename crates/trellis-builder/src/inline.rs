//! The inlining protocol consulted at call sites no extension claimed.
//!
//! Policies form an ordered chain; for each call site the chain probes
//! them in registration order and the first decisive answer wins. A
//! decision either names a body to parse in place of the call or rejects
//! inlining with one of three exception dispositions the translator uses
//! when it emits the call.

use std::fmt;
use std::sync::Arc;

use trellis_core::MethodRef;
use trellis_core::node::NodeId;

use crate::context::GraphBuilder;

/// A decisive answer for one call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineDecision {
    /// Parse `target`'s body into the caller in place of the call.
    Inline { target: Arc<MethodRef> },
    /// Emit the call; it may raise into a local exception handler.
    DoNotInlineWithException,
    /// Emit the call; exceptions propagate without a local handler.
    DoNotInlineNoException,
    /// Emit the call; an exception deoptimizes instead of dispatching to
    /// a handler.
    DoNotInlineDeoptimizeOnException,
}

impl InlineDecision {
    pub fn inline(target: Arc<MethodRef>) -> Self {
        InlineDecision::Inline { target }
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self, InlineDecision::Inline { .. })
    }
}

/// One voice in the inlining decision.
pub trait InlinePolicy: Send + Sync {
    /// This policy's answer for a call to `method` with `args`, or `None`
    /// to defer to the next policy in the chain.
    fn should_inline(
        &self,
        b: &mut dyn GraphBuilder,
        method: &Arc<MethodRef>,
        args: &[NodeId],
    ) -> Option<InlineDecision>;

    /// Called before `method`'s body starts parsing into the caller.
    fn notify_before_inline(&self, method: &Arc<MethodRef>) {
        let _ = method;
    }

    /// Called after `method`'s body finished parsing into the caller.
    fn notify_after_inline(&self, method: &Arc<MethodRef>) {
        let _ = method;
    }

    /// Called when the call was emitted instead of inlined; `invoke` is
    /// the emitted call node.
    fn notify_not_inlined(&self, b: &mut dyn GraphBuilder, method: &Arc<MethodRef>, invoke: NodeId) {
        let _ = (b, method, invoke);
    }
}

/// Ordered chain of inlining policies.
#[derive(Default)]
pub struct InliningChain {
    policies: Vec<Arc<dyn InlinePolicy>>,
}

impl InliningChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a policy; earlier policies answer first.
    pub fn push(&mut self, policy: Arc<dyn InlinePolicy>) {
        self.policies.push(policy);
    }

    /// Builder-style [`push`](InliningChain::push).
    pub fn with(mut self, policy: Arc<dyn InlinePolicy>) -> Self {
        self.push(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// The first decisive answer, probing policies in registration order.
    /// Policies after the deciding one are not consulted.
    pub fn decide(
        &self,
        b: &mut dyn GraphBuilder,
        method: &Arc<MethodRef>,
        args: &[NodeId],
    ) -> Option<InlineDecision> {
        for policy in &self.policies {
            if let Some(decision) = policy.should_inline(b, method, args) {
                tracing::trace!(method = %method, ?decision, "inlining decision");
                return Some(decision);
            }
        }
        None
    }

    /// Broadcast to every policy, regardless of which one decided.
    pub fn notify_before_inline(&self, method: &Arc<MethodRef>) {
        for policy in &self.policies {
            policy.notify_before_inline(method);
        }
    }

    /// Broadcast to every policy, regardless of which one decided.
    pub fn notify_after_inline(&self, method: &Arc<MethodRef>) {
        for policy in &self.policies {
            policy.notify_after_inline(method);
        }
    }

    /// Broadcast to every policy after a call was emitted rather than
    /// inlined.
    pub fn notify_not_inlined(
        &self,
        b: &mut dyn GraphBuilder,
        method: &Arc<MethodRef>,
        invoke: NodeId,
    ) {
        for policy in &self.policies {
            policy.notify_not_inlined(b, method, invoke);
        }
    }
}

impl fmt::Debug for InliningChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InliningChain")
            .field("policies", &self.policies.len())
            .finish()
    }
}
