//! The extension interface: what a registered plugin implements and how
//! it reaches the receiver of a non-static call.

use std::fmt;
use std::sync::Arc;

use trellis_core::node::NodeId;
use trellis_core::{BuildError, MethodRef, TrellisError};

use crate::context::GraphBuilder;

/// A graph-building extension bound to a method.
///
/// When a call site matches its binding, [`apply`](InvokePlugin::apply)
/// runs against the builder. Returning `Ok(true)` means the call was
/// substituted: the plugin has appended replacement nodes and pushed the
/// result if the method returns one. Returning `Ok(false)` declines the
/// call site and must leave the builder untouched.
///
/// For a non-static call, a plugin that substitutes must null-check the
/// receiver through [`Receiver::get`] at least once; the dispatch driver
/// rejects a substitution that never did.
pub trait InvokePlugin: Send + Sync {
    fn apply(
        &self,
        b: &mut dyn GraphBuilder,
        method: &Arc<MethodRef>,
        receiver: Option<&mut Receiver>,
        args: &[NodeId],
    ) -> Result<bool, TrellisError>;

    /// Optional plugins bind to methods that may not exist in the host;
    /// registering one against an unresolvable method is skipped instead
    /// of failing.
    fn is_optional(&self) -> bool {
        false
    }

    /// Whether the disabled-extensions filter may suppress this plugin.
    /// Plugins the translator depends on for correctness return `false`.
    fn can_be_disabled(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn InvokePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokePlugin").finish_non_exhaustive()
    }
}

/// [`InvokePlugin`] backed by a closure.
pub struct FnPlugin<F> {
    apply: F,
    optional: bool,
    can_be_disabled: bool,
}

impl<F> FnPlugin<F>
where
    F: Fn(
            &mut dyn GraphBuilder,
            &Arc<MethodRef>,
            Option<&mut Receiver>,
            &[NodeId],
        ) -> Result<bool, TrellisError>
        + Send
        + Sync,
{
    pub fn new(apply: F) -> Self {
        Self {
            apply,
            optional: false,
            can_be_disabled: true,
        }
    }

    /// Mark the plugin optional: registration against a method the host
    /// cannot resolve is skipped instead of failing.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Exempt the plugin from the disabled-extensions filter.
    pub fn required(mut self) -> Self {
        self.can_be_disabled = false;
        self
    }

    /// Shorthand for the shared handle bindings are stored as.
    pub fn arc(apply: F) -> Arc<dyn InvokePlugin>
    where
        F: 'static,
    {
        Arc::new(Self::new(apply))
    }
}

impl<F> InvokePlugin for FnPlugin<F>
where
    F: Fn(
            &mut dyn GraphBuilder,
            &Arc<MethodRef>,
            Option<&mut Receiver>,
            &[NodeId],
        ) -> Result<bool, TrellisError>
        + Send
        + Sync,
{
    fn apply(
        &self,
        b: &mut dyn GraphBuilder,
        method: &Arc<MethodRef>,
        receiver: Option<&mut Receiver>,
        args: &[NodeId],
    ) -> Result<bool, TrellisError> {
        (self.apply)(b, method, receiver, args)
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn can_be_disabled(&self) -> bool {
        self.can_be_disabled
    }
}

/// Lazy access to the receiver of a non-static call.
///
/// The first [`get`](Receiver::get) emits the null check the builder's
/// mode requires and caches the refined value; later calls reuse it, so
/// at most one check reaches the graph per call site.
pub struct Receiver {
    value: NodeId,
    checked: Option<NodeId>,
}

impl Receiver {
    pub fn new(value: NodeId) -> Self {
        Self {
            value,
            checked: None,
        }
    }

    /// The receiver, null-checked in the builder's current mode.
    pub fn get(&mut self, b: &mut dyn GraphBuilder) -> Result<NodeId, BuildError> {
        if let Some(checked) = self.checked {
            return Ok(checked);
        }
        let checked = b.null_checked_value(self.value)?;
        self.checked = Some(checked);
        Ok(checked)
    }

    /// The raw receiver value, without the null check. For plugins that
    /// inspect the receiver before deciding whether to substitute.
    pub fn peek(&self) -> NodeId {
        self.value
    }

    /// Whether [`get`](Receiver::get) has run.
    pub fn was_checked(&self) -> bool {
        self.checked.is_some()
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::node::NodeOp;
    use trellis_core::{InvokeKind, TypeName};

    use super::*;
    use crate::config::BuilderConfig;
    use crate::fragment::FragmentBuilder;

    fn instance_builder() -> FragmentBuilder<'static> {
        let method = Arc::new(MethodRef::new(
            TypeName::new("demo.Vec"),
            "len",
            "()I",
            false,
        ));
        FragmentBuilder::for_invocation(method, InvokeKind::Virtual, BuilderConfig::new()).unwrap()
    }

    fn guard_count(b: &FragmentBuilder<'_>) -> usize {
        b.graph()
            .node_ids()
            .filter(|&id| matches!(b.graph().node(id).op, NodeOp::Guard { .. }))
            .count()
    }

    #[test]
    fn receiver_checks_lazily_and_at_most_once() {
        let mut b = instance_builder();
        let mut receiver = Receiver::new(b.arg(0));
        assert!(!receiver.was_checked());
        assert_eq!(guard_count(&b), 0);

        let first = receiver.get(&mut b).unwrap();
        assert!(receiver.was_checked());
        assert_eq!(guard_count(&b), 1);

        let second = receiver.get(&mut b).unwrap();
        assert_eq!(first, second);
        assert_eq!(guard_count(&b), 1);
    }

    #[test]
    fn peek_does_not_count_as_a_check() {
        let b = instance_builder();
        let receiver = Receiver::new(b.arg(0));
        assert_eq!(receiver.peek(), b.arg(0));
        assert!(!receiver.was_checked());
        assert_eq!(guard_count(&b), 0);
    }

    #[test]
    fn closure_plugin_defaults() {
        let plugin = FnPlugin::new(|_b, _method, _receiver, _args| Ok(false));
        assert!(!plugin.is_optional());
        assert!(plugin.can_be_disabled());

        let plugin = FnPlugin::new(|_b, _method, _receiver, _args| Ok(false))
            .optional()
            .required();
        assert!(plugin.is_optional());
        assert!(!plugin.can_be_disabled());
    }
}
