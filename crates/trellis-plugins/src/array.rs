//! Substitutions for `lang.Array`.
//!
//! Unlike the arithmetic suites these touch program state: `alloc` emits
//! a side-effecting allocation (preceded by a negative-size check), and
//! `length` must null-check its receiver before reading.

use std::sync::Arc;

use trellis_builder::{FnPlugin, GraphBuilder, Receiver};
use trellis_core::node::NodeId;
use trellis_core::{MethodRef, ParamSpec, RegistrationError, Signature, TrellisError, ValueKind};
use trellis_registry::{Binding, PluginRegistry};

/// Declaring type of the array intrinsics.
pub const ARRAY_TYPE: &str = "lang.Array";

fn alloc_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let length = b.maybe_emit_negative_array_size_check(args[0])?;
    let array = b.graph_mut().new_array(ValueKind::I32, length);
    b.add_push(ValueKind::Ref, array)?;
    Ok(true)
}

fn length(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    receiver: Option<&mut Receiver>,
    _args: &[NodeId],
) -> Result<bool, TrellisError> {
    let Some(receiver) = receiver else {
        return Ok(false);
    };
    let array = receiver.get(b)?;
    let result = b.graph_mut().array_length(array);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

/// Register the `lang.Array` suite.
pub fn register(registry: &PluginRegistry) -> Result<(), RegistrationError> {
    let array = registry.register(ARRAY_TYPE);
    array.register(Binding::new(
        "alloc",
        Signature::of([ParamSpec::Kind(ValueKind::I32)])?,
        FnPlugin::arc(alloc_i32),
    ))?;
    array.register(Binding::new(
        "length",
        Signature::of([ParamSpec::Receiver])?,
        FnPlugin::arc(length),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use trellis_builder::{BuilderConfig, ExceptionMode, FragmentBuilder};
    use trellis_core::node::{ExceptionKind, NodeOp};
    use trellis_core::{Graph, InvokeKind, TypeName};

    use super::*;

    fn expand(
        name: &str,
        descriptor: &str,
        is_static: bool,
        mode: ExceptionMode,
    ) -> Graph {
        let registry = PluginRegistry::new();
        register(&registry).unwrap();
        registry.seal().unwrap();

        let method = Arc::new(MethodRef::new(
            TypeName::new(ARRAY_TYPE),
            name,
            descriptor,
            is_static,
        ));
        let plugin = registry.lookup(&method).unwrap().unwrap();
        let kind = if is_static {
            InvokeKind::Static
        } else {
            InvokeKind::Virtual
        };
        let config = BuilderConfig::new().with_exception_mode(mode);
        let mut b = FragmentBuilder::for_invocation(method, kind, config).unwrap();
        assert!(b.expand(plugin.as_ref()).unwrap());
        b.finish().unwrap()
    }

    fn count_ops(graph: &Graph, matcher: impl Fn(&NodeOp) -> bool) -> usize {
        graph
            .node_ids()
            .filter(|&id| matcher(&graph.node(id).op))
            .count()
    }

    #[test]
    fn alloc_checks_the_size_then_allocates() {
        let graph = expand("alloc", "(I)[I", true, ExceptionMode::Explicit);
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Raise(ExceptionKind::NegativeArraySize)
            )),
            1
        );
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::NewArray {
                    element: ValueKind::I32
                }
            )),
            1
        );
    }

    #[test]
    fn alloc_in_guard_mode_allocates_without_a_branch() {
        let graph = expand("alloc", "(I)[I", true, ExceptionMode::Guard);
        assert_eq!(count_ops(&graph, |op| matches!(op, NodeOp::Raise(_))), 0);
        assert_eq!(
            count_ops(&graph, |op| matches!(op, NodeOp::NewArray { .. })),
            1
        );
    }

    #[test]
    fn length_null_checks_the_receiver() {
        let graph = expand("length", "()I", false, ExceptionMode::Guard);
        // guard-mode null check materializes as a guard on the receiver
        assert_eq!(count_ops(&graph, |op| matches!(op, NodeOp::Guard { .. })), 1);
        assert_eq!(
            count_ops(&graph, |op| matches!(op, NodeOp::ArrayLength)),
            1
        );
    }
}
