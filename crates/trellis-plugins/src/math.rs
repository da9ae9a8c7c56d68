//! Substitutions for `lang.Math`.
//!
//! Every substitution here pushes a single pure node, so none of them
//! involves an interpreter-state snapshot. `abs` is registered twice to
//! show descriptor-driven overload selection.

use std::sync::Arc;

use trellis_builder::{FnPlugin, GraphBuilder, Receiver};
use trellis_core::node::{BinaryOp, NodeId, UnaryOp};
use trellis_core::{MethodRef, ParamSpec, RegistrationError, Signature, TrellisError, ValueKind};
use trellis_registry::{Binding, PluginRegistry};

/// Declaring type of the math intrinsics.
pub const MATH_TYPE: &str = "lang.Math";

fn abs_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b.graph_mut().unary(UnaryOp::Abs, ValueKind::I32, args[0]);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn abs_i64(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b.graph_mut().unary(UnaryOp::Abs, ValueKind::I64, args[0]);
    b.add_push(ValueKind::I64, result)?;
    Ok(true)
}

fn min_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b
        .graph_mut()
        .binary(BinaryOp::Min, ValueKind::I32, args[0], args[1]);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn max_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b
        .graph_mut()
        .binary(BinaryOp::Max, ValueKind::I32, args[0], args[1]);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn sqrt_f64(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b.graph_mut().unary(UnaryOp::Sqrt, ValueKind::F64, args[0]);
    b.add_push(ValueKind::F64, result)?;
    Ok(true)
}

/// Register the `lang.Math` suite.
pub fn register(registry: &PluginRegistry) -> Result<(), RegistrationError> {
    let math = registry.register(MATH_TYPE);
    let i32_arg = || Signature::of([ParamSpec::Kind(ValueKind::I32)]);
    let i32_pair = || {
        Signature::of([
            ParamSpec::Kind(ValueKind::I32),
            ParamSpec::Kind(ValueKind::I32),
        ])
    };

    math.register(Binding::new("abs", i32_arg()?, FnPlugin::arc(abs_i32)))?;
    math.register(Binding::new(
        "abs",
        Signature::of([ParamSpec::Kind(ValueKind::I64)])?,
        FnPlugin::arc(abs_i64),
    ))?;
    math.register(Binding::new("min", i32_pair()?, FnPlugin::arc(min_i32)))?;
    math.register(Binding::new("max", i32_pair()?, FnPlugin::arc(max_i32)))?;
    math.register(Binding::new(
        "sqrt",
        Signature::of([ParamSpec::Kind(ValueKind::F64)])?,
        FnPlugin::arc(sqrt_f64),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use trellis_builder::{BuilderConfig, FragmentBuilder};
    use trellis_core::node::NodeOp;
    use trellis_core::{Graph, InvokeKind, TypeName};

    use super::*;

    fn expand_static(name: &str, descriptor: &str) -> Graph {
        let registry = PluginRegistry::new();
        register(&registry).unwrap();
        registry.seal().unwrap();

        let method = Arc::new(MethodRef::new(
            TypeName::new(MATH_TYPE),
            name,
            descriptor,
            true,
        ));
        let plugin = registry.lookup(&method).unwrap().unwrap();
        let mut b =
            FragmentBuilder::for_invocation(method, InvokeKind::Static, BuilderConfig::new())
                .unwrap();
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
    fn abs_becomes_a_pure_unary_node() {
        let graph = expand_static("abs", "(I)I");
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Unary {
                    op: UnaryOp::Abs,
                    kind: ValueKind::I32
                }
            )),
            1
        );
        assert_eq!(count_ops(&graph, |op| matches!(op, NodeOp::Invoke { .. })), 0);
    }

    #[test]
    fn abs_overloads_select_by_descriptor() {
        let graph = expand_static("abs", "(J)J");
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Unary {
                    op: UnaryOp::Abs,
                    kind: ValueKind::I64
                }
            )),
            1
        );
    }

    #[test]
    fn min_and_max_become_binary_nodes() {
        let graph = expand_static("min", "(II)I");
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Binary {
                    op: BinaryOp::Min,
                    ..
                }
            )),
            1
        );

        let graph = expand_static("max", "(II)I");
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Binary {
                    op: BinaryOp::Max,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn sqrt_keeps_the_float_kind() {
        let graph = expand_static("sqrt", "(D)D");
        assert_eq!(
            count_ops(&graph, |op| matches!(
                op,
                NodeOp::Unary {
                    op: UnaryOp::Sqrt,
                    kind: ValueKind::F64
                }
            )),
            1
        );
    }
}
