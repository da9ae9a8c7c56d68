//! Substitutions for `lang.Integer`.
//!
//! `divide` is the interesting one: the quotient node itself is pure, so
//! the plugin asks the builder for a zero check first. In explicit mode
//! that becomes a branch to a raise; in guard mode the division traps
//! through the runtime and no check is emitted.

use std::sync::Arc;

use trellis_builder::{FnPlugin, GraphBuilder, Receiver};
use trellis_core::node::{BinaryOp, NodeId, UnaryOp};
use trellis_core::{MethodRef, ParamSpec, RegistrationError, Signature, TrellisError, ValueKind};
use trellis_registry::{Binding, PluginRegistry};

/// Declaring type of the integer intrinsics.
pub const INTEGER_TYPE: &str = "lang.Integer";

fn reverse_bytes_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b
        .graph_mut()
        .unary(UnaryOp::ReverseBytes, ValueKind::I32, args[0]);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn reverse_bytes_i64(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b
        .graph_mut()
        .unary(UnaryOp::ReverseBytes, ValueKind::I64, args[0]);
    b.add_push(ValueKind::I64, result)?;
    Ok(true)
}

fn divide_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let divisor = b.maybe_emit_division_by_zero_check(args[1])?;
    let result = b
        .graph_mut()
        .binary(BinaryOp::Div, ValueKind::I32, args[0], divisor);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn divide_unsigned_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let divisor = b.maybe_emit_division_by_zero_check(args[1])?;
    let result = b
        .graph_mut()
        .binary(BinaryOp::UDiv, ValueKind::I32, args[0], divisor);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

fn saturating_add_i32(
    b: &mut dyn GraphBuilder,
    _method: &Arc<MethodRef>,
    _receiver: Option<&mut Receiver>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let result = b
        .graph_mut()
        .binary(BinaryOp::SatAdd, ValueKind::I32, args[0], args[1]);
    b.add_push(ValueKind::I32, result)?;
    Ok(true)
}

/// Register the `lang.Integer` suite.
pub fn register(registry: &PluginRegistry) -> Result<(), RegistrationError> {
    let integer = registry.register(INTEGER_TYPE);
    let i32_pair = || {
        Signature::of([
            ParamSpec::Kind(ValueKind::I32),
            ParamSpec::Kind(ValueKind::I32),
        ])
    };
    integer.register(Binding::new(
        "reverse_bytes",
        Signature::of([ParamSpec::Kind(ValueKind::I32)])?,
        FnPlugin::arc(reverse_bytes_i32),
    ))?;
    integer.register(Binding::new(
        "reverse_bytes",
        Signature::of([ParamSpec::Kind(ValueKind::I64)])?,
        FnPlugin::arc(reverse_bytes_i64),
    ))?;
    integer.register(Binding::new("divide", i32_pair()?, FnPlugin::arc(divide_i32)))?;
    integer.register(Binding::new(
        "divide_unsigned",
        i32_pair()?,
        FnPlugin::arc(divide_unsigned_i32),
    ))?;
    integer.register(Binding::new(
        "saturating_add",
        i32_pair()?,
        FnPlugin::arc(saturating_add_i32),
    ))?;
    Ok(())
}
