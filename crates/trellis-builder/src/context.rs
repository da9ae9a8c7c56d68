//! The parsing-context contract between a translator and its extensions.
//!
//! [`GraphBuilder`] is the interface an extension sees while it runs: the
//! operand stack, node insertion, snapshot bookkeeping and the helpers for
//! emitting implicit runtime checks. Translators implement the required
//! methods; the check-emission helpers are provided on top of them and
//! honor the configured [`ExceptionMode`](crate::config::ExceptionMode).
//!
//! Check helpers consult stamps before emitting anything: a receiver
//! already proven non-null, a divisor whose range excludes zero or an
//! array length known non-negative all pass through untouched, in either
//! mode.

use std::sync::Arc;

use trellis_core::graph::Graph;
use trellis_core::node::{DeoptAction, DeoptReason, ExceptionKind, NodeId, NodeOp};
use trellis_core::stamp::Stamp;
use trellis_core::{BuildError, InvokeKind, MethodRef, TrellisError, ValueKind};

use crate::config::BuilderConfig;
use crate::intrinsic::IntrinsicContext;

/// Probability that an emitted exception check takes its passing side.
pub const FAST_PATH_PROBABILITY: f64 = 0.999_999;

/// The mutable translation state an extension builds against.
///
/// One builder exists per method being translated; inlined bodies get a
/// child builder whose [`parent`](GraphBuilder::parent) is the caller's.
pub trait GraphBuilder {
    // ===== Translation state =====

    fn graph(&self) -> &Graph;

    fn graph_mut(&mut self) -> &mut Graph;

    fn config(&self) -> &BuilderConfig;

    /// The method whose body this builder translates.
    fn method(&self) -> &Arc<MethodRef>;

    /// Offset of the instruction currently being translated.
    fn code_offset(&self) -> u32;

    /// How the call site currently being substituted addresses its target.
    fn invoke_kind(&self) -> InvokeKind;

    /// The enclosing builder when this one translates an inlined body.
    fn parent(&self) -> Option<&dyn GraphBuilder>;

    /// The expansion in progress, when this builder runs an extension.
    fn intrinsic(&self) -> Option<&IntrinsicContext>;

    fn intrinsic_mut(&mut self) -> Option<&mut IntrinsicContext>;

    // ===== Operand stack =====

    /// Push a value of `kind`. Pushing `Void` is a contract violation.
    fn push(&mut self, kind: ValueKind, value: NodeId) -> Result<(), BuildError>;

    /// Pop the top of stack, which must hold a value of `kind`.
    fn pop(&mut self, kind: ValueKind) -> Result<NodeId, BuildError>;

    // ===== Graph mutation =====

    /// Insert `node` into the graph: floating nodes are canonicalized and
    /// the canonical node returned; fixed nodes are wired after the last
    /// fixed node and get a frame state synthesized when they need one.
    fn append(&mut self, node: NodeId) -> Result<NodeId, BuildError>;

    /// Build the entry of an exceptional path raising `kind` with `args`.
    /// The returned node is wired as a branch target by the caller, not
    /// into the ongoing control flow.
    fn exception_edge(&mut self, kind: ExceptionKind, args: &[NodeId])
    -> Result<NodeId, BuildError>;

    /// Emit the call an extension wants in place of the one being
    /// substituted. Unless the target is the method the current expansion
    /// replaces, the call goes through extension dispatch again before
    /// falling back to a call node. `force_inline` asks for the target's
    /// body to be parsed in place of a call where the builder supports it.
    fn handle_replaced_invoke(
        &mut self,
        kind: InvokeKind,
        method: Arc<MethodRef>,
        args: &[NodeId],
        force_inline: bool,
    ) -> Result<(), TrellisError>;

    // ===== Provided =====

    /// Whether an extension is currently being expanded into this graph.
    fn parsing_intrinsic(&self) -> bool {
        self.intrinsic().is_some()
    }

    /// Inlining depth of this builder below the compilation root.
    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut parent = self.parent();
        while let Some(builder) = parent {
            depth += 1;
            parent = builder.parent();
        }
        depth
    }

    /// Whether implicit checks must be emitted as explicit branches.
    fn needs_explicit_exception(&self) -> bool {
        self.config().exception_mode().is_explicit()
    }

    /// Append `node` and push its value in one step.
    fn add_push(&mut self, kind: ValueKind, node: NodeId) -> Result<NodeId, BuildError> {
        let node = self.append(node)?;
        self.push(kind, node)?;
        Ok(node)
    }

    /// A non-null view of `value` past this point, emitting whatever check
    /// the current mode requires.
    ///
    /// Values already proven non-null by their stamp pass through
    /// untouched. Otherwise guard mode emits a deoptimizing guard and
    /// explicit mode branches to a `NullPointer` exception edge; both
    /// return a refinement pinned to the check.
    fn null_checked_value(&mut self, value: NodeId) -> Result<NodeId, BuildError> {
        self.null_checked_value_with_action(value, DeoptAction::InvalidateRecompile)
    }

    /// [`null_checked_value`](GraphBuilder::null_checked_value) with a
    /// caller-chosen deoptimization action for the guard-mode check.
    fn null_checked_value_with_action(
        &mut self,
        value: NodeId,
        action: DeoptAction,
    ) -> Result<NodeId, BuildError> {
        let stamp = self.graph().stamp(value).clone();
        let Some(object) = stamp.as_object() else {
            return Err(BuildError::KindMismatch {
                expected: ValueKind::Ref,
                found: stamp.kind(),
            });
        };
        if object.non_null {
            return Ok(value);
        }
        let refined = Stamp::Object(object.as_non_null());
        let condition = self.graph_mut().is_null(value);
        if self.needs_explicit_exception() {
            let anchor =
                self.emit_exception_check(condition, false, ExceptionKind::NullPointer, &[])?;
            let pinned = match anchor {
                Some(begin) => self.graph_mut().pi_anchored(value, begin, refined),
                None => self.graph_mut().pi(value, refined),
            };
            Ok(pinned)
        } else {
            let guard = self.graph_mut().create(
                NodeOp::Guard {
                    reason: DeoptReason::NullCheck,
                    action,
                    negated: true,
                },
                &[condition],
            );
            let guard = self.append(guard)?;
            Ok(self.graph_mut().pi_anchored(value, guard, refined))
        }
    }

    /// In explicit mode, emit a zero test on `divisor` branching to a
    /// `DivisionByZero` exception edge. A divisor whose range excludes
    /// zero emits nothing in either mode. Returns the divisor unchanged.
    fn maybe_emit_division_by_zero_check(&mut self, divisor: NodeId) -> Result<NodeId, BuildError> {
        if !self.needs_explicit_exception() {
            return Ok(divisor);
        }
        let stamp = self.graph().stamp(divisor).clone();
        let Some(int) = stamp.as_int() else {
            return Err(BuildError::KindMismatch {
                expected: ValueKind::I32,
                found: stamp.kind(),
            });
        };
        if !int.contains(0) {
            return Ok(divisor);
        }
        let zero = if int.bits == 64 {
            self.graph_mut().const_i64(0)
        } else {
            self.graph_mut().const_i32(0)
        };
        let condition = self.graph_mut().int_equals(divisor, zero);
        self.emit_exception_check(condition, false, ExceptionKind::DivisionByZero, &[])?;
        Ok(divisor)
    }

    /// In explicit mode, emit a sign test on an array allocation length
    /// branching to a `NegativeArraySize` exception edge. A length already
    /// known non-negative emits nothing in either mode. Returns the length
    /// unchanged.
    fn maybe_emit_negative_array_size_check(
        &mut self,
        length: NodeId,
    ) -> Result<NodeId, BuildError> {
        if !self.needs_explicit_exception() {
            return Ok(length);
        }
        let stamp = self.graph().stamp(length).clone();
        let Some(int) = stamp.as_int() else {
            return Err(BuildError::KindMismatch {
                expected: ValueKind::I32,
                found: stamp.kind(),
            });
        };
        if int.is_non_negative() {
            return Ok(length);
        }
        let zero = if int.bits == 64 {
            self.graph_mut().const_i64(0)
        } else {
            self.graph_mut().const_i32(0)
        };
        let condition = self.graph_mut().int_less_than(length, zero);
        self.emit_exception_check(condition, false, ExceptionKind::NegativeArraySize, &[length])?;
        Ok(length)
    }

    /// Emit a branch between ongoing control flow and a raised exception.
    /// `passing_on_true` picks which side of `condition` continues
    /// normally; the branch is biased heavily toward it.
    ///
    /// Returns the continuation begin node, or `None` when the condition
    /// statically takes the passing side and nothing was emitted.
    fn emit_exception_check(
        &mut self,
        condition: NodeId,
        passing_on_true: bool,
        kind: ExceptionKind,
        args: &[NodeId],
    ) -> Result<Option<NodeId>, BuildError> {
        debug_assert_eq!(args.len(), kind.arg_count());
        let statically_passing = if passing_on_true {
            self.graph().is_tautology(condition)
        } else {
            self.graph().is_contradiction(condition)
        };
        if statically_passing {
            return Ok(None);
        }
        tracing::trace!(kind = %kind, passing_on_true, "emitting exception check");
        let exception = self.exception_edge(kind, args)?;
        let true_probability = if passing_on_true {
            FAST_PATH_PROBABILITY
        } else {
            1.0 - FAST_PATH_PROBABILITY
        };
        let branch = self.graph_mut().if_node(condition, true_probability);
        let branch = self.append(branch)?;
        let passing = self.graph_mut().create(NodeOp::Begin, &[]);
        if passing_on_true {
            self.graph_mut().set_branches(branch, passing, exception);
        } else {
            self.graph_mut().set_branches(branch, exception, passing);
        }
        let passing = self.append(passing)?;
        Ok(Some(passing))
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::node::UnaryOp;
    use trellis_core::stamp::{IntStamp, ObjectStamp};
    use trellis_core::{MethodRef, TypeName};

    use super::*;
    use crate::config::ExceptionMode;
    use crate::fragment::FragmentBuilder;

    fn builder_for(descriptor: &str, mode: ExceptionMode) -> FragmentBuilder<'static> {
        let method = Arc::new(MethodRef::new(
            TypeName::new("demo.Math"),
            "m",
            descriptor,
            true,
        ));
        FragmentBuilder::for_invocation(
            method,
            InvokeKind::Static,
            BuilderConfig::new().with_exception_mode(mode),
        )
        .unwrap()
    }

    fn count_ops(builder: &FragmentBuilder<'_>, matcher: impl Fn(&NodeOp) -> bool) -> usize {
        builder
            .graph()
            .node_ids()
            .filter(|&id| matcher(&builder.graph().node(id).op))
            .count()
    }

    #[test]
    fn add_push_appends_then_pushes() {
        let mut b = builder_for("(I)I", ExceptionMode::Guard);
        let value = b.arg(0);
        let abs = b.graph_mut().unary(UnaryOp::Abs, ValueKind::I32, value);
        let appended = b.add_push(ValueKind::I32, abs).unwrap();
        assert_eq!(b.pop(ValueKind::I32).unwrap(), appended);
    }

    #[test]
    fn null_check_passes_through_proven_non_null() {
        let mut b = builder_for("(I)I", ExceptionMode::Guard);
        let value = b
            .graph_mut()
            .parameter(7, Stamp::Object(ObjectStamp::non_null()));
        let before = b.graph().node_count();
        let checked = b.null_checked_value(value).unwrap();
        assert_eq!(checked, value);
        assert_eq!(b.graph().node_count(), before);
    }

    #[test]
    fn null_check_in_guard_mode_emits_guard_and_refines() {
        let mut b = builder_for("(Ldemo/Buf;)I", ExceptionMode::Guard);
        let receiver = b.arg(0);
        let checked = b.null_checked_value(receiver).unwrap();
        assert_ne!(checked, receiver);
        assert!(b.graph().stamp(checked).is_non_null());
        assert_eq!(count_ops(&b, |op| matches!(op, NodeOp::Guard { .. })), 1);
        assert_eq!(count_ops(&b, |op| matches!(op, NodeOp::If { .. })), 0);
    }

    #[test]
    fn null_check_in_explicit_mode_branches_to_exception() {
        let mut b = builder_for("(Ldemo/Buf;)I", ExceptionMode::Explicit);
        let receiver = b.arg(0);
        let checked = b.null_checked_value(receiver).unwrap();
        assert!(b.graph().stamp(checked).is_non_null());
        assert_eq!(count_ops(&b, |op| matches!(op, NodeOp::If { .. })), 1);
        assert_eq!(
            count_ops(&b, |op| matches!(
                op,
                NodeOp::ExceptionObject(ExceptionKind::NullPointer)
            )),
            1
        );
        assert_eq!(count_ops(&b, |op| matches!(op, NodeOp::Guard { .. })), 0);
    }

    #[test]
    fn null_check_on_non_reference_is_rejected() {
        let mut b = builder_for("(I)I", ExceptionMode::Guard);
        let value = b.arg(0);
        assert!(matches!(
            b.null_checked_value(value),
            Err(BuildError::KindMismatch { .. })
        ));
    }

    #[test]
    fn division_check_elided_for_provably_non_zero_divisor() {
        // In both modes a divisor whose range excludes zero emits nothing.
        for mode in [ExceptionMode::Explicit, ExceptionMode::Guard] {
            let mut b = builder_for("(II)I", mode);
            let divisor = b
                .graph_mut()
                .parameter(9, Stamp::Int(IntStamp::range(32, 1, 100)));
            let before = b.graph().node_count();
            let out = b.maybe_emit_division_by_zero_check(divisor).unwrap();
            assert_eq!(out, divisor);
            assert_eq!(b.graph().node_count(), before);
        }
    }

    #[test]
    fn division_check_emitted_in_explicit_mode() {
        let mut b = builder_for("(II)I", ExceptionMode::Explicit);
        let divisor = b.arg(1);
        let out = b.maybe_emit_division_by_zero_check(divisor).unwrap();
        assert_eq!(out, divisor);
        assert_eq!(
            count_ops(&b, |op| matches!(
                op,
                NodeOp::ExceptionObject(ExceptionKind::DivisionByZero)
            )),
            1
        );
        // the branch is biased away from the exceptional true side
        let branch = b
            .graph()
            .node_ids()
            .find(|&id| matches!(b.graph().node(id).op, NodeOp::If { .. }))
            .unwrap();
        let NodeOp::If { true_probability } = &b.graph().node(branch).op else {
            unreachable!()
        };
        assert_eq!(true_probability.0, 1.0 - FAST_PATH_PROBABILITY);
    }

    #[test]
    fn division_check_silent_in_guard_mode() {
        let mut b = builder_for("(II)I", ExceptionMode::Guard);
        let divisor = b.arg(1);
        let before = b.graph().node_count();
        b.maybe_emit_division_by_zero_check(divisor).unwrap();
        assert_eq!(b.graph().node_count(), before);
    }

    #[test]
    fn negative_size_check_elided_for_non_negative_length() {
        let mut b = builder_for("(I)I", ExceptionMode::Explicit);
        let length = b
            .graph_mut()
            .parameter(9, Stamp::Int(IntStamp::range(32, 0, i32::MAX as i64)));
        let before = b.graph().node_count();
        b.maybe_emit_negative_array_size_check(length).unwrap();
        assert_eq!(b.graph().node_count(), before);
    }

    #[test]
    fn negative_size_check_emitted_for_unknown_length() {
        let mut b = builder_for("(I)I", ExceptionMode::Explicit);
        let length = b.arg(0);
        b.maybe_emit_negative_array_size_check(length).unwrap();
        assert_eq!(
            count_ops(&b, |op| matches!(
                op,
                NodeOp::ExceptionObject(ExceptionKind::NegativeArraySize)
            )),
            1
        );
    }

    #[test]
    fn statically_passing_check_emits_nothing() {
        let mut b = builder_for("(I)I", ExceptionMode::Explicit);
        let condition = b.graph_mut().logic_constant(false);
        let before = b.graph().node_count();
        let begin = b
            .emit_exception_check(condition, false, ExceptionKind::DivisionByZero, &[])
            .unwrap();
        assert_eq!(begin, None);
        assert_eq!(b.graph().node_count(), before);
    }
}
