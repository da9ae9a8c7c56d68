//! The minimal IR arena the substitution engine builds into.
//!
//! Nodes live in an index arena ([`NodeId`] is a plain `u32` index) and
//! floating nodes are value-numbered: creating the same pure op over the
//! same inputs yields the same node. Fixed nodes are never deduplicated;
//! their identity is their position in the control flow. Snapshots live in
//! a parallel arena keyed by [`FrameStateId`].
//!
//! Condition constructors ([`Graph::is_null`], [`Graph::int_equals`],
//! [`Graph::int_less_than`]) fold to a [`NodeOp::LogicConstant`] when the
//! operand stamps already decide the answer; the check-emission helpers
//! rely on that to avoid dead branches.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::BuildError;
use crate::frame_state::{FrameState, FrameStateId};
use crate::kind::ValueKind;
use crate::method::{InvokeKind, MethodRef};
use crate::node::{ConstantValue, Node, NodeId, NodeOp};
use crate::stamp::{IntStamp, ObjectStamp, Stamp};

type InternKey = (NodeOp, SmallVec<[NodeId; 2]>, Stamp);

/// Graph under construction: node arena, snapshot arena, value-numbering
/// table for floating nodes.
pub struct Graph {
    nodes: Vec<Node>,
    states: Vec<FrameState>,
    interned: FxHashMap<InternKey, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            states: Vec::new(),
            interned: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn stamp(&self, id: NodeId) -> &Stamp {
        &self.node(id).stamp
    }

    /// Iterate all node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len() as u32).map(NodeId::new)
    }

    // ===== Node creation =====

    /// Create a node without canonicalization; the stamp is inferred from
    /// the op. Use the dedicated constructors where stamps need context
    /// (parameters, pis, invokes).
    pub fn create(&mut self, op: NodeOp, inputs: &[NodeId]) -> NodeId {
        let stamp = Self::default_stamp(&op);
        self.push_node(op, SmallVec::from_slice(inputs), stamp)
    }

    /// Create a node with an explicit stamp, without canonicalization.
    pub fn create_with_stamp(&mut self, op: NodeOp, inputs: &[NodeId], stamp: Stamp) -> NodeId {
        self.push_node(op, SmallVec::from_slice(inputs), stamp)
    }

    /// Canonicalize a floating node: if an equivalent node already exists
    /// the existing one is returned and `id` is left unreferenced. Fixed
    /// nodes are returned unchanged.
    pub fn unique(&mut self, id: NodeId) -> NodeId {
        let node = &self.nodes[id.index()];
        if node.is_fixed() {
            return id;
        }
        let key = (node.op.clone(), node.inputs.clone(), node.stamp.clone());
        match self.interned.entry(key) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => {
                slot.insert(id);
                id
            }
        }
    }

    fn push_node(&mut self, op: NodeOp, inputs: SmallVec<[NodeId; 2]>, stamp: Stamp) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node {
            op,
            inputs,
            successors: SmallVec::new(),
            stamp,
            state_after: None,
        });
        id
    }

    fn intern(&mut self, op: NodeOp, inputs: SmallVec<[NodeId; 2]>, stamp: Stamp) -> NodeId {
        let key = (op.clone(), inputs.clone(), stamp.clone());
        if let Some(&existing) = self.interned.get(&key) {
            return existing;
        }
        let id = self.push_node(op, inputs, stamp);
        self.interned.insert(key, id);
        id
    }

    fn default_stamp(op: &NodeOp) -> Stamp {
        match op {
            NodeOp::Constant(value) => Self::constant_stamp(value),
            NodeOp::Binary { kind, .. } | NodeOp::Unary { kind, .. } => Stamp::for_kind(*kind),
            NodeOp::LoadIndexed { element } => Stamp::for_kind(*element),
            NodeOp::IsNull
            | NodeOp::IntEquals
            | NodeOp::IntLessThan
            | NodeOp::LogicConstant(_) => Stamp::Condition,
            NodeOp::ExceptionObject(_) | NodeOp::NewArray { .. } => {
                Stamp::Object(ObjectStamp::non_null())
            }
            NodeOp::ArrayLength => Stamp::Int(IntStamp::range(32, 0, i32::MAX as i64)),
            _ => Stamp::Void,
        }
    }

    fn constant_stamp(value: &ConstantValue) -> Stamp {
        match value {
            ConstantValue::Int { kind, value } => {
                let bits = IntStamp::for_kind(*kind).bits;
                Stamp::Int(IntStamp::constant(*value, bits))
            }
            ConstantValue::F32(_) => Stamp::Float { bits: 32 },
            ConstantValue::F64(_) => Stamp::Float { bits: 64 },
            ConstantValue::Null => Stamp::Object(ObjectStamp::any()),
        }
    }

    // ===== Canonicalizing constructors =====

    /// Canonical constant node for a value.
    pub fn const_value(&mut self, value: ConstantValue) -> NodeId {
        let stamp = Self::constant_stamp(&value);
        self.intern(NodeOp::Constant(value), SmallVec::new(), stamp)
    }

    pub fn const_i32(&mut self, value: i32) -> NodeId {
        self.const_value(ConstantValue::i32(value))
    }

    pub fn const_i64(&mut self, value: i64) -> NodeId {
        self.const_value(ConstantValue::i64(value))
    }

    pub fn const_null(&mut self) -> NodeId {
        self.const_value(ConstantValue::Null)
    }

    /// Canonical parameter node with the caller-provided stamp.
    pub fn parameter(&mut self, index: u16, stamp: Stamp) -> NodeId {
        self.intern(NodeOp::Parameter(index), SmallVec::new(), stamp)
    }

    /// Refine `value`'s stamp without changing its value.
    pub fn pi(&mut self, value: NodeId, stamp: Stamp) -> NodeId {
        self.intern(NodeOp::Pi, SmallVec::from_slice(&[value]), stamp)
    }

    /// Refine `value`'s stamp, anchored at the control-flow point that
    /// proves the refinement (a guard or a branch successor).
    pub fn pi_anchored(&mut self, value: NodeId, anchor: NodeId, stamp: Stamp) -> NodeId {
        self.intern(NodeOp::Pi, SmallVec::from_slice(&[value, anchor]), stamp)
    }

    pub fn binary(&mut self, op: crate::node::BinaryOp, kind: ValueKind, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.intern(
            NodeOp::Binary { op, kind },
            SmallVec::from_slice(&[lhs, rhs]),
            Stamp::for_kind(kind),
        )
    }

    pub fn unary(&mut self, op: crate::node::UnaryOp, kind: ValueKind, value: NodeId) -> NodeId {
        self.intern(
            NodeOp::Unary { op, kind },
            SmallVec::from_slice(&[value]),
            Stamp::for_kind(kind),
        )
    }

    /// An invoke node left in the graph for later lowering. The result
    /// stamp comes from the method's declared return kind.
    pub fn invoke(
        &mut self,
        method: Arc<MethodRef>,
        kind: InvokeKind,
        args: &[NodeId],
    ) -> Result<NodeId, BuildError> {
        let stamp = Stamp::for_kind(method.return_kind()?);
        Ok(self.create_with_stamp(NodeOp::Invoke { method, kind }, args, stamp))
    }

    /// Array allocation; the result is known non-null.
    pub fn new_array(&mut self, element: ValueKind, length: NodeId) -> NodeId {
        self.create(NodeOp::NewArray { element }, &[length])
    }

    /// Array length read; the result is known non-negative.
    pub fn array_length(&mut self, array: NodeId) -> NodeId {
        self.create(NodeOp::ArrayLength, &[array])
    }

    // ===== Conditions =====

    /// Canonical statically-decided condition.
    pub fn logic_constant(&mut self, value: bool) -> NodeId {
        self.intern(NodeOp::LogicConstant(value), SmallVec::new(), Stamp::Condition)
    }

    /// Condition: `value` is null. Folds when the stamp decides nullness.
    pub fn is_null(&mut self, value: NodeId) -> NodeId {
        let node = self.node(value);
        if matches!(node.op, NodeOp::Constant(ConstantValue::Null)) {
            return self.logic_constant(true);
        }
        if node.stamp.is_non_null() {
            return self.logic_constant(false);
        }
        self.intern(NodeOp::IsNull, SmallVec::from_slice(&[value]), Stamp::Condition)
    }

    /// Condition: `x == y` over integers. Folds on identical nodes, equal
    /// constants and provably disjoint ranges.
    pub fn int_equals(&mut self, x: NodeId, y: NodeId) -> NodeId {
        if x == y {
            return self.logic_constant(true);
        }
        if let (Some(sx), Some(sy)) = (self.stamp(x).as_int(), self.stamp(y).as_int()) {
            if let (Some(cx), Some(cy)) = (sx.as_constant(), sy.as_constant()) {
                return self.logic_constant(cx == cy);
            }
            if sx.hi < sy.lo || sy.hi < sx.lo {
                return self.logic_constant(false);
            }
        }
        self.intern(NodeOp::IntEquals, SmallVec::from_slice(&[x, y]), Stamp::Condition)
    }

    /// Condition: `x < y`, signed. Folds on identical nodes and on ranges
    /// that already order the operands.
    pub fn int_less_than(&mut self, x: NodeId, y: NodeId) -> NodeId {
        if x == y {
            return self.logic_constant(false);
        }
        if let (Some(sx), Some(sy)) = (self.stamp(x).as_int(), self.stamp(y).as_int()) {
            if sx.hi < sy.lo {
                return self.logic_constant(true);
            }
            if sx.lo >= sy.hi {
                return self.logic_constant(false);
            }
        }
        self.intern(NodeOp::IntLessThan, SmallVec::from_slice(&[x, y]), Stamp::Condition)
    }

    #[inline]
    pub fn is_tautology(&self, condition: NodeId) -> bool {
        matches!(self.node(condition).op, NodeOp::LogicConstant(true))
    }

    #[inline]
    pub fn is_contradiction(&self, condition: NodeId) -> bool {
        matches!(self.node(condition).op, NodeOp::LogicConstant(false))
    }

    // ===== Control flow =====

    /// Make `to` the single control successor of `from`.
    pub fn set_next(&mut self, from: NodeId, to: NodeId) {
        let node = self.node_mut(from);
        node.successors.clear();
        node.successors.push(to);
    }

    /// Wire an `If` node's true and false successors.
    pub fn set_branches(&mut self, branch: NodeId, on_true: NodeId, on_false: NodeId) {
        debug_assert!(matches!(self.node(branch).op, NodeOp::If { .. }));
        let node = self.node_mut(branch);
        node.successors.clear();
        node.successors.push(on_true);
        node.successors.push(on_false);
    }

    /// A branch biased toward its true successor with the given
    /// probability.
    pub fn if_node(&mut self, condition: NodeId, true_probability: f64) -> NodeId {
        self.create(
            NodeOp::If { true_probability: OrderedFloat(true_probability) },
            &[condition],
        )
    }

    // ===== Snapshots =====

    pub fn add_state(&mut self, state: FrameState) -> FrameStateId {
        let id = FrameStateId::new(self.states.len() as u32);
        self.states.push(state);
        id
    }

    #[inline]
    pub fn state(&self, id: FrameStateId) -> &FrameState {
        &self.states[id.index()]
    }

    #[inline]
    pub fn state_mut(&mut self, id: FrameStateId) -> &mut FrameState {
        &mut self.states[id.index()]
    }

    pub fn set_state_after(&mut self, node: NodeId, state: FrameStateId) {
        self.node_mut(node).state_after = Some(state);
    }

    pub fn state_after(&self, node: NodeId) -> Option<FrameStateId> {
        self.node(node).state_after
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("states", &self.states.len())
            .field("interned", &self.interned.len())
            .finish()
    }
}
