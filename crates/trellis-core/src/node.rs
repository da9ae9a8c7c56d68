//! Node vocabulary of the minimal IR arena.
//!
//! The engine does not define a full compiler IR; it defines exactly the
//! node shapes its substitution machinery manipulates: constants and
//! parameters, a handful of pure arithmetic ops for intrinsic bodies,
//! logic nodes for check conditions, control nodes (branch, merge, loop
//! exit, guard), exception materialization, deferred invokes and the
//! side-effecting memory ops the frame-state synthesizer cares about.
//!
//! Node behavior relevant to state synthesis is expressed as [`NodeFlags`]
//! derived from the op, not stored per node: whether a node is fixed in the
//! control flow, has an observable side effect, merges control flow, or is
//! a deferred invoke.

use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use crate::frame_state::FrameStateId;
use crate::kind::ValueKind;
use crate::method::{InvokeKind, MethodRef};
use crate::stamp::Stamp;

/// Index of a node in its [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Int { kind: ValueKind, value: i64 },
    F32(OrderedFloat<f32>),
    F64(OrderedFloat<f64>),
    Null,
}

impl ConstantValue {
    pub const fn i32(value: i32) -> Self {
        ConstantValue::Int { kind: ValueKind::I32, value: value as i64 }
    }

    pub const fn i64(value: i64) -> Self {
        ConstantValue::Int { kind: ValueKind::I64, value }
    }

    pub const fn bool(value: bool) -> Self {
        ConstantValue::Int { kind: ValueKind::Bool, value: value as i64 }
    }

    pub fn f32(value: f32) -> Self {
        ConstantValue::F32(OrderedFloat(value))
    }

    pub fn f64(value: f64) -> Self {
        ConstantValue::F64(OrderedFloat(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConstantValue::Int { kind, .. } => *kind,
            ConstantValue::F32(_) => ValueKind::F32,
            ConstantValue::F64(_) => ValueKind::F64,
            ConstantValue::Null => ValueKind::Ref,
        }
    }

    /// Integer payload, if this is an integer constant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Int { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int { kind, value } => write!(f, "{value}:{kind}"),
            ConstantValue::F32(v) => write!(f, "{v}:f32"),
            ConstantValue::F64(v) => write!(f, "{v}:f64"),
            ConstantValue::Null => write!(f, "null"),
        }
    }
}

/// Pure binary arithmetic/logic ops usable in intrinsic bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Division. Emitters are responsible for the zero check; the node
    /// itself is pure.
    Div,
    /// Unsigned division, same zero-check contract as [`Div`](Self::Div).
    UDiv,
    /// Addition clamping at the kind's bounds instead of wrapping.
    SatAdd,
    And,
    Or,
    Xor,
    Min,
    Max,
}

/// Pure unary ops usable in intrinsic bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Sqrt,
    ReverseBytes,
}

/// Why a guard would abandon optimized execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptReason {
    NullCheck,
    BoundsCheck,
    ArithmeticCheck,
    ClassCastCheck,
}

/// What the runtime should do about the compiled code after a guard fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptAction {
    None,
    Reprofile,
    InvalidateRecompile,
}

/// Guest-visible exception categories the engine materializes edges for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    NullPointer,
    DivisionByZero,
    OutOfBounds,
    NegativeArraySize,
    ClassCast,
}

impl ExceptionKind {
    /// Number of argument values the exception constructor consumes.
    pub const fn arg_count(self) -> usize {
        match self {
            ExceptionKind::NullPointer | ExceptionKind::DivisionByZero => 0,
            ExceptionKind::NegativeArraySize => 1,
            ExceptionKind::OutOfBounds | ExceptionKind::ClassCast => 2,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionKind::NullPointer => "null_pointer",
            ExceptionKind::DivisionByZero => "division_by_zero",
            ExceptionKind::OutOfBounds => "out_of_bounds",
            ExceptionKind::NegativeArraySize => "negative_array_size",
            ExceptionKind::ClassCast => "class_cast",
        };
        write!(f, "{name}")
    }
}

/// Operation performed by a node. Inputs are stored on the node itself;
/// the comments note the expected input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeOp {
    Constant(ConstantValue),
    /// Incoming argument by position.
    Parameter(u16),
    /// Inputs: `[lhs, rhs]`.
    Binary { op: BinaryOp, kind: ValueKind },
    /// Inputs: `[value]`.
    Unary { op: UnaryOp, kind: ValueKind },
    /// Inputs: `[value]`; condition is true when the value is null.
    IsNull,
    /// Inputs: `[x, y]`.
    IntEquals,
    /// Inputs: `[x, y]`; signed comparison.
    IntLessThan,
    /// A statically decided condition.
    LogicConstant(bool),
    /// Inputs: `[value]`; same value with a refined stamp.
    Pi,
    Begin,
    /// Control-flow predecessor marker feeding a `Merge`.
    End,
    /// Inputs: the `End` nodes of the merging paths.
    Merge,
    LoopExit,
    /// Inputs: `[condition]`; successors set via
    /// [`Graph::set_branches`](crate::graph::Graph::set_branches).
    If { true_probability: OrderedFloat<f64> },
    /// Inputs: `[condition]`; speculative check that deoptimizes when the
    /// condition (or its negation) fails.
    Guard { reason: DeoptReason, action: DeoptAction, negated: bool },
    /// Materializes the in-flight exception on an exceptional path.
    ExceptionObject(ExceptionKind),
    /// Inputs: exception constructor args; transfers to the runtime throw.
    Raise(ExceptionKind),
    /// Inputs: call arguments, receiver first for non-static kinds.
    Invoke { method: Arc<MethodRef>, kind: InvokeKind },
    /// Inputs: `[]` or `[value]`.
    Return,
    /// Inputs: `[length]`.
    NewArray { element: ValueKind },
    /// Inputs: `[array]`.
    ArrayLength,
    /// Inputs: `[array, index]`.
    LoadIndexed { element: ValueKind },
    /// Inputs: `[array, index, value]`.
    StoreIndexed { element: ValueKind },
    /// Inputs: `[object, value]`.
    StoreField { field: String },
}

bitflags::bitflags! {
    /// Behavior of a node as seen by append and state synthesis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Anchored in the control flow; appended, never value-numbered.
        const FIXED = 1 << 0;
        /// Observably changes program state; needs a fallback snapshot.
        const SIDE_EFFECT = 1 << 1;
        /// Merges control flow; needs a snapshot even without side effect.
        const MERGE_LIKE = 1 << 2;
        /// An invoke left in the graph for later inlining/lowering.
        const DEFERRED_INVOKE = 1 << 3;
        /// Materializes an exception object.
        const EXCEPTION_OBJECT = 1 << 4;
        /// Produces a condition, not a value.
        const LOGIC = 1 << 5;
    }
}

impl NodeOp {
    pub fn flags(&self) -> NodeFlags {
        match self {
            NodeOp::Constant(_) | NodeOp::Parameter(_) | NodeOp::Binary { .. }
            | NodeOp::Unary { .. } | NodeOp::Pi => NodeFlags::empty(),
            NodeOp::IsNull
            | NodeOp::IntEquals
            | NodeOp::IntLessThan
            | NodeOp::LogicConstant(_) => NodeFlags::LOGIC,
            NodeOp::Begin | NodeOp::End | NodeOp::If { .. } | NodeOp::Guard { .. }
            | NodeOp::Raise(_) | NodeOp::Return | NodeOp::ArrayLength
            | NodeOp::LoadIndexed { .. } => NodeFlags::FIXED,
            NodeOp::Merge | NodeOp::LoopExit => NodeFlags::FIXED | NodeFlags::MERGE_LIKE,
            NodeOp::ExceptionObject(_) => {
                NodeFlags::FIXED | NodeFlags::SIDE_EFFECT | NodeFlags::EXCEPTION_OBJECT
            }
            NodeOp::Invoke { .. } => {
                NodeFlags::FIXED | NodeFlags::SIDE_EFFECT | NodeFlags::DEFERRED_INVOKE
            }
            NodeOp::NewArray { .. } | NodeOp::StoreIndexed { .. } | NodeOp::StoreField { .. } => {
                NodeFlags::FIXED | NodeFlags::SIDE_EFFECT
            }
        }
    }
}

/// One node in the arena: op, data inputs, control successors, stamp and
/// the attached interpreter-state snapshot (if any).
#[derive(Debug, Clone)]
pub struct Node {
    pub op: NodeOp,
    pub inputs: SmallVec<[NodeId; 2]>,
    pub successors: SmallVec<[NodeId; 2]>,
    pub stamp: Stamp,
    pub state_after: Option<FrameStateId>,
}

impl Node {
    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.op.flags()
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.flags().contains(NodeFlags::FIXED)
    }

    #[inline]
    pub fn is_floating(&self) -> bool {
        !self.is_fixed()
    }

    #[inline]
    pub fn has_side_effect(&self) -> bool {
        self.flags().contains(NodeFlags::SIDE_EFFECT)
    }

    #[inline]
    pub fn is_merge_like(&self) -> bool {
        self.flags().contains(NodeFlags::MERGE_LIKE)
    }

    #[inline]
    pub fn is_deferred_invoke(&self) -> bool {
        self.flags().contains(NodeFlags::DEFERRED_INVOKE)
    }

    #[inline]
    pub fn is_exception_object(&self) -> bool {
        self.flags().contains(NodeFlags::EXCEPTION_OBJECT)
    }

    #[inline]
    pub fn is_logic(&self) -> bool {
        self.flags().contains(NodeFlags::LOGIC)
    }

    /// Straight-line successor, when there is exactly one.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        match self.successors.as_slice() {
            [next] => Some(*next),
            _ => None,
        }
    }
}
