//! Value stamps: what the graph statically knows about a node's value.
//!
//! Stamps are what lets the check-emission helpers prove a check away:
//! a divisor whose [`IntStamp`] excludes zero needs no zero check, a value
//! whose [`ObjectStamp`] is non-null needs no null check. Only the facts
//! those helpers interrogate are modeled: integer ranges and reference
//! nullness.

use std::fmt;

use crate::kind::ValueKind;

/// Range knowledge about an integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntStamp {
    pub bits: u8,
    pub lo: i64,
    pub hi: i64,
}

impl IntStamp {
    /// Full range for an integer kind.
    pub fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Self { bits: 1, lo: 0, hi: 1 },
            ValueKind::I8 => Self { bits: 8, lo: i8::MIN as i64, hi: i8::MAX as i64 },
            ValueKind::I16 => Self { bits: 16, lo: i16::MIN as i64, hi: i16::MAX as i64 },
            ValueKind::I32 => Self { bits: 32, lo: i32::MIN as i64, hi: i32::MAX as i64 },
            ValueKind::I64 => Self { bits: 64, lo: i64::MIN, hi: i64::MAX },
            other => {
                debug_assert!(false, "not an integer kind: {other}");
                Self { bits: 64, lo: i64::MIN, hi: i64::MAX }
            }
        }
    }

    /// Single-value range.
    pub const fn constant(value: i64, bits: u8) -> Self {
        Self { bits, lo: value, hi: value }
    }

    /// Arbitrary range; callers are responsible for `lo <= hi`.
    pub const fn range(bits: u8, lo: i64, hi: i64) -> Self {
        Self { bits, lo, hi }
    }

    #[inline]
    pub const fn contains(&self, value: i64) -> bool {
        self.lo <= value && value <= self.hi
    }

    #[inline]
    pub const fn is_non_negative(&self) -> bool {
        self.lo >= 0
    }

    #[inline]
    pub const fn is_constant(&self) -> bool {
        self.lo == self.hi
    }

    /// The single value if this stamp pins one down.
    #[inline]
    pub const fn as_constant(&self) -> Option<i64> {
        if self.lo == self.hi { Some(self.lo) } else { None }
    }
}

/// Nullness and type knowledge about a reference value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectStamp {
    pub non_null: bool,
    pub exact_type: Option<crate::method::TypeName>,
}

impl ObjectStamp {
    /// Any reference, possibly null.
    pub const fn any() -> Self {
        Self { non_null: false, exact_type: None }
    }

    /// Any reference, known non-null.
    pub const fn non_null() -> Self {
        Self { non_null: true, exact_type: None }
    }

    /// Copy of this stamp with the null possibility removed.
    pub fn as_non_null(&self) -> Self {
        Self { non_null: true, exact_type: self.exact_type.clone() }
    }
}

/// Static knowledge about one node's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stamp {
    /// No value (control nodes, void calls).
    Void,
    Int(IntStamp),
    Float { bits: u8 },
    Object(ObjectStamp),
    /// Boolean conditions produced by logic nodes.
    Condition,
}

impl Stamp {
    /// The weakest stamp for a value kind.
    pub fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Void => Stamp::Void,
            ValueKind::F32 => Stamp::Float { bits: 32 },
            ValueKind::F64 => Stamp::Float { bits: 64 },
            ValueKind::Ref => Stamp::Object(ObjectStamp::any()),
            int => Stamp::Int(IntStamp::for_kind(int)),
        }
    }

    /// The value kind this stamp describes, widened to stack granularity.
    pub fn kind(&self) -> ValueKind {
        match self {
            Stamp::Void => ValueKind::Void,
            Stamp::Int(int) if int.bits == 64 => ValueKind::I64,
            Stamp::Int(_) => ValueKind::I32,
            Stamp::Float { bits: 32 } => ValueKind::F32,
            Stamp::Float { .. } => ValueKind::F64,
            Stamp::Object(_) => ValueKind::Ref,
            Stamp::Condition => ValueKind::Bool,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<&IntStamp> {
        match self {
            Stamp::Int(int) => Some(int),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&ObjectStamp> {
        match self {
            Stamp::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Whether this stamp proves the value is a non-null reference.
    #[inline]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Stamp::Object(obj) if obj.non_null)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stamp::Void => write!(f, "void"),
            Stamp::Int(int) => write!(f, "i{}[{}..{}]", int.bits, int.lo, int.hi),
            Stamp::Float { bits } => write!(f, "f{bits}"),
            Stamp::Object(obj) => {
                write!(f, "ref")?;
                if obj.non_null {
                    write!(f, "!")?;
                }
                if let Some(name) = &obj.exact_type {
                    write!(f, " {name}")?;
                }
                Ok(())
            }
            Stamp::Condition => write!(f, "cond"),
        }
    }
}
