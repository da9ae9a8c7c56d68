//! Value kinds carried by operand-stack slots and IR values.
//!
//! Kinds drive two things: descriptor construction (every kind has a stable
//! single-character tag, references are spelled out per type) and the
//! push/pop type checks of the parsing context. Sub-word integers are
//! widened to [`ValueKind::I32`] on the operand stack, so a `pop(I8)` of a
//! value pushed as `I32` is legal while a `pop(F32)` of the same value is a
//! contract violation.

use std::fmt;

/// Kind of a runtime value as seen by the translation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Any reference value. Descriptors refine this with a concrete type name.
    Ref,
}

impl ValueKind {
    /// Descriptor tag character for this kind.
    ///
    /// References use `'L'`, the opening character of an `L<name>;` marker;
    /// the full spelling is produced by [`TypeName::internal_name`].
    ///
    /// [`TypeName::internal_name`]: crate::method::TypeName::internal_name
    #[inline]
    pub const fn tag(self) -> char {
        match self {
            ValueKind::Void => 'V',
            ValueKind::Bool => 'Z',
            ValueKind::I8 => 'B',
            ValueKind::I16 => 'S',
            ValueKind::I32 => 'I',
            ValueKind::I64 => 'J',
            ValueKind::F32 => 'F',
            ValueKind::F64 => 'D',
            ValueKind::Ref => 'L',
        }
    }

    /// Parse a primitive descriptor tag. Returns `None` for `'L'`, `'['` and
    /// anything else that is not a primitive tag.
    #[inline]
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'V' => Some(ValueKind::Void),
            'Z' => Some(ValueKind::Bool),
            'B' => Some(ValueKind::I8),
            'S' => Some(ValueKind::I16),
            'I' => Some(ValueKind::I32),
            'J' => Some(ValueKind::I64),
            'F' => Some(ValueKind::F32),
            'D' => Some(ValueKind::F64),
            _ => None,
        }
    }

    /// Kind a value of this kind occupies on the operand stack.
    ///
    /// Sub-word integers widen to `I32`; everything else is itself.
    #[inline]
    pub const fn stack_kind(self) -> Self {
        match self {
            ValueKind::Bool | ValueKind::I8 | ValueKind::I16 => ValueKind::I32,
            other => other,
        }
    }

    /// Whether this kind describes an integer value.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::Bool | ValueKind::I8 | ValueKind::I16 | ValueKind::I32 | ValueKind::I64
        )
    }

    /// Whether this kind describes a floating-point value.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ValueKind::F32 | ValueKind::F64)
    }

    /// Bit width of a primitive kind, `0` for `Void` and `Ref`.
    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            ValueKind::Void | ValueKind::Ref => 0,
            ValueKind::Bool => 1,
            ValueKind::I8 => 8,
            ValueKind::I16 => 16,
            ValueKind::I32 | ValueKind::F32 => 32,
            ValueKind::I64 | ValueKind::F64 => 64,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Void => "void",
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Ref => "ref",
        };
        write!(f, "{name}")
    }
}
