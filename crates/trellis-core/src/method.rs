//! Method identity, signatures and the descriptor grammar.
//!
//! A descriptor is the normalized string encoding of a parameter list:
//! primitive kinds use their single-character tag, reference types are
//! spelled `L<internal/name>;`, arrays prefix `[`. A full method descriptor
//! appends the return kind after the closing parenthesis, e.g. `(IJ)I`.
//! Registered bindings store only the argument part including the closing
//! parenthesis, e.g. `(IJ)`, and match methods by descriptor *prefix* so the
//! return kind never participates in binding resolution.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{BuildError, RegistrationError};
use crate::hash::{MethodHash, TypeHash};
use crate::kind::ValueKind;

/// Dotted name of a declaring type, e.g. `demo.Math`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last dotted segment, e.g. `Math` for `demo.Math`.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Descriptor spelling of this type: dots become slashes inside an
    /// `L...;` marker, e.g. `demo.Math` -> `Ldemo/Math;`.
    pub fn internal_name(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        out.push('L');
        for ch in self.0.chars() {
            out.push(if ch == '.' { '/' } else { ch });
        }
        out.push(';');
        out
    }

    /// Deterministic hash of this type name.
    #[inline]
    pub fn hash(&self) -> TypeHash {
        TypeHash::from_name(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// How a call site addresses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

impl InvokeKind {
    /// Whether call sites of this kind pass an implicit receiver argument.
    #[inline]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }

    /// Whether the target is bound at translation time rather than
    /// dispatched on the receiver type.
    #[inline]
    pub const fn is_direct(self) -> bool {
        matches!(self, InvokeKind::Static | InvokeKind::Special)
    }
}

/// One parameter position in a registered signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamSpec {
    /// The implicit first argument of a non-static method. Legal only in
    /// the leading position and never part of the descriptor.
    Receiver,
    /// A primitive kind. `Void` and `Ref` are rejected here; references
    /// must name their type via [`ParamSpec::Reference`].
    Kind(ValueKind),
    /// A reference to a named type.
    Reference(TypeName),
    /// An array of the element spec.
    Array(Box<ParamSpec>),
}

impl ParamSpec {
    /// Shorthand for a named reference parameter.
    pub fn reference(name: impl Into<String>) -> Self {
        ParamSpec::Reference(TypeName::new(name))
    }

    /// Shorthand for an array-of-kind parameter.
    pub fn array_of(kind: ValueKind) -> Self {
        ParamSpec::Array(Box::new(ParamSpec::Kind(kind)))
    }

    /// The operand-stack kind a value of this spec occupies.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            ParamSpec::Receiver | ParamSpec::Reference(_) | ParamSpec::Array(_) => ValueKind::Ref,
            ParamSpec::Kind(kind) => *kind,
        }
    }

    fn append_descriptor(
        &self,
        buf: &mut String,
        return_position: bool,
    ) -> Result<(), RegistrationError> {
        match self {
            ParamSpec::Receiver => Err(RegistrationError::InvalidSignature {
                reason: "receiver is only legal as the leading parameter".into(),
            }),
            ParamSpec::Kind(ValueKind::Void) if !return_position => {
                Err(RegistrationError::InvalidSignature {
                    reason: "void is not a parameter kind".into(),
                })
            }
            ParamSpec::Kind(ValueKind::Ref) => Err(RegistrationError::InvalidSignature {
                reason: "bare reference kind: use a named reference type".into(),
            }),
            ParamSpec::Kind(kind) => {
                buf.push(kind.tag());
                Ok(())
            }
            ParamSpec::Reference(name) => {
                buf.push_str(&name.internal_name());
                Ok(())
            }
            ParamSpec::Array(element) => {
                buf.push('[');
                element.append_descriptor(buf, false)
            }
        }
    }
}

/// A validated registered signature: optional leading receiver plus the
/// declared parameter list, with the argument descriptor pre-built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ParamSpec>,
    has_receiver: bool,
    args_descriptor: String,
}

impl Signature {
    /// Validate a parameter list and build its argument descriptor.
    ///
    /// A `Receiver` is accepted only in the leading position; `Void` and
    /// bare `Ref` kinds are rejected everywhere.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_core::{ParamSpec, Signature, ValueKind};
    ///
    /// let sig = Signature::new(vec![
    ///     ParamSpec::Receiver,
    ///     ParamSpec::Kind(ValueKind::I32),
    ///     ParamSpec::Kind(ValueKind::I64),
    /// ])
    /// .unwrap();
    /// assert!(sig.has_receiver());
    /// assert_eq!(sig.args_descriptor(), "(IJ)");
    /// ```
    pub fn new(params: Vec<ParamSpec>) -> Result<Self, RegistrationError> {
        let has_receiver = matches!(params.first(), Some(ParamSpec::Receiver));
        let mut descriptor = String::from("(");
        for (index, param) in params.iter().enumerate() {
            if index == 0 && has_receiver {
                continue;
            }
            param.append_descriptor(&mut descriptor, false)?;
        }
        descriptor.push(')');
        Ok(Self {
            params,
            has_receiver,
            args_descriptor: descriptor,
        })
    }

    /// Convenience constructor for a static signature (no receiver).
    pub fn of(params: impl IntoIterator<Item = ParamSpec>) -> Result<Self, RegistrationError> {
        Self::new(params.into_iter().collect())
    }

    #[inline]
    pub fn has_receiver(&self) -> bool {
        self.has_receiver
    }

    /// Declared parameters, including the receiver when present.
    #[inline]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Number of arguments a call site passes, receiver included.
    #[inline]
    pub fn arg_count(&self) -> usize {
        self.params.len()
    }

    /// Argument descriptor, e.g. `(IJ)`, without the return kind.
    #[inline]
    pub fn args_descriptor(&self) -> &str {
        &self.args_descriptor
    }

    /// Whether a full method descriptor matches this signature's arguments.
    #[inline]
    pub fn matches(&self, method_descriptor: &str) -> bool {
        method_descriptor.starts_with(&self.args_descriptor)
    }

    /// Build a full method descriptor by appending a return spec.
    pub fn method_descriptor(&self, ret: &ParamSpec) -> Result<String, RegistrationError> {
        let mut descriptor = self.args_descriptor.clone();
        ret.append_descriptor(&mut descriptor, true)?;
        Ok(descriptor)
    }
}

/// A resolved method the translator is looking at: the unit of binding
/// lookup and the payload of invoke nodes.
///
/// Construction trusts the descriptor string; method references come from
/// the host's resolution machinery, not from guest input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    declaring: TypeName,
    name: String,
    descriptor: String,
    is_static: bool,
    has_body: bool,
}

impl MethodRef {
    pub fn new(
        declaring: TypeName,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        is_static: bool,
    ) -> Self {
        Self {
            declaring,
            name: name.into(),
            descriptor: descriptor.into(),
            is_static,
            has_body: true,
        }
    }

    /// Mark this method as having no executable body (native or abstract).
    /// Such a method can never root an intrinsic compilation.
    pub fn without_body(mut self) -> Self {
        self.has_body = false;
        self
    }

    #[inline]
    pub fn declaring(&self) -> &TypeName {
        &self.declaring
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full descriptor including the return kind, e.g. `(IJ)I`.
    #[inline]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn has_body(&self) -> bool {
        self.has_body
    }

    /// Deterministic identity hash over declaring type, name and full
    /// descriptor.
    pub fn hash(&self) -> MethodHash {
        MethodHash::from_parts(self.declaring.hash(), &self.name, &self.descriptor)
    }

    /// Operand-stack kinds of the declared parameters, receiver excluded.
    pub fn param_kinds(&self) -> Result<SmallVec<[ValueKind; 4]>, BuildError> {
        let mut kinds = SmallVec::new();
        let mut chars = self.descriptor.char_indices();
        match chars.next() {
            Some((_, '(')) => {}
            _ => return Err(self.malformed()),
        }
        loop {
            let Some((_, ch)) = chars.next() else {
                return Err(self.malformed());
            };
            match ch {
                ')' => return Ok(kinds),
                'L' => {
                    kinds.push(ValueKind::Ref);
                    if !chars.any(|(_, c)| c == ';') {
                        return Err(self.malformed());
                    }
                }
                '[' => {
                    kinds.push(ValueKind::Ref);
                    // consume the element spec without recording it
                    loop {
                        match chars.next() {
                            Some((_, '[')) => continue,
                            Some((_, 'L')) => {
                                if !chars.any(|(_, c)| c == ';') {
                                    return Err(self.malformed());
                                }
                                break;
                            }
                            Some((_, c)) if ValueKind::from_tag(c).is_some() && c != 'V' => break,
                            _ => return Err(self.malformed()),
                        }
                    }
                }
                c => match ValueKind::from_tag(c) {
                    Some(ValueKind::Void) | None => return Err(self.malformed()),
                    Some(kind) => kinds.push(kind),
                },
            }
        }
    }

    /// Number of arguments a call site passes to this method, receiver
    /// included for non-static methods.
    pub fn invoked_arg_count(&self) -> Result<usize, BuildError> {
        let declared = self.param_kinds()?.len();
        Ok(declared + usize::from(!self.is_static))
    }

    /// The declared return kind.
    pub fn return_kind(&self) -> Result<ValueKind, BuildError> {
        let close = self.descriptor.find(')').ok_or_else(|| self.malformed())?;
        let ret = &self.descriptor[close + 1..];
        let mut chars = ret.chars();
        match chars.next() {
            Some('L') | Some('[') => Ok(ValueKind::Ref),
            Some(c) => ValueKind::from_tag(c).ok_or_else(|| self.malformed()),
            None => Err(self.malformed()),
        }
    }

    fn malformed(&self) -> BuildError {
        BuildError::MalformedDescriptor {
            descriptor: self.descriptor.clone(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring, self.name, self.descriptor)
    }
}

/// Shared handle to a method reference; cloned into bindings, invoke nodes
/// and intrinsic contexts.
pub type MethodRefHandle = Arc<MethodRef>;
