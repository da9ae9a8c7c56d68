//! Host resolution hooks consulted at registration time.
//!
//! The registry itself has no notion of a loaded class universe; the host
//! compiler injects one through [`HostResolver`]. Resolution answers only
//! one question per binding: does the named type (and method) exist right
//! now? Optional bindings for unresolved names are skipped silently,
//! required ones fail registration.

use trellis_core::{MethodRef, TypeName};

/// An opaque handle to a host-resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    name: TypeName,
}

impl TypeHandle {
    pub fn new(name: TypeName) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }
}

/// Resolves registered names against the host's type universe.
pub trait HostResolver: Send + Sync {
    /// Resolve a declaring type by its dotted name. `None` means the type
    /// is not (yet) known to the host.
    fn resolve_type(&self, name: &TypeName) -> Option<TypeHandle>;

    /// Resolve a method of `declaring` by name and argument descriptor,
    /// e.g. `("abs", "(I)")`. `None` means no such method exists.
    fn resolve_method(
        &self,
        declaring: &TypeHandle,
        name: &str,
        args_descriptor: &str,
    ) -> Option<MethodRef>;
}
