//! Bindings and the per-type chains that store them.
//!
//! A [`Binding`] pairs a match key (method name, staticness, argument
//! signature) with the plugin to run. Bindings for one declaring type
//! live in a [`ClassBindings`] table keyed by method name; bindings that
//! share a name form an immutable singly linked chain with the most
//! recent registration at the head. Lookup walks head-first and stops at
//! the first full match, so a shadowing registration wins without ever
//! touching the older node.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use trellis_builder::InvokePlugin;
use trellis_core::{MethodRef, RegistrationError, Signature, TypeName};

/// One registered plugin binding.
#[derive(Clone)]
pub struct Binding {
    name: String,
    signature: Signature,
    plugin: Arc<dyn InvokePlugin>,
}

impl Binding {
    pub fn new(
        name: impl Into<String>,
        signature: Signature,
        plugin: Arc<dyn InvokePlugin>,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            plugin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn plugin(&self) -> &Arc<dyn InvokePlugin> {
        &self.plugin
    }

    /// A binding without a receiver parameter targets a static method.
    pub fn is_static(&self) -> bool {
        !self.signature.has_receiver()
    }

    /// Whether this binding applies to `method`: staticness and name must
    /// be equal and the argument descriptor must prefix the method's
    /// full descriptor.
    pub fn matches(&self, method: &MethodRef) -> bool {
        self.is_static() == method.is_static()
            && self.name == method.name()
            && self.signature.matches(method.descriptor())
    }

    /// Two bindings with the same key occupy the same slot; registering
    /// both is an error unless overwrite is allowed.
    fn same_key(&self, other: &Binding) -> bool {
        self.is_static() == other.is_static()
            && self.name == other.name
            && self.signature.args_descriptor() == other.signature.args_descriptor()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("descriptor", &self.signature.args_descriptor())
            .field("static", &self.is_static())
            .finish()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            write!(f, "static {}{}", self.name, self.signature.args_descriptor())
        } else {
            write!(f, "{}{}", self.name, self.signature.args_descriptor())
        }
    }
}

/// A node in an immutable per-name binding chain.
#[derive(Debug)]
pub(crate) struct ChainNode {
    binding: Binding,
    next: Option<Arc<ChainNode>>,
}

/// All bindings registered for one declaring type.
#[derive(Debug, Default)]
pub(crate) struct ClassBindings {
    by_name: FxHashMap<String, Arc<ChainNode>>,
}

impl ClassBindings {
    /// Insert at the head of the name's chain. Rejects a binding whose
    /// key is already present unless `allow_overwrite` is set; an
    /// overwriting binding shadows the old one rather than removing it.
    pub(crate) fn insert(
        &mut self,
        declaring: &TypeName,
        binding: Binding,
        allow_overwrite: bool,
    ) -> Result<(), RegistrationError> {
        if !allow_overwrite && self.conflicts(&binding) {
            return Err(RegistrationError::DuplicateBinding {
                declaring: declaring.to_string(),
                name: binding.name.clone(),
                descriptor: binding.signature.args_descriptor().to_string(),
            });
        }
        let next = self.by_name.get(&binding.name).cloned();
        let name = binding.name.clone();
        self.by_name.insert(name, Arc::new(ChainNode { binding, next }));
        Ok(())
    }

    fn conflicts(&self, binding: &Binding) -> bool {
        let Some(head) = self.by_name.get(&binding.name) else {
            return false;
        };
        let mut node = head;
        loop {
            if node.binding.same_key(binding) {
                return true;
            }
            match &node.next {
                Some(next) => node = next,
                None => return false,
            }
        }
    }

    /// The most recent binding matching `method`, if any.
    pub(crate) fn find(&self, method: &MethodRef) -> Option<&Binding> {
        let mut node = self.by_name.get(method.name())?;
        loop {
            if node.binding.matches(method) {
                return Some(&node.binding);
            }
            node = node.next.as_ref()?;
        }
    }

    /// All bindings, in no particular order.
    pub(crate) fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.by_name.values().flat_map(|head| ChainIter {
            node: Some(head),
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings().count()
    }
}

struct ChainIter<'a> {
    node: Option<&'a Arc<ChainNode>>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Binding;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.node?;
        self.node = node.next.as_ref();
        Some(&node.binding)
    }
}
