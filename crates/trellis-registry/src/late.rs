//! Append-only chain for late-discovered types.
//!
//! Some declaring types only become known after general registration has
//! settled (host classes loaded on demand). Their bindings are published
//! as immutable nodes prepended to a lock-free chain: readers traverse a
//! snapshot without taking any lock, writers serialize on a mutex and
//! swap in the new head. Each type may be published at most once, and
//! sealing the registry prepends a permanent closed sentinel after which
//! no further publication is accepted.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use trellis_builder::InvokePlugin;
use trellis_core::{MethodRef, RegistrationError, TypeName};

use crate::binding::{Binding, ClassBindings};

struct LateNode {
    /// `None` marks the closed sentinel.
    class: Option<TypeName>,
    bindings: ClassBindings,
    next: Option<Arc<LateNode>>,
}

pub(crate) struct LateChain {
    head: ArcSwapOption<LateNode>,
    write: Mutex<()>,
}

impl LateChain {
    pub(crate) fn new() -> Self {
        Self {
            head: ArcSwapOption::empty(),
            write: Mutex::new(()),
        }
    }

    /// Publish `bindings` for `class`. Fails if the chain is closed or
    /// the class was already published.
    pub(crate) fn register(
        &self,
        class: TypeName,
        bindings: ClassBindings,
    ) -> Result<(), RegistrationError> {
        let _guard = self.write.lock();
        let head = self.head.load_full();
        let mut node = head.as_deref();
        while let Some(n) = node {
            match &n.class {
                None => return Err(RegistrationError::LateRegistrationClosed),
                Some(existing) if *existing == class => {
                    return Err(RegistrationError::DuplicateLateRegistration {
                        declaring: class.to_string(),
                    });
                }
                Some(_) => {}
            }
            node = n.next.as_deref();
        }
        self.head.store(Some(Arc::new(LateNode {
            class: Some(class),
            bindings,
            next: head,
        })));
        Ok(())
    }

    /// Prepend the closed sentinel. Idempotent.
    pub(crate) fn close(&self) {
        let _guard = self.write.lock();
        let head = self.head.load_full();
        if head.as_deref().is_some_and(|n| n.class.is_none()) {
            return;
        }
        self.head.store(Some(Arc::new(LateNode {
            class: None,
            bindings: ClassBindings::default(),
            next: head,
        })));
    }

    /// Walk newest-first; the first node for the method's declaring type
    /// decides the outcome, hit or miss.
    pub(crate) fn find(&self, method: &MethodRef) -> Option<Arc<dyn InvokePlugin>> {
        let guard = self.head.load();
        let mut node = guard.as_deref();
        while let Some(n) = node {
            if let Some(class) = &n.class {
                if class == method.declaring() {
                    return n.bindings.find(method).map(|b| b.plugin().clone());
                }
            }
            node = n.next.as_deref();
        }
        None
    }

    pub(crate) fn is_empty(&self) -> bool {
        let guard = self.head.load();
        let mut node = guard.as_deref();
        while let Some(n) = node {
            if n.class.is_some() {
                return false;
            }
            node = n.next.as_deref();
        }
        true
    }

    pub(crate) fn for_each_binding(&self, mut f: impl FnMut(&TypeName, &Binding)) {
        let guard = self.head.load();
        let mut node = guard.as_deref();
        while let Some(n) = node {
            if let Some(class) = &n.class {
                for binding in n.bindings.bindings() {
                    f(class, binding);
                }
            }
            node = n.next.as_deref();
        }
    }
}
