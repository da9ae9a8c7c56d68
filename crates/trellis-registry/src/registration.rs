//! Registration handles scoped to one declaring type.

use trellis_core::{RegistrationError, TypeName};

use crate::binding::{Binding, ClassBindings};
use crate::registry::PluginRegistry;

/// Registers bindings for one declaring type.
///
/// Obtained from [`PluginRegistry::register`]; every call targets the
/// same type, so plugin suites read as a block per class.
///
/// # Example
///
/// ```
/// use trellis_builder::FnPlugin;
/// use trellis_core::{ParamSpec, Signature, ValueKind};
/// use trellis_registry::binding::Binding;
/// use trellis_registry::registry::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// let math = registry.register("demo.Math");
/// let abs = Signature::of([ParamSpec::Kind(ValueKind::I32)])?;
/// math.register(Binding::new("abs", abs, FnPlugin::arc(|_, _, _, _| Ok(true))))?;
/// # Ok::<(), trellis_core::RegistrationError>(())
/// ```
pub struct Registration<'a> {
    registry: &'a PluginRegistry,
    declaring: TypeName,
    allow_overwrite: bool,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(registry: &'a PluginRegistry, declaring: TypeName) -> Self {
        Self {
            registry,
            declaring,
            allow_overwrite: false,
        }
    }

    /// Let later bindings shadow earlier ones with the same key.
    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn declaring(&self) -> &TypeName {
        &self.declaring
    }

    /// Register one binding for this type.
    pub fn register(&self, binding: Binding) -> Result<(), RegistrationError> {
        self.registry
            .register_binding(&self.declaring, binding, self.allow_overwrite)
    }

    /// Register only when `condition` holds; a disabled feature skips
    /// silently.
    pub fn register_conditional(
        &self,
        condition: bool,
        binding: Binding,
    ) -> Result<(), RegistrationError> {
        if condition {
            self.register(binding)
        } else {
            tracing::trace!(
                declaring = %self.declaring,
                binding = %binding,
                "skipping conditional binding"
            );
            Ok(())
        }
    }
}

/// Collects bindings for one late-discovered type and publishes them
/// atomically on [`commit`](LateRegistration::commit).
///
/// Nothing is visible to lookups until commit; dropping the handle
/// without committing discards the batch.
pub struct LateRegistration<'a> {
    registry: &'a PluginRegistry,
    declaring: TypeName,
    bindings: ClassBindings,
    committed: bool,
}

impl<'a> LateRegistration<'a> {
    pub(crate) fn new(registry: &'a PluginRegistry, declaring: TypeName) -> Self {
        Self {
            registry,
            declaring,
            bindings: ClassBindings::default(),
            committed: false,
        }
    }

    pub fn declaring(&self) -> &TypeName {
        &self.declaring
    }

    /// Add a binding to the pending batch.
    pub fn register(&mut self, binding: Binding) -> Result<(), RegistrationError> {
        self.bindings.insert(&self.declaring, binding, false)
    }

    /// Publish the batch. Fails if the type was already published late
    /// or the registry has been sealed.
    pub fn commit(mut self) -> Result<(), RegistrationError> {
        self.committed = true;
        let bindings = std::mem::take(&mut self.bindings);
        let declaring = self.declaring.clone();
        self.registry.commit_late(declaring, bindings)
    }
}

impl Drop for LateRegistration<'_> {
    fn drop(&mut self) {
        debug_assert!(
            self.committed || self.bindings.is_empty(),
            "late registration for {} dropped without commit",
            self.declaring
        );
    }
}
