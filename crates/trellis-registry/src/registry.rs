//! The plugin registry: which invoked methods get substituted, and by what.
//!
//! A [`PluginRegistry`] maps method identities to [`InvokePlugin`]s. It
//! passes through two phases: an *open* phase in which the host registers
//! bindings, and a *sealed* phase after [`seal`](PluginRegistry::seal) in
//! which the tables are immutable and lookups are the only traffic. A
//! registry can also be born *resolved*: a frozen hash table keyed by
//! method identity, for hosts that precompute their full plugin set.
//!
//! # Storage Model
//!
//! - **Class tables.** An open registry keeps one binding table per
//!   declaring type behind an `RwLock`. Within a table, bindings that
//!   share a method name form an immutable chain with the newest node at
//!   the head, so shadowing never mutates an older node.
//! - **Deferred queue.** Registration work can be queued and run lazily
//!   at the first lookup. The queue settles exactly once; a failure is
//!   cached and re-raised verbatim by every later lookup.
//! - **Late chain.** Types discovered after general registration publish
//!   their bindings onto a lock-free append-only chain, at most once per
//!   type. Sealing prepends a permanent closed sentinel.
//! - **Overlay.** Tests shadow bindings through an RCU hash map. With no
//!   overlay installed the probe is a single atomic load, so production
//!   lookups pay nothing for the capability.
//!
//! # Thread Safety
//!
//! Lookups hold the class-table read lock only while probing one table;
//! the late chain and the overlay are read through `arc-swap` snapshots
//! without any lock. A lookup that races a deferred flush blocks on a
//! condvar until the flushing thread settles the queue, so every caller
//! observes the same outcome.
//!
//! # Probe Order
//!
//! Parent chain first, then the registry's own tables, then the late
//! chain newest-first, then the overlay. The disabled-plugin filter is
//! applied to whatever the probe found.
//!
//! # Example
//!
//! ```
//! use trellis_builder::FnPlugin;
//! use trellis_core::{MethodRef, ParamSpec, Signature, TypeName, ValueKind};
//! use trellis_registry::binding::Binding;
//! use trellis_registry::registry::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! let math = registry.register("demo.Math");
//! let abs = Signature::of([ParamSpec::Kind(ValueKind::I32)])?;
//! math.register(Binding::new("abs", abs, FnPlugin::arc(|_, _, _, _| Ok(true))))?;
//! registry.seal()?;
//!
//! let method = MethodRef::new(TypeName::new("demo.Math"), "abs", "(I)I", true);
//! assert!(registry.lookup(&method)?.is_some());
//! # Ok::<(), trellis_core::RegistrationError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use trellis_builder::{InvokePlugin, PluginLookup};
use trellis_core::{MethodHash, MethodRef, RegistrationError, TypeName};

use crate::binding::{Binding, ClassBindings};
use crate::deferred::DeferredQueue;
use crate::filter::MethodFilter;
use crate::late::LateChain;
use crate::options::RegistryOptions;
use crate::registration::{LateRegistration, Registration};
use crate::resolver::HostResolver;

// ============================================================================
// Storage
// ============================================================================

/// One frozen entry of a resolved registry.
struct ResolvedBinding {
    method: Arc<MethodRef>,
    plugin: Arc<dyn InvokePlugin>,
}

enum Tables {
    /// Mutable per-type tables, the normal construction mode.
    Open {
        classes: RwLock<FxHashMap<TypeName, ClassBindings>>,
        deferred: DeferredQueue,
        late: LateChain,
        sealed: AtomicBool,
    },
    /// Bindings resolved ahead of time and frozen at construction.
    Resolved {
        plugins: FxHashMap<MethodHash, ResolvedBinding>,
    },
}

// ============================================================================
// Registry
// ============================================================================

/// Maps invoked methods to the plugins that substitute them.
pub struct PluginRegistry {
    /// Probed before this registry's own tables; parent hits win.
    parent: Option<Arc<PluginRegistry>>,
    tables: Tables,
    /// Test-time shadow bindings. `None` whenever no overlay is
    /// installed, which keeps the production probe to one atomic load.
    overlay: ArcSwapOption<FxHashMap<MethodHash, Arc<dyn InvokePlugin>>>,
    overlay_write: Mutex<()>,
    options: RegistryOptions,
    /// Filter compiled from `options.disabled_plugins()` on first use.
    disabled: OnceLock<Option<MethodFilter>>,
    resolver: Option<Arc<dyn HostResolver>>,
}

impl PluginRegistry {
    /// An empty open registry with default options.
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            parent: None,
            tables: Tables::Open {
                classes: RwLock::new(FxHashMap::default()),
                deferred: DeferredQueue::new(),
                late: LateChain::new(),
                sealed: AtomicBool::new(false),
            },
            overlay: ArcSwapOption::empty(),
            overlay_write: Mutex::new(()),
            options,
            disabled: OnceLock::new(),
            resolver: None,
        }
    }

    /// A registry whose bindings were resolved ahead of time. It is
    /// sealed from birth; lookups are a single hash probe.
    pub fn resolved(
        entries: impl IntoIterator<Item = (MethodRef, Arc<dyn InvokePlugin>)>,
    ) -> Self {
        let plugins = entries
            .into_iter()
            .map(|(method, plugin)| {
                let method = Arc::new(method);
                (method.hash(), ResolvedBinding { method, plugin })
            })
            .collect();
        Self {
            parent: None,
            tables: Tables::Resolved { plugins },
            overlay: ArcSwapOption::empty(),
            overlay_write: Mutex::new(()),
            options: RegistryOptions::default(),
            disabled: OnceLock::new(),
            resolver: None,
        }
    }

    /// Chain a parent registry. Lookups probe the parent first, so its
    /// bindings shadow this registry's own.
    pub fn with_parent(mut self, parent: Arc<PluginRegistry>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Validate future registrations against a host resolver: required
    /// bindings for names the host cannot resolve fail, optional ones
    /// are skipped.
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn parent(&self) -> Option<&Arc<PluginRegistry>> {
        self.parent.as_ref()
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// A registration handle scoped to `declaring`.
    pub fn register(&self, declaring: impl Into<TypeName>) -> Registration<'_> {
        Registration::new(self, declaring.into())
    }

    /// Collect bindings for a type discovered after general registration;
    /// nothing is visible until the handle commits.
    pub fn late_register(&self, declaring: impl Into<TypeName>) -> LateRegistration<'_> {
        LateRegistration::new(self, declaring.into())
    }

    /// Queue registration work to run at the first lookup (or at seal,
    /// whichever happens first).
    pub fn defer(
        &self,
        task: impl FnOnce(&PluginRegistry) -> Result<(), RegistrationError> + Send + 'static,
    ) -> Result<(), RegistrationError> {
        let Tables::Open { deferred, .. } = &self.tables else {
            return Err(RegistrationError::Sealed);
        };
        deferred.push(Box::new(task))
    }

    /// Close registration: run pending deferred tasks, close the late
    /// chain, and reject all further registration. Idempotent.
    pub fn seal(&self) -> Result<(), RegistrationError> {
        let Tables::Open {
            deferred,
            late,
            sealed,
            ..
        } = &self.tables
        else {
            return Ok(());
        };
        if sealed.load(Ordering::Acquire) {
            return Ok(());
        }
        deferred.flush(self)?;
        late.close();
        sealed.store(true, Ordering::Release);
        tracing::debug!(bindings = self.binding_count(), "sealed plugin registry");
        if self.options.dump_on_seal() {
            tracing::info!(registry = %self, "binding table at seal");
        }
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        match &self.tables {
            Tables::Open { sealed, .. } => sealed.load(Ordering::Acquire),
            Tables::Resolved { .. } => true,
        }
    }

    pub(crate) fn register_binding(
        &self,
        declaring: &TypeName,
        binding: Binding,
        allow_overwrite: bool,
    ) -> Result<(), RegistrationError> {
        let Tables::Open {
            classes, sealed, ..
        } = &self.tables
        else {
            return Err(RegistrationError::Sealed);
        };
        if sealed.load(Ordering::Acquire) {
            return Err(RegistrationError::Sealed);
        }
        if !self.validate_binding(declaring, &binding)? {
            return Ok(());
        }
        let description = binding.to_string();
        let mut classes = classes.write();
        classes
            .entry(declaring.clone())
            .or_default()
            .insert(declaring, binding, allow_overwrite)?;
        drop(classes);
        tracing::trace!(declaring = %declaring, binding = %description, "registered binding");
        Ok(())
    }

    pub(crate) fn commit_late(
        &self,
        declaring: TypeName,
        bindings: ClassBindings,
    ) -> Result<(), RegistrationError> {
        let Tables::Open { late, .. } = &self.tables else {
            return Err(RegistrationError::Sealed);
        };
        let count = bindings.len();
        late.register(declaring.clone(), bindings)?;
        tracing::debug!(declaring = %declaring, bindings = count, "published late bindings");
        Ok(())
    }

    /// `Ok(true)` to proceed, `Ok(false)` to skip an optional binding the
    /// host cannot resolve.
    fn validate_binding(
        &self,
        declaring: &TypeName,
        binding: &Binding,
    ) -> Result<bool, RegistrationError> {
        let Some(resolver) = &self.resolver else {
            return Ok(true);
        };
        let optional = binding.plugin().is_optional();
        let Some(handle) = resolver.resolve_type(declaring) else {
            if optional {
                tracing::trace!(
                    declaring = %declaring,
                    binding = %binding,
                    "skipping optional binding for unresolved type"
                );
                return Ok(false);
            }
            return Err(RegistrationError::UnresolvedType {
                name: declaring.to_string(),
            });
        };
        let resolved = resolver.resolve_method(
            &handle,
            binding.name(),
            binding.signature().args_descriptor(),
        );
        if resolved.is_none() {
            if optional {
                tracing::trace!(
                    declaring = %declaring,
                    binding = %binding,
                    "skipping optional binding for unresolved method"
                );
                return Ok(false);
            }
            return Err(RegistrationError::UnresolvedMethod {
                declaring: declaring.to_string(),
                name: binding.name().to_string(),
                descriptor: binding.signature().args_descriptor().to_string(),
            });
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// The plugin bound to `method`, if any.
    ///
    /// An open registry runs its deferred queue before probing; a failure
    /// recorded there is returned by this and every later call.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn lookup(
        &self,
        method: &MethodRef,
    ) -> Result<Option<Arc<dyn InvokePlugin>>, RegistrationError> {
        let mut found = None;
        if let Some(parent) = &self.parent {
            found = parent.lookup(method)?;
        }
        if found.is_none() {
            found = match &self.tables {
                Tables::Resolved { plugins } => {
                    plugins.get(&method.hash()).map(|r| r.plugin.clone())
                }
                Tables::Open {
                    classes,
                    deferred,
                    late,
                    ..
                } => {
                    deferred.flush(self)?;
                    let hit = {
                        let classes = classes.read();
                        classes
                            .get(method.declaring())
                            .and_then(|bindings| bindings.find(method))
                            .map(|binding| binding.plugin().clone())
                    };
                    match hit {
                        Some(plugin) => Some(plugin),
                        None => late.find(method),
                    }
                }
            };
        }
        if found.is_none() {
            found = self.overlay_find(method);
        }
        let found = self.apply_filter(method, found);
        if found.is_some() {
            tracing::trace!(method = %method, "plugin lookup hit");
        }
        Ok(found)
    }

    /// Called by hosts when a method they expected to be substituted came
    /// back without a plugin.
    pub fn notify_no_plugin(&self, method: &MethodRef) {
        if self.options.warn_missing() {
            tracing::warn!(method = %method, "no plugin bound for method");
        }
    }

    fn overlay_find(&self, method: &MethodRef) -> Option<Arc<dyn InvokePlugin>> {
        let guard = self.overlay.load();
        guard.as_ref().and_then(|map| map.get(&method.hash()).cloned())
    }

    fn apply_filter(
        &self,
        method: &MethodRef,
        found: Option<Arc<dyn InvokePlugin>>,
    ) -> Option<Arc<dyn InvokePlugin>> {
        let plugin = found?;
        if !plugin.can_be_disabled() {
            return Some(plugin);
        }
        let filter = self
            .disabled
            .get_or_init(|| self.options.disabled_plugins().map(MethodFilter::parse));
        match filter {
            Some(filter) if filter.matches(method.declaring(), method.name()) => {
                tracing::debug!(method = %method, "plugin disabled by filter");
                None
            }
            _ => Some(plugin),
        }
    }

    // ------------------------------------------------------------------------
    // Overlay
    // ------------------------------------------------------------------------

    /// Shadow `method` with `plugin` until removed. Intended for tests;
    /// overlay hits follow every other probe, so a real binding for the
    /// same method still wins.
    pub fn overlay_bind(&self, method: &MethodRef, plugin: Arc<dyn InvokePlugin>) {
        let _guard = self.overlay_write.lock();
        let mut map = match self.overlay.load_full() {
            Some(current) => (*current).clone(),
            None => FxHashMap::default(),
        };
        map.insert(method.hash(), plugin);
        self.overlay.store(Some(Arc::new(map)));
    }

    pub fn overlay_remove(&self, method: &MethodRef) {
        let _guard = self.overlay_write.lock();
        let Some(current) = self.overlay.load_full() else {
            return;
        };
        let mut map = (*current).clone();
        map.remove(&method.hash());
        self.overlay.store(if map.is_empty() {
            None
        } else {
            Some(Arc::new(map))
        });
    }

    pub fn overlay_clear(&self) {
        let _guard = self.overlay_write.lock();
        self.overlay.store(None);
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Whether any binding is registered in this registry's own
    /// persistent tables. The parent chain and the overlay don't count.
    pub fn is_empty(&self) -> bool {
        match &self.tables {
            Tables::Open { classes, late, .. } => classes.read().is_empty() && late.is_empty(),
            Tables::Resolved { plugins } => plugins.is_empty(),
        }
    }

    /// Number of bindings in this registry's own persistent tables.
    pub fn binding_count(&self) -> usize {
        match &self.tables {
            Tables::Open { classes, late, .. } => {
                let mut count: usize = {
                    let classes = classes.read();
                    classes.values().map(ClassBindings::len).sum()
                };
                late.for_each_binding(|_, _| count += 1);
                count
            }
            Tables::Resolved { plugins } => plugins.len(),
        }
    }

    /// Every binding reachable from this registry, parents included, as
    /// sorted `(declaring, description)` pairs. The overlay is a test
    /// artifact and is not reported.
    pub fn collect(&self) -> Vec<(TypeName, String)> {
        let mut entries = Vec::new();
        let mut registry = Some(self);
        while let Some(r) = registry {
            r.collect_own(&mut entries);
            registry = r.parent.as_deref();
        }
        entries.sort();
        entries.dedup();
        entries
    }

    fn collect_own(&self, entries: &mut Vec<(TypeName, String)>) {
        match &self.tables {
            Tables::Open { classes, late, .. } => {
                {
                    let classes = classes.read();
                    for (declaring, bindings) in classes.iter() {
                        for binding in bindings.bindings() {
                            entries.push((declaring.clone(), binding.to_string()));
                        }
                    }
                }
                late.for_each_binding(|declaring, binding| {
                    entries.push((declaring.clone(), binding.to_string()));
                });
            }
            Tables::Resolved { plugins } => {
                for resolved in plugins.values() {
                    entries.push((
                        resolved.method.declaring().clone(),
                        describe_method(&resolved.method),
                    ));
                }
            }
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLookup for PluginRegistry {
    fn lookup_plugin(
        &self,
        method: &MethodRef,
    ) -> Result<Option<Arc<dyn InvokePlugin>>, RegistrationError> {
        self.lookup(method)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("bindings", &self.binding_count())
            .field("sealed", &self.is_sealed())
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (declaring, binding) in self.collect() {
            writeln!(f, "{declaring}: {binding}")?;
        }
        Ok(())
    }
}

/// `Binding`-style description recovered from a resolved method.
fn describe_method(method: &MethodRef) -> String {
    let descriptor = method.descriptor();
    let args = match descriptor.split_once(')') {
        Some((params, _)) => format!("{params})"),
        None => descriptor.to_string(),
    };
    if method.is_static() {
        format!("static {}{}", method.name(), args)
    } else {
        format!("{}{}", method.name(), args)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use trellis_builder::FnPlugin;
    use trellis_core::{ParamSpec, Signature, ValueKind};

    use super::*;
    use crate::resolver::TypeHandle;

    fn plugin() -> Arc<dyn InvokePlugin> {
        FnPlugin::arc(|_, _, _, _| Ok(true))
    }

    fn sig(params: impl IntoIterator<Item = ParamSpec>) -> Signature {
        Signature::of(params).unwrap()
    }

    fn i32_sig() -> Signature {
        sig([ParamSpec::Kind(ValueKind::I32)])
    }

    fn abs_binding(plugin: Arc<dyn InvokePlugin>) -> Binding {
        Binding::new("abs", i32_sig(), plugin)
    }

    fn abs_method() -> MethodRef {
        MethodRef::new(TypeName::new("demo.Math"), "abs", "(I)I", true)
    }

    fn min_method() -> MethodRef {
        MethodRef::new(TypeName::new("demo.Math"), "min", "(II)I", true)
    }

    fn min_binding(plugin: Arc<dyn InvokePlugin>) -> Binding {
        let signature = sig([
            ParamSpec::Kind(ValueKind::I32),
            ParamSpec::Kind(ValueKind::I32),
        ]);
        Binding::new("min", signature, plugin)
    }

    #[test]
    fn register_and_lookup_round_trip() {
        let registry = PluginRegistry::new();
        let abs = plugin();
        registry
            .register("demo.Math")
            .register(abs_binding(abs.clone()))
            .unwrap();

        let found = registry.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &abs));
        assert!(registry.lookup(&min_method()).unwrap().is_none());
        assert_eq!(registry.binding_count(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn overwrite_requires_opt_in() {
        let registry = PluginRegistry::new();
        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();

        let err = registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateBinding { .. }));

        let winner = plugin();
        registry
            .register("demo.Math")
            .with_allow_overwrite(true)
            .register(abs_binding(winner.clone()))
            .unwrap();
        let found = registry.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &winner));
    }

    #[test]
    fn parent_bindings_shadow_the_child() {
        let parent_plugin = plugin();
        let parent = Arc::new(PluginRegistry::new());
        parent
            .register("demo.Math")
            .register(abs_binding(parent_plugin.clone()))
            .unwrap();

        let child_plugin = plugin();
        let child = PluginRegistry::new().with_parent(parent);
        child
            .register("demo.Math")
            .register(abs_binding(child_plugin.clone()))
            .unwrap();
        child
            .register("demo.Math")
            .register(min_binding(child_plugin.clone()))
            .unwrap();

        let found = child.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &parent_plugin));
        // methods the parent does not bind still reach the child's tables
        let found = child.lookup(&min_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &child_plugin));
    }

    #[test]
    fn deferred_tasks_run_once_at_the_first_lookup() {
        let registry = PluginRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        registry
            .defer(move |registry| {
                counter.fetch_add(1, Ordering::Relaxed);
                registry
                    .register("demo.Math")
                    .register(abs_binding(FnPlugin::arc(|_, _, _, _| Ok(true))))
            })
            .unwrap();
        assert_eq!(runs.load(Ordering::Relaxed), 0);

        assert!(registry.lookup(&abs_method()).unwrap().is_some());
        assert!(registry.lookup(&abs_method()).unwrap().is_some());
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn deferred_failure_is_replayed_verbatim() {
        let registry = PluginRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        registry
            .defer(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                Err(RegistrationError::UnresolvedType {
                    name: "demo.Gone".to_string(),
                })
            })
            .unwrap();

        let first = registry.lookup(&abs_method()).unwrap_err();
        let second = registry.lookup(&abs_method()).unwrap_err();
        assert_eq!(
            first,
            RegistrationError::UnresolvedType {
                name: "demo.Gone".to_string(),
            }
        );
        assert_eq!(second, first);
        // the failing task ran exactly once
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn deferring_after_the_flush_is_rejected() {
        let registry = PluginRegistry::new();
        assert!(registry.lookup(&abs_method()).unwrap().is_none());

        let err = registry.defer(|_| Ok(())).unwrap_err();
        assert_eq!(err, RegistrationError::DeferredAfterFlush);
    }

    #[test]
    fn deferred_task_that_looks_up_fails_as_recursive() {
        let registry = PluginRegistry::new();
        registry
            .defer(|registry| registry.lookup(&abs_method()).map(|_| ()))
            .unwrap();

        let err = registry.lookup(&abs_method()).unwrap_err();
        assert_eq!(err, RegistrationError::RecursiveDeferredFlush);
        // recorded like any other deferred failure
        let replay = registry.lookup(&abs_method()).unwrap_err();
        assert_eq!(replay, RegistrationError::RecursiveDeferredFlush);
    }

    #[test]
    fn concurrent_lookups_wait_for_the_flushing_thread() {
        use std::sync::mpsc;

        let registry = PluginRegistry::new();
        let (release, gate) = mpsc::channel::<()>();
        registry
            .defer(move |registry| {
                gate.recv().ok();
                registry
                    .register("demo.Math")
                    .register(abs_binding(FnPlugin::arc(|_, _, _, _| Ok(true))))
            })
            .unwrap();

        std::thread::scope(|scope| {
            let first = scope.spawn(|| registry.lookup(&abs_method()));
            let second = scope.spawn(|| registry.lookup(&abs_method()));
            // whichever thread won the flush is parked on the gate; the
            // other is parked on the condvar or not started yet
            release.send(()).unwrap();
            assert!(first.join().unwrap().unwrap().is_some());
            assert!(second.join().unwrap().unwrap().is_some());
        });
    }

    #[test]
    fn late_bindings_publish_atomically_and_once_per_type() {
        let registry = PluginRegistry::new();
        let handle_plugin = plugin();
        let mut late = registry.late_register("runtime.Handle");
        late.register(Binding::new(
            "get",
            sig([ParamSpec::Receiver]),
            handle_plugin.clone(),
        ))
        .unwrap();
        late.commit().unwrap();

        let get = MethodRef::new(TypeName::new("runtime.Handle"), "get", "()I", false);
        let found = registry.lookup(&get).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &handle_plugin));

        let late = registry.late_register("runtime.Handle");
        assert_eq!(
            late.commit().unwrap_err(),
            RegistrationError::DuplicateLateRegistration {
                declaring: "runtime.Handle".to_string(),
            }
        );
    }

    #[test]
    fn sealing_closes_registration_and_the_late_chain() {
        let registry = PluginRegistry::new();
        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();
        registry.seal().unwrap();
        assert!(registry.is_sealed());

        let err = registry
            .register("demo.Math")
            .register(min_binding(plugin()))
            .unwrap_err();
        assert_eq!(err, RegistrationError::Sealed);

        let err = registry.late_register("runtime.Handle").commit().unwrap_err();
        assert_eq!(err, RegistrationError::LateRegistrationClosed);

        // sealing twice is a no-op, bindings survive
        registry.seal().unwrap();
        assert!(registry.lookup(&abs_method()).unwrap().is_some());
    }

    #[test]
    fn sealing_flushes_the_deferred_queue() {
        let registry = PluginRegistry::new();
        registry
            .defer(|registry| {
                registry
                    .register("demo.Math")
                    .register(abs_binding(FnPlugin::arc(|_, _, _, _| Ok(true))))
            })
            .unwrap();

        registry.seal().unwrap();
        assert!(registry.lookup(&abs_method()).unwrap().is_some());
    }

    #[test]
    fn resolved_registries_are_frozen_hash_probes() {
        let abs = plugin();
        let registry = PluginRegistry::resolved([(abs_method(), abs.clone())]);
        assert!(registry.is_sealed());

        let found = registry.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &abs));
        assert!(registry.lookup(&min_method()).unwrap().is_none());

        let err = registry
            .register("demo.Math")
            .register(min_binding(plugin()))
            .unwrap_err();
        assert_eq!(err, RegistrationError::Sealed);
        assert_eq!(registry.binding_count(), 1);
    }

    #[test]
    fn overlay_shadows_until_cleared() {
        let registry = PluginRegistry::new();
        registry.seal().unwrap();

        let test_plugin = plugin();
        registry.overlay_bind(&abs_method(), test_plugin.clone());
        let found = registry.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &test_plugin));

        registry.overlay_remove(&abs_method());
        assert!(registry.lookup(&abs_method()).unwrap().is_none());

        registry.overlay_bind(&abs_method(), test_plugin.clone());
        registry.overlay_bind(&min_method(), test_plugin.clone());
        registry.overlay_clear();
        assert!(registry.lookup(&abs_method()).unwrap().is_none());
        assert!(registry.lookup(&min_method()).unwrap().is_none());
    }

    #[test]
    fn registered_bindings_win_over_the_overlay() {
        let registry = PluginRegistry::new();
        let real = plugin();
        registry
            .register("demo.Math")
            .register(abs_binding(real.clone()))
            .unwrap();
        registry.overlay_bind(&abs_method(), plugin());

        let found = registry.lookup(&abs_method()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &real));
    }

    #[test]
    fn disabled_filter_suppresses_matching_plugins() {
        let options = RegistryOptions::new().with_disabled_plugins("Math.abs");
        let registry = PluginRegistry::with_options(options);
        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();
        registry
            .register("demo.Math")
            .register(min_binding(plugin()))
            .unwrap();

        assert!(registry.lookup(&abs_method()).unwrap().is_none());
        assert!(registry.lookup(&min_method()).unwrap().is_some());
    }

    #[test]
    fn required_plugins_ignore_the_filter() {
        let options = RegistryOptions::new().with_disabled_plugins("Math.abs");
        let registry = PluginRegistry::with_options(options);
        let required: Arc<dyn InvokePlugin> =
            Arc::new(FnPlugin::new(|_, _, _, _| Ok(true)).required());
        registry
            .register("demo.Math")
            .register(abs_binding(required))
            .unwrap();

        assert!(registry.lookup(&abs_method()).unwrap().is_some());
    }

    struct MathOnlyResolver;

    impl HostResolver for MathOnlyResolver {
        fn resolve_type(&self, name: &TypeName) -> Option<TypeHandle> {
            (name.as_str() == "demo.Math").then(|| TypeHandle::new(name.clone()))
        }

        fn resolve_method(
            &self,
            declaring: &TypeHandle,
            name: &str,
            args_descriptor: &str,
        ) -> Option<MethodRef> {
            (name == "abs" && args_descriptor == "(I)")
                .then(|| MethodRef::new(declaring.name().clone(), name, "(I)I", true))
        }
    }

    #[test]
    fn resolver_gates_registration() {
        let registry = PluginRegistry::new().with_resolver(Arc::new(MathOnlyResolver));

        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();
        assert!(registry.lookup(&abs_method()).unwrap().is_some());

        // optional binding against an unresolved type: skipped silently
        let optional: Arc<dyn InvokePlugin> =
            Arc::new(FnPlugin::new(|_, _, _, _| Ok(true)).optional());
        registry
            .register("demo.Gone")
            .register(abs_binding(optional))
            .unwrap();
        let gone = MethodRef::new(TypeName::new("demo.Gone"), "abs", "(I)I", true);
        assert!(registry.lookup(&gone).unwrap().is_none());

        let err = registry
            .register("demo.Gone")
            .register(abs_binding(plugin()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnresolvedType {
                name: "demo.Gone".to_string(),
            }
        );

        let err = registry
            .register("demo.Math")
            .register(Binding::new(
                "sqrt",
                sig([ParamSpec::Kind(ValueKind::F64)]),
                plugin(),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnresolvedMethod {
                declaring: "demo.Math".to_string(),
                name: "sqrt".to_string(),
                descriptor: "(D)".to_string(),
            }
        );
    }

    #[test]
    fn collect_and_display_list_the_binding_table() {
        let registry = PluginRegistry::new();
        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();
        let mut late = registry.late_register("runtime.Handle");
        late.register(Binding::new("get", sig([ParamSpec::Receiver]), plugin()))
            .unwrap();
        late.commit().unwrap();

        let entries = registry.collect();
        assert!(entries.contains(&(TypeName::new("demo.Math"), "static abs(I)".to_string())));
        assert!(entries.contains(&(TypeName::new("runtime.Handle"), "get()".to_string())));
        assert_eq!(registry.binding_count(), 2);

        let dump = registry.to_string();
        assert!(dump.contains("demo.Math: static abs(I)"));
        assert!(dump.contains("runtime.Handle: get()"));

        // collect reports the whole parent chain; binding_count stays local
        let child = PluginRegistry::new().with_parent(Arc::new(registry));
        child
            .register("demo.Extra")
            .register(min_binding(plugin()))
            .unwrap();
        assert_eq!(child.binding_count(), 1);
        let entries = child.collect();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&(TypeName::new("demo.Math"), "static abs(I)".to_string())));
    }

    #[test]
    fn plugin_lookup_trait_reaches_the_registry() {
        let registry = PluginRegistry::new();
        registry
            .register("demo.Math")
            .register(abs_binding(plugin()))
            .unwrap();

        let lookup: &dyn PluginLookup = &registry;
        assert!(lookup.lookup_plugin(&abs_method()).unwrap().is_some());
    }
}
