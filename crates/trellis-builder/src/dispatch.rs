//! Call-site dispatch: probe the lookup source for an extension and run
//! it under the call contract.

use std::sync::Arc;

use trellis_core::node::NodeId;
use trellis_core::{BuildError, MethodRef, RegistrationError, TrellisError};

use crate::context::GraphBuilder;
use crate::plugin::{InvokePlugin, Receiver};

/// Source of extension lookups consulted at call sites.
///
/// Implemented by the plugin registry; the indirection keeps graph
/// building independent of how bindings are stored.
pub trait PluginLookup: Send + Sync {
    /// The extension bound to `method`, if any. The first lookup against
    /// an open registry runs its deferred registration tasks, which can
    /// fail; that failure is replayed on every later lookup.
    fn lookup_plugin(
        &self,
        method: &MethodRef,
    ) -> Result<Option<Arc<dyn InvokePlugin>>, RegistrationError>;
}

/// Try to substitute a call site with a registered extension.
///
/// Returns `Ok(true)` when the call was replaced and its result, if any,
/// pushed by the extension; `Ok(false)` when no extension is bound or the
/// bound one declined.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn try_substitute(
    b: &mut dyn GraphBuilder,
    plugins: &dyn PluginLookup,
    method: &Arc<MethodRef>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let Some(plugin) = plugins.lookup_plugin(method)? else {
        return Ok(false);
    };
    apply_plugin(b, plugin.as_ref(), method, args)
}

/// Run one extension against a call site, enforcing the call contract:
/// the argument count must match the target, the receiver of a non-static
/// call is split off and handed over through [`Receiver`], and a
/// successful non-static substitution must have null-checked it.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn apply_plugin(
    b: &mut dyn GraphBuilder,
    plugin: &dyn InvokePlugin,
    method: &Arc<MethodRef>,
    args: &[NodeId],
) -> Result<bool, TrellisError> {
    let expected = method.invoked_arg_count()?;
    if args.len() != expected {
        return Err(BuildError::ArityMismatch {
            method: method.to_string(),
            expected,
            found: args.len(),
        }
        .into());
    }
    let applied = if method.is_static() {
        plugin.apply(b, method, None, args)?
    } else {
        let mut receiver = Receiver::new(args[0]);
        let applied = plugin.apply(b, method, Some(&mut receiver), &args[1..])?;
        if applied && !receiver.was_checked() {
            return Err(BuildError::UncheckedReceiver {
                method: method.to_string(),
            }
            .into());
        }
        applied
    };
    if applied {
        tracing::trace!(method = %method, "call substituted");
    }
    Ok(applied)
}
