//! Trellis registry crate.
//!
//! Registration and lookup of call-substitution plugins: per-type binding
//! tables, the deferred registration queue, the late binding chain, the
//! test overlay, and host-resolution hooks. The dispatch side that runs a
//! found plugin lives in `trellis-builder`.

pub mod binding;
mod deferred;
pub mod filter;
mod late;
pub mod options;
pub mod registration;
pub mod registry;
pub mod resolver;

pub use binding::Binding;
pub use filter::MethodFilter;
pub use options::RegistryOptions;
pub use registration::{LateRegistration, Registration};
pub use registry::PluginRegistry;
pub use resolver::{HostResolver, TypeHandle};
