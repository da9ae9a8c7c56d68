//! Trellis standard plugin suite.
//!
//! Canonical substitutions for the `lang.*` runtime types, written the
//! way a host embedding is expected to write its own: named handler
//! functions wrapped in [`FnPlugin`](trellis_builder::FnPlugin),
//! registered per declaring type. The suites double as an end-to-end
//! exercise of the engine: pure arithmetic (`lang.Math`), checked
//! division (`lang.Integer`), and receiver/state-touching operations
//! (`lang.Array`).
//!
//! # Example
//!
//! ```
//! use trellis_registry::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! trellis_plugins::register_standard(&registry)?;
//! registry.seal()?;
//! assert!(!registry.is_empty());
//! # Ok::<(), trellis_core::RegistrationError>(())
//! ```

pub mod array;
pub mod integer;
pub mod math;

use trellis_core::RegistrationError;
use trellis_registry::PluginRegistry;

pub use array::ARRAY_TYPE;
pub use integer::INTEGER_TYPE;
pub use math::MATH_TYPE;

/// Register every standard suite.
pub fn register_standard(registry: &PluginRegistry) -> Result<(), RegistrationError> {
    math::register(registry)?;
    integer::register(registry)?;
    array::register(registry)?;
    Ok(())
}
