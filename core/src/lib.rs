//! CEL (Common Expression Language) engine: parser, checker, standard library
//! and tree-walking interpreter.
//!
//! Most users only need [`api::Env`] and [`api::Program`].

pub mod analyzer;
pub mod api;
pub mod evaluator;
pub mod parser;
pub mod stdlib;
pub mod syntax;
pub mod types;
pub mod values;
pub mod visitor;

pub use api::{Env, EnvOption, Error, Program};
pub use evaluator::{Activation, EvalError};
pub use types::Type;
pub use values::Value;

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_comprehension_scopes() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
