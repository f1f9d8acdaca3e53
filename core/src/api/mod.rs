//! Public API for compiling and running CEL expressions.
//!
//! The flow is environment, then checked expression, then program:
//!
//! 1. [`Env::new`] declares variables, functions and features
//! 2. [`Env::compile`] parses and type-checks source text
//! 3. [`Env::program`] binds function implementations into a [`Program`]
//! 4. [`Program::eval`] runs it against an [`crate::evaluator::Activation`]
//!
//! # Example
//!
//! ```
//! use celrt_core::api::{Env, EnvOption};
//! use celrt_core::evaluator::Activation;
//! use celrt_core::types::Type;
//! use celrt_core::values::Value;
//!
//! let env = Env::new([
//!     EnvOption::variable("x", Type::Int),
//!     EnvOption::variable("y", Type::Int),
//! ])
//! .unwrap();
//! let program = env.program(env.compile("x + y").unwrap()).unwrap();
//! let activation = Activation::new().with("x", 10i64).with("y", 20i64);
//! assert_eq!(program.eval(&activation).unwrap(), Value::Int(30));
//! ```

pub mod engine;
pub mod environment;
pub mod error;
pub mod expression;
pub mod options;
pub mod validator;

pub use engine::Env;
pub use environment::EnvOption;
pub use error::{Diagnostic, Error, Issues, Severity};
pub use expression::Program;
pub use options::ExecutionOptions;
pub use validator::{AstValidator, DiagnosticSink, ValidationContext};
