//! Tree-walking evaluator for checked CEL expressions.
//!
//! The evaluator interprets a [`CheckedExpr`] against an [`Activation`] and
//! produces a [`Value`].
//!
//! ## Design Principles
//!
//! - **Never panic**: adversarial inputs produce errors, not crashes
//! - **Stack-safe**: depth tracking bounds recursion on deeply nested trees
//! - **Bounded loops**: an optional budget caps comprehension iterations
//!
//! ## Example
//!
//! ```ignore
//! let env = Env::new([EnvOption::variable("x", Type::Int)])?;
//! let program = env.program(env.compile("x * 2")?)?;
//! let result = program.eval(&Activation::new().with("x", 21))?;
//! assert_eq!(result, Value::Int(42));
//! ```

mod activation;
mod error;
mod eval;
mod operators;

#[cfg(test)]
mod eval_test;

pub use activation::Activation;
pub use error::EvalError;

use hashbrown::HashMap;

use crate::analyzer::{CheckedExpr, OverloadDecl};
use crate::api::ExecutionOptions;
use crate::values::Value;
use crate::values::function::FunctionImpl;

/// Implementation bound to a declared overload.
#[derive(Debug, Clone)]
pub struct OverloadBinding {
    pub decl: OverloadDecl,
    pub function: FunctionImpl,
}

/// Overload bindings by overload id.
pub type Bindings = HashMap<String, OverloadBinding>;

/// Evaluate a checked expression.
pub fn eval(
    checked: &CheckedExpr,
    bindings: &Bindings,
    activation: &Activation,
    options: &ExecutionOptions,
) -> Result<Value, EvalError> {
    eval::Evaluator::new(checked, bindings, activation, options).run()
}
