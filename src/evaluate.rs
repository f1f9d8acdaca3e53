//! One-shot evaluation without handles.

use celrt_core::evaluator::Activation;
use celrt_core::{Env, EnvOption};
use serde_json::{Map, Value as Json};
use tracing::instrument;

use crate::error::Result;
use crate::values::{from_json, infer_type, to_json};

/// Compile and evaluate `expr` once.
///
/// Each variable is declared with a type inferred from its value: booleans,
/// numbers and strings keep their type, lists and maps hold `dyn`.
///
/// ```
/// use serde_json::json;
///
/// assert_eq!(celrt::evaluate("10 + 20 * 2", &Default::default()).unwrap(), json!(50));
/// let vars = json!({"x": 10, "y": 20});
/// assert_eq!(celrt::evaluate("x + y", vars.as_object().unwrap()).unwrap(), json!(30));
/// ```
#[instrument(skip(vars), fields(vars = vars.len()))]
pub fn evaluate(expr: &str, vars: &Map<String, Json>) -> Result<Json> {
    let mut declarations = Vec::with_capacity(vars.len());
    let mut activation = Activation::new();
    for (name, json) in vars {
        let ty = infer_type(json);
        activation.insert(name.clone(), from_json(json, Some(&ty))?);
        declarations.push(EnvOption::variable(name.clone(), ty));
    }
    let env = Env::new(declarations)?;
    let program = env.program(env.compile(expr)?)?;
    Ok(to_json(&program.eval(&activation)?))
}
