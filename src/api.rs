//! Host-neutral call surface over JSON.
//!
//! Every function takes JSON arguments and answers with a JSON object that
//! carries either its result or an `error` string, so bindings for other
//! languages only need to move JSON across. Malformed arguments are reported
//! as errors, never as panics.
//!
//! | Function | Arguments | Reply |
//! |---|---|---|
//! | `createEnv` | variables, functions?, options? | `{envID, error}` |
//! | `extendEnv` | envID, options | `{success, error}` |
//! | `compileExpr` | envID, expr | `{programID, error}` |
//! | `compileExprDetailed` | envID, expr | `{success, programID?, issues, error?}` |
//! | `typecheckExpr` | envID, expr | `{type, error}` |
//! | `evalProgram` | programID, vars | `{result, error}` |
//! | `destroyEnv` | envID | `{success, error}` |
//! | `destroyProgram` | programID | `{success, error}` |
//! | `listOptions` | | `{options, error}` |
//! | `evaluateCEL` | expr, vars? | `{result, error}` |
//!
//! Callbacks are registered with [`JsonApi::register_callback`], since a
//! function cannot travel as JSON.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json, json};
use tracing::warn;

use crate::callbacks::Callback;
use crate::error::{Error, Result};
use crate::evaluate::evaluate;
use crate::runtime::Runtime;
use crate::store::{EnvId, ProgramId};

/// JSON front end of a [`Runtime`].
///
/// ```
/// use celrt::api::JsonApi;
/// use serde_json::json;
///
/// let api = JsonApi::default();
/// let env = api.create_env(&json!([{"name": "x", "type": "int"}]), &json!(null), &json!(null));
/// let program = api.compile_expr(&env["envID"], &json!("x * 2"));
/// let reply = api.eval_program(&program["programID"], &json!({"x": 21}));
/// assert_eq!(reply, json!({"result": 42, "error": null}));
/// ```
#[derive(Clone, Default)]
pub struct JsonApi {
    runtime: Arc<Runtime>,
}

impl JsonApi {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Call a function by name with positional arguments. Missing trailing
    /// arguments read as `null`.
    pub fn call(&self, function: &str, args: &[Json]) -> Json {
        let arg = |index: usize| args.get(index).unwrap_or(&Json::Null);
        match function {
            "createEnv" => self.create_env(arg(0), arg(1), arg(2)),
            "extendEnv" => self.extend_env(arg(0), arg(1)),
            "compileExpr" => self.compile_expr(arg(0), arg(1)),
            "compileExprDetailed" => self.compile_expr_detailed(arg(0), arg(1)),
            "typecheckExpr" => self.typecheck_expr(arg(0), arg(1)),
            "evalProgram" => self.eval_program(arg(0), arg(1)),
            "destroyEnv" => self.destroy_env(arg(0)),
            "destroyProgram" => self.destroy_program(arg(0)),
            "listOptions" => self.list_options(),
            "evaluateCEL" => self.evaluate_cel(arg(0), arg(1)),
            other => {
                warn!(function = other, "unknown api function");
                json!({"error": format!("unknown function '{}'", other)})
            }
        }
    }

    pub fn register_callback(&self, impl_id: &Json, callback: Callback) -> Json {
        success(string_arg(impl_id, "implID").map(|impl_id| self.runtime.register_callback(impl_id, callback)))
    }

    pub fn create_env(&self, variables: &Json, functions: &Json, options: &Json) -> Json {
        let result = (|| -> Result<Json> {
            let variables = list_arg(variables, "variable declarations")?;
            let functions = list_arg(functions, "function definitions")?;
            let options = list_arg(options, "options")?;
            let id = self.runtime.create_env(&variables, &functions, &options)?;
            Ok(Json::String(id.to_string()))
        })();
        reply("envID", result)
    }

    pub fn extend_env(&self, env_id: &Json, options: &Json) -> Json {
        success((|| -> Result<()> {
            let id = env_arg(env_id)?;
            let options = list_arg(options, "options")?;
            self.runtime.extend_env(id, &options)
        })())
    }

    pub fn compile_expr(&self, env_id: &Json, expr: &Json) -> Json {
        let result = (|| -> Result<Json> {
            let id = env_arg(env_id)?;
            let program = self.runtime.compile(id, string_arg(expr, "expression")?)?;
            Ok(Json::String(program.to_string()))
        })();
        reply("programID", result)
    }

    pub fn compile_expr_detailed(&self, env_id: &Json, expr: &Json) -> Json {
        let outcome = match (env_arg(env_id), string_arg(expr, "expression")) {
            (Ok(id), Ok(expr)) => self.runtime.compile_detailed(id, expr),
            (Err(e), _) | (_, Err(e)) => {
                return json!({"success": false, "issues": [], "error": e.to_string()});
            }
        };
        let mut reply = serde_json::to_value(&outcome).unwrap_or_else(|e| json!({"error": e.to_string()}));
        if let Json::Object(map) = &mut reply {
            map.insert("success".to_string(), Json::Bool(outcome.success()));
        }
        reply
    }

    pub fn typecheck_expr(&self, env_id: &Json, expr: &Json) -> Json {
        let result = env_arg(env_id)
            .and_then(|id| self.runtime.typecheck(id, string_arg(expr, "expression")?));
        reply("type", result)
    }

    pub fn eval_program(&self, program_id: &Json, vars: &Json) -> Json {
        let result = (|| -> Result<Json> {
            let id: ProgramId = string_arg(program_id, "programID")?.parse()?;
            self.runtime.eval(id, &vars_arg(vars)?)
        })();
        reply("result", result)
    }

    pub fn destroy_env(&self, env_id: &Json) -> Json {
        success(env_arg(env_id).and_then(|id| self.runtime.destroy_env(id)))
    }

    pub fn destroy_program(&self, program_id: &Json) -> Json {
        success((|| -> Result<()> {
            let id: ProgramId = string_arg(program_id, "programID")?.parse()?;
            self.runtime.destroy_program(id)
        })())
    }

    pub fn list_options(&self) -> Json {
        reply("options", Ok(json!(self.runtime.options())))
    }

    pub fn evaluate_cel(&self, expr: &Json, vars: &Json) -> Json {
        let result = string_arg(expr, "expression")
            .and_then(|expr| evaluate(expr, &vars_arg(vars)?));
        reply("result", result)
    }
}

fn reply(field: &str, result: Result<Json>) -> Json {
    let (value, error) = match result {
        Ok(value) => (value, Json::Null),
        Err(e) => (Json::Null, Json::String(e.to_string())),
    };
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    map.insert("error".to_string(), error);
    Json::Object(map)
}

fn success(result: Result<()>) -> Json {
    match result {
        Ok(()) => json!({"success": true, "error": null}),
        Err(e) => json!({"success": false, "error": e.to_string()}),
    }
}

fn string_arg<'a>(arg: &'a Json, what: &str) -> Result<&'a str> {
    arg.as_str()
        .ok_or_else(|| Error::InvalidInput(format!("{} must be a string", what)))
}

fn env_arg(arg: &Json) -> Result<EnvId> {
    string_arg(arg, "envID")?.parse()
}

/// A list argument; `null` is empty and a string is parsed as JSON text.
fn list_arg<T: DeserializeOwned>(arg: &Json, what: &str) -> Result<Vec<T>> {
    let invalid = |e: serde_json::Error| Error::InvalidInput(format!("failed to parse {}: {}", what, e));
    match arg {
        Json::Null => Ok(Vec::new()),
        Json::String(text) => serde_json::from_str(text).map_err(invalid),
        other => serde_json::from_value(other.clone()).map_err(invalid),
    }
}

fn vars_arg(arg: &Json) -> Result<Map<String, Json>> {
    match arg {
        Json::Null => Ok(Map::new()),
        Json::Object(vars) => Ok(vars.clone()),
        _ => Err(Error::InvalidInput("variables must be an object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_malformed_arguments_are_errors() {
        let api = JsonApi::default();
        assert_eq!(
            api.call("compileExpr", &[json!(7), json!("1")]),
            json!({"programID": null, "error": "invalid input: envID must be a string"})
        );
        assert_eq!(
            api.call("createEnv", &[json!({"name": "x"})]),
            json!({
                "envID": null,
                "error": "invalid input: failed to parse variable declarations: invalid type: map, expected a sequence"
            })
        );
        assert_eq!(
            api.call("evalProgram", &[json!("prg_1"), json!([1])]),
            json!({"result": null, "error": "invalid input: variables must be an object"})
        );
        assert_eq!(
            api.call("frobnicate", &[]),
            json!({"error": "unknown function 'frobnicate'"})
        );
    }

    #[test]
    fn test_unknown_handles() {
        let api = JsonApi::default();
        assert_eq!(
            api.call("compileExpr", &[json!("env_9"), json!("1")]),
            json!({"programID": null, "error": "environment not found: env_9"})
        );
        assert_eq!(
            api.call("destroyProgram", &[json!("bogus")]),
            json!({"success": false, "error": "program not found: bogus"})
        );
    }

    #[test]
    fn test_options_accept_json_text() {
        let api = JsonApi::default();
        let env = api.call("createEnv", &[json!([]), json!(null), json!(r#"[{"type": "OptionalTypes"}]"#)]);
        assert_eq!(env["error"], Json::Null);
        let program = api.call("compileExpr", &[env["envID"].clone(), json!("optional.none().hasValue()")]);
        assert_eq!(
            api.call("evalProgram", &[program["programID"].clone()]),
            json!({"result": false, "error": null})
        );
    }

    #[test]
    fn test_list_options() {
        let api = JsonApi::default();
        let reply = api.list_options();
        assert_eq!(reply["options"][0]["name"], json!("OptionalTypes"));
        assert_eq!(reply["options"].as_array().map(Vec::len), Some(3));
    }
}
