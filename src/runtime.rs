//! Lifecycle manager for environments and programs.
//!
//! The runtime hands out handles ([`EnvId`], [`ProgramId`]) instead of engine
//! objects, so that hosts across an FFI or JSON boundary can refer to them.
//! All handle bookkeeping happens under one lock; parsing, checking and
//! evaluation run outside it, which lets host callbacks call back into the
//! runtime.

use std::sync::Arc;

use celrt_core::api::{DiagnosticSink, Issues};
use celrt_core::evaluator::Activation;
use celrt_core::{Env, EnvOption};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::{debug, instrument};

use crate::callbacks::{Callback, CallbackBridge};
use crate::compilation::{CompilationRegistry, Issue};
use crate::config::RuntimeConfig;
use crate::decls::{FunctionDef, VariableDecl, to_env_options};
use crate::error::{Error, Result};
use crate::options::{OptionConfig, OptionInfo, OptionRegistry, SetupContext};
use crate::store::{EnvId, HandleStore, ProgramId};
use crate::types::describe;
use crate::values::{to_json, vars_from_json};

/// Result of [`Runtime::compile_detailed`].
///
/// Compilation failures are reported here rather than as an `Err`, together
/// with every issue collected along the way: engine errors first, then the
/// warnings and notes reported by AST validators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutcome {
    #[serde(rename = "programID", skip_serializing_if = "Option::is_none")]
    pub program_id: Option<ProgramId>,
    pub issues: Vec<Issue>,
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Error>,
}

impl CompileOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: Error, issues: Vec<Issue>) -> Self {
        Self {
            program_id: None,
            issues,
            error: Some(error),
        }
    }
}

fn serialize_error<S: serde::Serializer>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_str(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Owner of every live environment, program and host callback.
///
/// ```
/// use celrt::{Runtime, VariableDecl};
/// use serde_json::json;
///
/// let runtime = Runtime::new();
/// let env = runtime
///     .create_env(&[VariableDecl::new("x", "int"), VariableDecl::new("y", "int")], &[], &[])
///     .unwrap();
/// let program = runtime.compile(env, "x + y").unwrap();
/// let vars = json!({"x": 10, "y": 20});
/// assert_eq!(runtime.eval(program, vars.as_object().unwrap()).unwrap(), json!(30));
/// ```
pub struct Runtime {
    store: Mutex<HandleStore>,
    bridge: Arc<CallbackBridge>,
    registry: OptionRegistry,
    compilations: CompilationRegistry,
    config: RuntimeConfig,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_config(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            store: Mutex::new(HandleStore::default()),
            bridge: Arc::new(CallbackBridge::new()),
            registry: OptionRegistry::default(),
            compilations: CompilationRegistry::new(),
            config,
        }
    }

    /// Replace the option registry, e.g. to add host-defined options.
    pub fn with_registry(mut self, registry: OptionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<CallbackBridge> {
        &self.bridge
    }

    pub fn register_callback(&self, impl_id: impl Into<String>, callback: Callback) {
        self.bridge.register(impl_id, callback);
    }

    pub fn options(&self) -> Vec<OptionInfo> {
        self.registry.list()
    }

    fn base_options(&self) -> Vec<EnvOption> {
        vec![
            EnvOption::ParserLimits {
                max_depth: self.config.parser.max_depth,
                max_size: self.config.parser.max_size,
            },
            EnvOption::Execution(self.config.execution),
        ]
    }

    /// Build an environment from declarations and option configurations.
    ///
    /// Nothing is registered unless the whole environment builds.
    #[instrument(skip_all, fields(variables = variables.len(), functions = functions.len()))]
    pub fn create_env(
        &self,
        variables: &[VariableDecl],
        functions: &[FunctionDef],
        options: &[OptionConfig],
    ) -> Result<EnvId> {
        let (mut env_options, mut owned) = to_env_options(variables, functions, &self.bridge)?;
        let id = self.store.lock().reserve_env();

        let built = (|| -> Result<Env> {
            let id_text = id.to_string();
            let mut setup = SetupContext::new(&id_text, &self.bridge);
            let configs: Vec<OptionConfig> = self
                .config
                .default_options
                .iter()
                .chain(options)
                .cloned()
                .collect();
            let resolved = self.registry.resolve(&configs, &mut setup)?;
            for claimed in setup.into_claimed() {
                if !owned.contains(&claimed) {
                    owned.push(claimed);
                }
            }

            let mut all = self.base_options();
            all.append(&mut env_options);
            all.extend(resolved);
            Ok(Env::new(all)?)
        })();
        let env = match built {
            Ok(env) => env,
            Err(e) => {
                self.store.lock().abandon_env(id);
                return Err(e);
            }
        };
        let declared = Arc::new(env.declarations().variables().clone());

        self.store.lock().insert_env(id, env, declared, owned);
        debug!(env_id = %id, "environment created");
        Ok(id)
    }

    /// Apply further options to a live environment. The handle keeps its
    /// identity; programs compiled earlier are unaffected.
    #[instrument(skip_all, fields(env_id = %id))]
    pub fn extend_env(&self, id: EnvId, options: &[OptionConfig]) -> Result<()> {
        let serial = self.store.lock().extend_lock(id)?;
        let _extending = serial.lock();
        let env = self.live_env(id)?;

        let id_text = id.to_string();
        let mut setup = SetupContext::new(&id_text, &self.bridge);
        let resolved = self.registry.resolve(options, &mut setup)?;
        let extended = env.extend(resolved)?;

        self.store
            .lock()
            .replace_env(id, extended, setup.into_claimed())?;
        debug!("environment extended");
        Ok(())
    }

    fn live_env(&self, id: EnvId) -> Result<Env> {
        Ok(self.store.lock().live_env(id)?.env.clone())
    }

    /// Compile an expression into a program.
    #[instrument(skip(self), fields(env_id = %id))]
    pub fn compile(&self, id: EnvId, text: &str) -> Result<ProgramId> {
        let env = self.live_env(id)?;
        let checked = env.compile(text)?;
        self.publish(id, &env, checked)
    }

    fn publish(&self, id: EnvId, env: &Env, checked: celrt_core::analyzer::CheckedExpr) -> Result<ProgramId> {
        let program = env.program(checked)?;
        // The environment may have been destroyed while we were compiling.
        let program_id = self.store.lock().insert_program(id, program)?;
        debug!(program_id = %program_id, "program compiled");
        Ok(program_id)
    }

    /// Compile with a per-call issue collector, returning every diagnostic.
    #[instrument(skip(self), fields(env_id = %id))]
    pub fn compile_detailed(&self, id: EnvId, text: &str) -> CompileOutcome {
        let guard = self.compilations.begin();
        let context = guard.context();

        let env = match self.live_env(id) {
            Ok(env) => env,
            Err(e) => return CompileOutcome::failed(e, Vec::new()),
        };
        let checked = env
            .parse(text)
            .and_then(|parsed| env.check_with(parsed, Some(context as &dyn DiagnosticSink)));
        let checked = match checked {
            Ok(checked) => checked,
            Err(issues) => {
                let mut all = Issue::from_engine(&issues);
                all.extend(context.issues());
                return CompileOutcome::failed(compilation_error(issues), all);
            }
        };
        match self.publish(id, &env, checked) {
            Ok(program_id) => CompileOutcome {
                program_id: Some(program_id),
                issues: context.issues(),
                error: None,
            },
            Err(e) => CompileOutcome::failed(e, context.issues()),
        }
    }

    /// Issues collected so far by a compile call in progress.
    pub fn compilation_issues(&self, compilation_id: &str) -> Option<Vec<Issue>> {
        self.compilations.get(compilation_id).map(|context| context.issues())
    }

    /// Number of compile calls currently collecting issues.
    pub fn active_compilations(&self) -> usize {
        self.compilations.len()
    }

    /// Type-check an expression and describe its result type.
    #[instrument(skip(self), fields(env_id = %id))]
    pub fn typecheck(&self, id: EnvId, text: &str) -> Result<Json> {
        let env = self.live_env(id)?;
        let checked = env.compile(text)?;
        Ok(describe(checked.output_type()))
    }

    /// Evaluate a program. Variables are read according to their declared
    /// types; a variable the expression needs but `vars` lacks is an
    /// evaluation error.
    #[instrument(skip_all, fields(program_id = %id))]
    pub fn eval(&self, id: ProgramId, vars: &Map<String, Json>) -> Result<Json> {
        let entry = self.store.lock().program(id)?.clone();
        let mut activation = Activation::new();
        for (name, value) in vars_from_json(vars, |name| entry.variables.get(name))? {
            activation.insert(name, value);
        }
        let value = entry.program.eval(&activation)?;
        Ok(to_json(&value))
    }

    /// Destroy an environment. Programs compiled from it stay usable.
    /// Destroying a handle twice is a no-op.
    #[instrument(skip(self), fields(env_id = %id))]
    pub fn destroy_env(&self, id: EnvId) -> Result<()> {
        let mut store = self.store.lock();
        for impl_id in store.destroy_env(id)? {
            self.bridge.unregister(&impl_id);
        }
        debug!("environment destroyed");
        Ok(())
    }

    /// Destroy a program, releasing its references on callbacks.
    ///
    /// A callback is unregistered once no program refers to it and its
    /// environment has been destroyed. While the environment is live its
    /// callbacks stay registered, even with no programs left.
    #[instrument(skip(self), fields(program_id = %id))]
    pub fn destroy_program(&self, id: ProgramId) -> Result<()> {
        let mut store = self.store.lock();
        for impl_id in store.destroy_program(id)? {
            self.bridge.unregister(&impl_id);
        }
        debug!("program destroyed");
        Ok(())
    }

    /// Number of environment entries, including destroyed ones kept alive by
    /// their programs.
    pub fn env_count(&self) -> usize {
        self.store.lock().env_count()
    }

    pub fn program_count(&self) -> usize {
        self.store.lock().program_count()
    }

    /// Reference count of a callback on an environment, if it owns it.
    pub fn ref_count(&self, env: EnvId, impl_id: &str) -> Option<usize> {
        self.store.lock().ref_count(env, impl_id)
    }
}

fn compilation_error(issues: Issues) -> Error {
    Error::from(celrt_core::Error::Compilation(issues))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_typecheck_describes_output() {
        crate::test_utils::init_test_logging();
        let runtime = Runtime::new();
        let env = runtime.create_env(&[], &[], &[]).unwrap();
        assert_eq!(
            runtime.typecheck(env, "[1, 2, 3]").unwrap(),
            json!({"kind": "list", "elementType": "int"})
        );
        assert_eq!(
            runtime.typecheck(env, r#"{"k": "v"}"#).unwrap(),
            json!({"kind": "map", "keyType": "string", "valueType": "string"})
        );
    }

    #[test]
    fn test_missing_variable_is_an_evaluation_error() {
        let runtime = Runtime::new();
        let env = runtime
            .create_env(&[VariableDecl::new("x", "int"), VariableDecl::new("y", "int")], &[], &[])
            .unwrap();
        let program = runtime.compile(env, "x + y").unwrap();
        assert!(matches!(
            runtime.eval(program, &vars(json!({"x": 10}))),
            Err(Error::Evaluation(_))
        ));
    }

    #[test]
    fn test_declared_types_guide_variables() {
        let runtime = Runtime::new();
        let env = runtime
            .create_env(&[VariableDecl::new("n", "uint"), VariableDecl::new("d", "double")], &[], &[])
            .unwrap();
        let program = runtime.compile(env, "n + 1u == 3u && d / 2.0 == 1.0").unwrap();
        assert_eq!(
            runtime.eval(program, &vars(json!({"n": 2, "d": 2}))).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_config_defaults_apply_to_every_env() {
        let config = RuntimeConfig {
            default_options: vec![OptionConfig::new("OptionalTypes")],
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::with_config(config);
        let env = runtime.create_env(&[], &[], &[]).unwrap();
        let program = runtime.compile(env, "optional.of(2).orValue(0)").unwrap();
        assert_eq!(runtime.eval(program, &Map::new()).unwrap(), json!(2));
    }

    #[test]
    fn test_failed_create_registers_nothing() {
        let runtime = Runtime::new();
        let result = runtime.create_env(
            &[VariableDecl::new("x", "int"), VariableDecl::new("x", "string")],
            &[],
            &[],
        );
        assert!(matches!(result, Err(Error::EnvironmentBuild(_))));
        assert_eq!(runtime.env_count(), 0);
    }

    #[test]
    fn test_failed_create_leaves_id_unissued() {
        let runtime = Runtime::new();
        let error = runtime
            .create_env(&[], &[], &[OptionConfig::new("Bogus")])
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        let abandoned: EnvId = "env_1".parse().unwrap();
        assert!(matches!(
            runtime.compile(abandoned, "1"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(runtime.destroy_env(abandoned), Err(Error::NotFound { .. })));

        let env = runtime.create_env(&[], &[], &[]).unwrap();
        assert_eq!(env.to_string(), "env_2");
    }

    #[test]
    fn test_compile_errors_carry_issues() {
        let runtime = Runtime::new();
        let env = runtime.create_env(&[], &[], &[]).unwrap();
        let error = runtime.compile(env, "1 + ").unwrap_err();
        assert!(error.to_string().starts_with("compilation error: "), "{}", error);
        assert!(!error.issues().is_empty());
    }

    #[test]
    fn test_custom_registry_limits_options() {
        let mut registry = OptionRegistry::empty();
        registry.register(crate::options::OptionalTypesBuilder::default);
        let runtime = Runtime::new().with_registry(registry);
        let names: Vec<_> = runtime.options().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["OptionalTypes"]);

        assert!(runtime
            .create_env(&[], &[], &[OptionConfig::new("OptionalTypes")])
            .is_ok());
        assert!(matches!(
            runtime.create_env(&[], &[], &[OptionConfig::new("CrossTypeNumericComparisons")]),
            Err(Error::InvalidInput(_))
        ));
    }
}
