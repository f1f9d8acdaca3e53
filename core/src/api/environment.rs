//! Environment options and the state they build.

use std::fmt;
use std::sync::Arc;

use super::{AstValidator, Error, ExecutionOptions};
use crate::analyzer::{Declarations, FunctionDecl};
use crate::evaluator::{Bindings, OverloadBinding};
use crate::parser::ParseOptions;
use crate::types::Type;
use crate::values::FunctionImpl;

/// One modification applied to an environment.
///
/// Options are applied in order, so a [`EnvOption::Binding`] must come after
/// the [`EnvOption::Function`] that declares its overload.
///
/// # Example
///
/// ```
/// use celrt_core::api::{Env, EnvOption};
/// use celrt_core::types::Type;
///
/// let env = Env::new([
///     EnvOption::variable("x", Type::Int),
///     EnvOption::OptionalTypes,
/// ])
/// .unwrap();
/// assert!(env.declarations().variable("x").is_some());
/// ```
#[derive(Clone)]
pub enum EnvOption {
    Variable { name: String, ty: Type },
    Function(FunctionDecl),
    /// Implementation for a declared overload id.
    Binding {
        overload_id: String,
        function: FunctionImpl,
    },
    OptionalTypes,
    CrossTypeNumericComparisons(bool),
    Validator(Arc<dyn AstValidator>),
    ParserLimits { max_depth: usize, max_size: usize },
    Execution(ExecutionOptions),
}

impl EnvOption {
    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        EnvOption::Variable {
            name: name.into(),
            ty,
        }
    }

    pub fn binding(overload_id: impl Into<String>, function: FunctionImpl) -> Self {
        EnvOption::Binding {
            overload_id: overload_id.into(),
            function,
        }
    }
}

impl fmt::Debug for EnvOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvOption::Variable { name, ty } => write!(f, "Variable({}: {})", name, ty),
            EnvOption::Function(decl) => write!(f, "Function({})", decl.name),
            EnvOption::Binding { overload_id, .. } => write!(f, "Binding({})", overload_id),
            EnvOption::OptionalTypes => write!(f, "OptionalTypes"),
            EnvOption::CrossTypeNumericComparisons(enabled) => {
                write!(f, "CrossTypeNumericComparisons({})", enabled)
            }
            EnvOption::Validator(validator) => write!(f, "Validator({})", validator.name()),
            EnvOption::ParserLimits {
                max_depth,
                max_size,
            } => write!(f, "ParserLimits(depth: {}, size: {})", max_depth, max_size),
            EnvOption::Execution(options) => write!(f, "Execution({:?})", options),
        }
    }
}

/// Everything an environment knows. Cloned when the environment is extended.
#[derive(Clone, Default)]
pub(crate) struct EnvState {
    pub declarations: Declarations,
    pub bindings: Bindings,
    pub validators: Vec<Arc<dyn AstValidator>>,
    pub parse: ParseOptions,
    pub execution: ExecutionOptions,
}

impl EnvState {
    pub fn apply(&mut self, option: EnvOption) -> Result<(), Error> {
        match option {
            EnvOption::Variable { name, ty } => self
                .declarations
                .add_variable(&name, ty)
                .map_err(Error::Environment)?,
            EnvOption::Function(decl) => self
                .declarations
                .add_function(decl)
                .map_err(Error::Environment)?,
            EnvOption::Binding {
                overload_id,
                function,
            } => {
                let decl = self.declarations.overload(&overload_id).ok_or_else(|| {
                    Error::Environment(format!(
                        "binding for undeclared overload id '{}'",
                        overload_id
                    ))
                })?;
                let binding = OverloadBinding {
                    decl: decl.clone(),
                    function,
                };
                self.bindings.insert(overload_id, binding);
            }
            EnvOption::OptionalTypes => {
                self.declarations.features.optional_types = true;
                self.parse.enable_optional_syntax = true;
            }
            EnvOption::CrossTypeNumericComparisons(enabled) => {
                self.declarations.features.cross_type_numeric_comparisons = enabled;
            }
            EnvOption::Validator(validator) => self.validators.push(validator),
            EnvOption::ParserLimits {
                max_depth,
                max_size,
            } => {
                self.parse.max_depth = max_depth;
                self.parse.max_size = max_size;
            }
            EnvOption::Execution(options) => self.execution = options,
        }
        Ok(())
    }
}
