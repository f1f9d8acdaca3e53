//! The CEL compilation environment.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::environment::EnvState;
use super::{DiagnosticSink, EnvOption, Error, Issues, Program, ValidationContext};
use crate::analyzer::{self, CheckedExpr, Declarations, Reference};
use crate::parser::{self, ParsedExpr, Source};

/// Description given to sources parsed through [`Env::parse`].
pub const DEFAULT_SOURCE_DESCRIPTION: &str = "<input>";

/// An immutable compilation environment.
///
/// An environment holds:
/// - Declared variables and custom functions (with their implementations)
/// - Enabled language features (optional types, cross-type comparisons)
/// - AST validators run after type checking
/// - Parser limits and execution options inherited by programs
///
/// Cloning is cheap and clones share state. [`Env::extend`] returns a new
/// environment and leaves the receiver untouched.
///
/// # Example
///
/// ```
/// use celrt_core::api::{Env, EnvOption};
/// use celrt_core::evaluator::Activation;
/// use celrt_core::types::Type;
/// use celrt_core::values::Value;
///
/// let env = Env::new([EnvOption::variable("x", Type::Int)]).unwrap();
/// let program = env.program(env.compile("x * 2").unwrap()).unwrap();
/// let result = program.eval(&Activation::new().with("x", 21i64)).unwrap();
/// assert_eq!(result, Value::Int(42));
/// ```
#[derive(Clone)]
pub struct Env {
    state: Arc<EnvState>,
}

impl Env {
    /// Create an environment from a list of options, applied in order.
    pub fn new(options: impl IntoIterator<Item = EnvOption>) -> Result<Self, Error> {
        Self::build(EnvState::default(), options)
    }

    /// Create a new environment with additional options layered on top.
    pub fn extend(&self, options: impl IntoIterator<Item = EnvOption>) -> Result<Self, Error> {
        Self::build((*self.state).clone(), options)
    }

    fn build(
        mut state: EnvState,
        options: impl IntoIterator<Item = EnvOption>,
    ) -> Result<Self, Error> {
        for option in options {
            debug!(?option, "applying environment option");
            state.apply(option)?;
        }
        Ok(Self {
            state: Arc::new(state),
        })
    }

    pub fn declarations(&self) -> &Declarations {
        &self.state.declarations
    }

    /// Parse an expression without checking it.
    pub fn parse(&self, text: &str) -> Result<ParsedExpr, Issues> {
        self.parse_source(Arc::new(Source::new(text, DEFAULT_SOURCE_DESCRIPTION)))
    }

    pub fn parse_source(&self, source: Arc<Source>) -> Result<ParsedExpr, Issues> {
        parser::parse_with_options(source, &self.state.parse)
    }

    /// Type-check a parsed expression and run the validators.
    pub fn check(&self, parsed: ParsedExpr) -> Result<CheckedExpr, Issues> {
        self.check_with(parsed, None)
    }

    /// Like [`Env::check`], forwarding validator reports to `sink`.
    #[instrument(level = "debug", skip_all, fields(validators = self.state.validators.len()))]
    pub fn check_with(
        &self,
        parsed: ParsedExpr,
        sink: Option<&dyn DiagnosticSink>,
    ) -> Result<CheckedExpr, Issues> {
        let source = parsed.source.clone();
        let checked = analyzer::analyze(&self.state.declarations, parsed)?;

        let mut issues = Issues::new(source);
        for validator in &self.state.validators {
            let mut context = ValidationContext::new(&checked, &mut issues, sink);
            validator.validate(&checked, &mut context);
            debug!(validator = validator.name(), "ran validator");
        }
        if issues.has_errors() {
            return Err(issues);
        }
        Ok(checked)
    }

    /// Parse and check an expression.
    pub fn compile(&self, text: &str) -> Result<CheckedExpr, Error> {
        let parsed = self.parse(text)?;
        Ok(self.check(parsed)?)
    }

    /// Build an executable program from a checked expression.
    ///
    /// Fails if a referenced overload has no implementation.
    pub fn program(&self, checked: CheckedExpr) -> Result<Program, Error> {
        for (_, reference) in checked.references() {
            let Reference::Overloads(ids) = reference else {
                continue;
            };
            if let Some(id) = ids.iter().find(|id| !self.state.bindings.contains_key(*id)) {
                return Err(Error::Program(format!(
                    "no implementation bound for overload '{}'",
                    id
                )));
            }
        }
        Ok(Program::new(
            checked,
            self.state.bindings.clone(),
            self.state.execution,
        ))
    }
}
