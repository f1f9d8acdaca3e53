//! Compiled CEL programs.

use std::sync::Arc;

use crate::analyzer::CheckedExpr;
use crate::evaluator::{self, Activation, Bindings, EvalError};
use crate::types::Type;
use crate::values::Value;

use super::ExecutionOptions;

/// A checked expression ready for execution.
///
/// Programs own everything they need: they remain usable after the
/// environment that built them is dropped, and can be evaluated concurrently
/// from several threads.
#[derive(Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

struct ProgramInner {
    checked: CheckedExpr,
    bindings: Bindings,
    options: ExecutionOptions,
}

impl Program {
    pub(crate) fn new(checked: CheckedExpr, bindings: Bindings, options: ExecutionOptions) -> Self {
        Self {
            inner: Arc::new(ProgramInner {
                checked,
                bindings,
                options,
            }),
        }
    }

    pub fn checked(&self) -> &CheckedExpr {
        &self.inner.checked
    }

    pub fn output_type(&self) -> &Type {
        self.inner.checked.output_type()
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.inner.options
    }

    /// Evaluate against a set of variable bindings.
    pub fn eval(&self, activation: &Activation) -> Result<Value, EvalError> {
        self.eval_with(activation, &self.inner.options)
    }

    /// Evaluate with execution options overriding the program's own.
    pub fn eval_with(
        &self,
        activation: &Activation,
        options: &ExecutionOptions,
    ) -> Result<Value, EvalError> {
        evaluator::eval(&self.inner.checked, &self.inner.bindings, activation, options)
    }
}
