//! Pluggable checks that run over a successfully type-checked expression.
//!
//! Validators report through a [`ValidationContext`]. Errors reported with
//! [`ValidationContext::error`] fail the compilation; anything passed to
//! [`ValidationContext::report`] goes to the caller's [`DiagnosticSink`], if
//! the caller supplied one, and does not affect the outcome.

use crate::analyzer::CheckedExpr;
use crate::parser::{ExprId, Source};

use super::error::{Diagnostic, Issues};

/// Receiver for diagnostics that should reach the caller without failing the
/// compilation.
pub trait DiagnosticSink: Send + Sync {
    /// Identifier of the compilation the sink collects for.
    fn compilation_id(&self) -> &str;

    fn report(&self, diagnostic: Diagnostic);
}

/// Check run after type checking succeeds.
pub trait AstValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, checked: &CheckedExpr, context: &mut ValidationContext<'_>);
}

/// Per-compilation state handed to each validator.
pub struct ValidationContext<'a> {
    checked: &'a CheckedExpr,
    issues: &'a mut Issues,
    sink: Option<&'a dyn DiagnosticSink>,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn new(
        checked: &'a CheckedExpr,
        issues: &'a mut Issues,
        sink: Option<&'a dyn DiagnosticSink>,
    ) -> Self {
        Self {
            checked,
            issues,
            sink,
        }
    }

    pub fn source(&self) -> &Source {
        self.checked.source()
    }

    /// Identifier of the enclosing compilation, when the caller tracks one.
    pub fn compilation_id(&self) -> Option<&str> {
        self.sink.map(|sink| sink.compilation_id())
    }

    /// Fail the compilation with an error attached to `expr_id`.
    pub fn error(&mut self, expr_id: ExprId, message: impl Into<String>) {
        let location = self.checked.location_of(expr_id);
        self.issues
            .push(Diagnostic::error(message).at(location).on_expr(expr_id));
    }

    /// Forward a diagnostic to the caller's sink. Dropped when there is none.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(sink) = self.sink {
            sink.report(diagnostic);
        }
    }
}
