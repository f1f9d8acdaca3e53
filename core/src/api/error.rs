//! Public error types for the CEL engine.
//!
//! Parse, check and validation problems are collected as [`Diagnostic`]s in
//! an [`Issues`] list; construction failures of environments and programs
//! carry a plain message. Evaluation failures are reported separately as
//! [`crate::evaluator::EvalError`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parser::{ExprId, Location, Source};

/// Public error type for engine construction and compilation.
#[derive(Debug, Clone)]
pub enum Error {
    /// Invalid environment declarations (overlapping names, malformed options).
    Environment(String),

    /// Parse, type-check or validation errors.
    Compilation(Issues),

    /// A program could not be built from a checked expression.
    Program(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Environment(msg) => write!(f, "invalid environment: {}", msg),
            Error::Compilation(issues) => write!(f, "{}", issues),
            Error::Program(msg) => write!(f, "program construction failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<Issues> for Error {
    fn from(issues: Issues) -> Self {
        Error::Compilation(issues)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - compilation cannot succeed.
    Error,
    /// Warning - suspicious code that might be wrong.
    Warning,
    /// Info - informational message.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message (error, warning, or info) with an optional location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// 1-based position in the expression source.
    pub location: Option<Location>,
    /// Node the diagnostic is attached to, when known.
    pub expr_id: Option<ExprId>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
            expr_id: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn on_expr(mut self, id: ExprId) -> Self {
        self.expr_id = Some(id);
        self
    }
}

/// Ordered list of diagnostics for one expression.
#[derive(Debug, Clone, Default)]
pub struct Issues {
    source: Option<Arc<Source>>,
    diagnostics: Vec<Diagnostic>,
}

impl Issues {
    pub fn new(source: Arc<Source>) -> Self {
        Self {
            source: Some(source),
            diagnostics: Vec::new(),
        }
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_deref()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Report an error at a byte offset of the source.
    pub fn report_error_at_offset(&mut self, offset: usize, message: impl Into<String>) {
        let location = self.source.as_ref().map(|s| s.location(offset));
        self.push(Diagnostic::error(message).at(location));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn extend(&mut self, other: Issues) {
        self.diagnostics.extend(other.diagnostics);
    }
}

impl fmt::Display for Issues {
    /// Renders errors as `ERROR: <input>:L:C: message` followed by the source
    /// line and a caret under the column.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let description = self
            .source
            .as_ref()
            .map(|s| s.description())
            .filter(|d| !d.is_empty())
            .unwrap_or("<input>");
        for (i, diagnostic) in self.errors().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match diagnostic.location {
                Some(location) => write!(
                    f,
                    "ERROR: {}:{}:{}: {}",
                    description, location.line, location.column, diagnostic.message
                )?,
                None => write!(f, "ERROR: {}: {}", description, diagnostic.message)?,
            }
            let snippet = diagnostic
                .location
                .and_then(|loc| Some((loc, self.source.as_ref()?.line(loc.line)?)));
            if let Some((location, line)) = snippet {
                write!(f, "\n | {}", line)?;
                let indent = ".".repeat(location.column.saturating_sub(1) as usize);
                write!(f, "\n | {}^", indent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_issues_display() {
        let source = Arc::new(Source::new("x + y", "<input>"));
        let mut issues = Issues::new(source);
        issues.report_error_at_offset(4, "undeclared reference to 'y' (in container '')");
        issues.push(Diagnostic::error("ignored").with_severity(Severity::Warning));
        assert_eq!(
            issues.to_string(),
            "ERROR: <input>:1:5: undeclared reference to 'y' (in container '')\n | x + y\n | ....^"
        );
        assert!(issues.has_errors());
        assert_eq!(issues.len(), 2);
    }
}
