//! Per-call collection of compilation diagnostics.
//!
//! A detailed compile opens a [`CompilationContext`] with a fresh id, hands it
//! to the engine's checker as the diagnostic sink and reads it back when the
//! check is done. The context is registered with the runtime for the duration
//! of the call so that host callbacks can look it up by id; the
//! [`CompilationGuard`] removes it again on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use celrt_core::api::{Diagnostic, DiagnosticSink, Issues, Severity};
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 1-based position in the expression source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    pub line: u32,
    pub column: u32,
}

/// A diagnostic as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<IssueLocation>,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = Some(IssueLocation { line, column });
        self
    }

    pub(crate) fn from_engine(issues: &Issues) -> Vec<Issue> {
        issues.diagnostics().iter().map(Issue::from).collect()
    }
}

impl From<&Diagnostic> for Issue {
    fn from(diagnostic: &Diagnostic) -> Self {
        Issue {
            severity: diagnostic.severity,
            message: diagnostic.message.clone(),
            location: diagnostic.location.map(|l| IssueLocation {
                line: l.line,
                column: l.column,
            }),
        }
    }
}

/// Diagnostics collected during one compile call.
#[derive(Debug)]
pub struct CompilationContext {
    id: String,
    issues: Mutex<Vec<Issue>>,
}

impl CompilationContext {
    fn new(id: String) -> Self {
        Self {
            id,
            issues: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn push(&self, issue: Issue) {
        self.issues.lock().push(issue);
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().clone()
    }
}

impl DiagnosticSink for CompilationContext {
    fn compilation_id(&self) -> &str {
        &self.id
    }

    fn report(&self, diagnostic: Diagnostic) {
        self.push(Issue::from(&diagnostic));
    }
}

/// Contexts of compile calls currently in progress.
#[derive(Debug, Default)]
pub struct CompilationRegistry {
    next_id: AtomicU64,
    active: Mutex<HashMap<String, Arc<CompilationContext>>>,
}

impl CompilationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new context. It stays registered until the guard is dropped.
    pub fn begin(&self) -> CompilationGuard<'_> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let context = Arc::new(CompilationContext::new(format!("comp_{}", n)));
        tracing::trace!(compilation_id = context.id(), "compilation context opened");
        self.active
            .lock()
            .insert(context.id.clone(), Arc::clone(&context));
        CompilationGuard {
            registry: self,
            context,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<CompilationContext>> {
        self.active.lock().get(id).cloned()
    }

    /// Number of compile calls in progress.
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Keeps a context registered; unregisters it on drop.
pub struct CompilationGuard<'a> {
    registry: &'a CompilationRegistry,
    context: Arc<CompilationContext>,
}

impl CompilationGuard<'_> {
    pub fn context(&self) -> &CompilationContext {
        &self.context
    }
}

impl Drop for CompilationGuard<'_> {
    fn drop(&mut self) {
        self.registry.active.lock().remove(self.context.id());
        tracing::trace!(compilation_id = self.context.id(), "compilation context closed");
    }
}
