//! Errors surfaced by the runtime.
//!
//! Every message names the phase it came from, so a host that only shows the
//! string still knows whether building, compiling or evaluating failed.

use std::fmt;

use thiserror::Error;

use crate::callbacks::CallbackError;
use crate::compilation::Issue;

/// Kind of handle an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Environment,
    Program,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Environment => write!(f, "environment"),
            HandleKind::Program => write!(f, "program"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed call arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A type descriptor that cannot describe any engine type.
    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: HandleKind, id: String },

    #[error("{kind} has been destroyed: {id}")]
    AlreadyDestroyed { kind: HandleKind, id: String },

    /// Parse, type-check or validation failure.
    #[error("compilation error: {message}")]
    Compilation { message: String, issues: Vec<Issue> },

    #[error("failed to create environment: {0}")]
    EnvironmentBuild(String),

    #[error("failed to create program: {0}")]
    ProgramBuild(String),

    #[error("evaluation error: {0}")]
    Evaluation(#[from] celrt_core::EvalError),

    #[error("callback error: {0}")]
    Callback(#[from] CallbackError),
}

impl Error {
    pub(crate) fn not_found(kind: HandleKind, id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn destroyed(kind: HandleKind, id: impl fmt::Display) -> Self {
        Error::AlreadyDestroyed {
            kind,
            id: id.to_string(),
        }
    }

    /// Diagnostics attached to a compilation failure, if any.
    pub fn issues(&self) -> &[Issue] {
        match self {
            Error::Compilation { issues, .. } => issues,
            _ => &[],
        }
    }
}

impl From<celrt_core::Error> for Error {
    fn from(error: celrt_core::Error) -> Self {
        match error {
            celrt_core::Error::Environment(message) => Error::EnvironmentBuild(message),
            celrt_core::Error::Compilation(issues) => Error::Compilation {
                message: issues.to_string(),
                issues: Issue::from_engine(&issues),
            },
            celrt_core::Error::Program(message) => Error::ProgramBuild(message),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
