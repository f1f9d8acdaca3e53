//! Owned handles over runtime environments and programs.
//!
//! [`Environment`] and [`CompiledProgram`] wrap a handle id together with the
//! runtime that issued it. `destroy` is idempotent and checked locally, so a
//! destroyed handle fails fast without touching the runtime. Dropping a handle
//! destroys it if that has not happened yet.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value as Json};

use crate::compilation::Issue;
use crate::decls::{FunctionDef, VariableDecl};
use crate::error::{Error, HandleKind, Result};
use crate::options::OptionConfig;
use crate::runtime::Runtime;
use crate::store::{EnvId, ProgramId};

pub struct Environment {
    runtime: Arc<Runtime>,
    id: EnvId,
    destroyed: AtomicBool,
}

impl Environment {
    pub fn new(
        runtime: &Arc<Runtime>,
        variables: &[VariableDecl],
        functions: &[FunctionDef],
        options: &[OptionConfig],
    ) -> Result<Self> {
        let id = runtime.create_env(variables, functions, options)?;
        Ok(Self {
            runtime: Arc::clone(runtime),
            id,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> EnvId {
        self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::destroyed(HandleKind::Environment, self.id));
        }
        Ok(())
    }

    pub fn compile(&self, text: &str) -> Result<CompiledProgram> {
        self.ensure_live()?;
        let id = self.runtime.compile(self.id, text)?;
        Ok(CompiledProgram::adopt(&self.runtime, id))
    }

    /// Compile and collect every diagnostic; see [`Runtime::compile_detailed`].
    pub fn compile_detailed(&self, text: &str) -> DetailedCompilation {
        if let Err(error) = self.ensure_live() {
            return DetailedCompilation {
                program: None,
                issues: Vec::new(),
                error: Some(error),
            };
        }
        let outcome = self.runtime.compile_detailed(self.id, text);
        DetailedCompilation {
            program: outcome
                .program_id
                .map(|id| CompiledProgram::adopt(&self.runtime, id)),
            issues: outcome.issues,
            error: outcome.error,
        }
    }

    pub fn typecheck(&self, text: &str) -> Result<Json> {
        self.ensure_live()?;
        self.runtime.typecheck(self.id, text)
    }

    pub fn extend(&self, options: &[OptionConfig]) -> Result<()> {
        self.ensure_live()?;
        self.runtime.extend_env(self.id, options)
    }

    /// Destroy the environment. Programs compiled from it keep working.
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.runtime.destroy_env(self.id)
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            tracing::warn!(env_id = %self.id, %error, "failed to destroy environment on drop");
        }
    }
}

/// Outcome of [`Environment::compile_detailed`].
pub struct DetailedCompilation {
    pub program: Option<CompiledProgram>,
    pub issues: Vec<Issue>,
    pub error: Option<Error>,
}

impl DetailedCompilation {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct CompiledProgram {
    runtime: Arc<Runtime>,
    id: ProgramId,
    destroyed: AtomicBool,
}

impl CompiledProgram {
    fn adopt(runtime: &Arc<Runtime>, id: ProgramId) -> Self {
        Self {
            runtime: Arc::clone(runtime),
            id,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn eval(&self, vars: &Map<String, Json>) -> Result<Json> {
        if self.is_destroyed() {
            return Err(Error::destroyed(HandleKind::Program, self.id));
        }
        self.runtime.eval(self.id, vars)
    }

    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.runtime.destroy_program(self.id)
    }
}

impl Drop for CompiledProgram {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            tracing::warn!(program_id = %self.id, %error, "failed to destroy program on drop");
        }
    }
}
