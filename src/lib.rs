//! celrt - an embeddable runtime for CEL (Common Expression Language)
//!
//! # Overview
//!
//! celrt wraps the `celrt-core` engine in a handle-based runtime that hosts
//! can drive across a language boundary:
//!
//! - values cross as JSON and are shaped by declared CEL types
//! - type descriptors (`{"kind": "list", "elementType": "int"}`) resolve to
//!   engine types
//! - custom functions forward to host callbacks keyed by an implementation id
//! - environments and programs are referred to by ids (`env_1`, `prg_1`), and
//!   callbacks stay registered while any of them may still call them
//! - named options (`OptionalTypes`, `CrossTypeNumericComparisons`,
//!   `ASTValidators`) extend an environment at creation time
//!
//! # Quick Start
//!
//! ```
//! use celrt::{FunctionDef, Runtime, VariableDecl};
//! use serde_json::json;
//!
//! let runtime = Runtime::new();
//! runtime.bridge().register_fn("greet", |args| {
//!     Ok(json!(format!("hello, {}", args[0].as_str().unwrap_or_default())))
//! });
//!
//! let env = runtime
//!     .create_env(
//!         &[VariableDecl::new("name", "string")],
//!         &[FunctionDef::new("greet", "greet").param("who", "string").returns("string")],
//!         &[],
//!     )
//!     .unwrap();
//! let program = runtime.compile(env, "greet(name)").unwrap();
//! let vars = json!({"name": "world"});
//! assert_eq!(runtime.eval(program, vars.as_object().unwrap()).unwrap(), json!("hello, world"));
//! ```
//!
//! # API Tiers
//!
//! 1. [`Runtime`]: handle ids, for hosts that manage lifetimes themselves
//! 2. [`Environment`] and [`CompiledProgram`]: owned handles destroyed on drop
//! 3. [`api::JsonApi`]: every call as JSON in, JSON out
//! 4. [`evaluate`]: one-shot evaluation without handles

pub mod api;
pub mod callbacks;
pub mod compilation;
pub mod config;
pub mod decls;
pub mod error;
pub mod evaluate;
pub mod handle;
pub mod options;
pub mod render;
pub mod runtime;
pub mod store;
pub mod types;
pub mod values;

pub use callbacks::{Callback, CallbackBridge, CallbackError};
pub use compilation::{Issue, IssueLocation};
pub use config::{ParserLimits, RuntimeConfig};
pub use decls::{FunctionDef, ParamDef, VariableDecl};
pub use error::{Error, HandleKind, Result};
pub use evaluate::evaluate;
pub use handle::{CompiledProgram, DetailedCompilation, Environment};
pub use options::{OptionConfig, OptionInfo, OptionRegistry};
pub use runtime::{CompileOutcome, Runtime};
pub use store::{EnvId, ProgramId};

// Re-export the engine types that appear in public signatures
pub use celrt_core::api::Severity;
pub use celrt_core::{EvalError, Type};
