//! Named environment capabilities configured from JSON.
//!
//! Hosts enable features by listing option configurations such as
//! `{"type": "OptionalTypes"}` or `{"type": "ASTValidators", "params": {...}}`.
//! Each name maps to an [`OptionBuilder`] in an [`OptionRegistry`]; the
//! builder reads its params, optionally runs a setup step against the
//! environment being built (claiming callbacks it owns), and produces engine
//! options.

mod ast_validators;
mod cross_type;
mod optional_types;

use std::fmt;
use std::sync::Arc;

use celrt_core::EnvOption;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub use ast_validators::{AstValidatorsBuilder, AstValidatorsParams};
pub use cross_type::{CrossTypeNumericComparisonsBuilder, CrossTypeParams};
pub use optional_types::OptionalTypesBuilder;

use crate::callbacks::CallbackBridge;
use crate::error::{Error, Result};

/// One option as written by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub params: Json,
}

impl OptionConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Json::Null,
        }
    }

    pub fn with_params(mut self, params: Json) -> Self {
        self.params = params;
        self
    }
}

/// State shared with builders during setup.
pub struct SetupContext<'a> {
    env_id: &'a str,
    bridge: &'a Arc<CallbackBridge>,
    claimed: Vec<String>,
}

impl<'a> SetupContext<'a> {
    pub fn new(env_id: &'a str, bridge: &'a Arc<CallbackBridge>) -> Self {
        Self {
            env_id,
            bridge,
            claimed: Vec::new(),
        }
    }

    /// Handle of the environment being built or extended.
    pub fn env_id(&self) -> &str {
        self.env_id
    }

    pub fn bridge(&self) -> &Arc<CallbackBridge> {
        self.bridge
    }

    /// Mark a callback as owned by the environment, so that it is released
    /// with it.
    pub fn claim(&mut self, impl_id: impl Into<String>) {
        let impl_id = impl_id.into();
        if !self.claimed.contains(&impl_id) {
            self.claimed.push(impl_id);
        }
    }

    pub fn into_claimed(self) -> Vec<String> {
        self.claimed
    }
}

/// Builds engine options for one named capability.
pub trait OptionBuilder: Send {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Read the `params` of an option configuration.
    fn configure(&mut self, params: &Json) -> Result<(), String>;

    /// Prepare against the environment being built.
    fn setup(&mut self, _context: &mut SetupContext<'_>) -> Result<(), String> {
        Ok(())
    }

    fn build(&self) -> Result<Vec<EnvOption>, String>;
}

/// Deserialize builder params; a missing `params` reads as `{}`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Json) -> Result<T, String> {
    let params = match params {
        Json::Null => Json::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| e.to_string())
}

/// Name and description of a registered option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionInfo {
    pub name: &'static str,
    pub description: &'static str,
}

type Factory = Box<dyn Fn() -> Box<dyn OptionBuilder> + Send + Sync>;

/// Option builders by name.
pub struct OptionRegistry {
    factories: IndexMap<&'static str, (OptionInfo, Factory)>,
}

impl OptionRegistry {
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Register a builder type. A later registration under the same name
    /// replaces the earlier one.
    pub fn register<B, F>(&mut self, factory: F)
    where
        B: OptionBuilder + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let probe = factory();
        let info = OptionInfo {
            name: probe.name(),
            description: probe.description(),
        };
        self.factories.insert(
            info.name,
            (info, Box::new(move || Box::new(factory()) as Box<dyn OptionBuilder>)),
        );
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn OptionBuilder>> {
        self.factories
            .get(name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| Error::InvalidInput(format!("unknown option type '{}'", name)))
    }

    pub fn list(&self) -> Vec<OptionInfo> {
        self.factories.values().map(|(info, _)| info.clone()).collect()
    }

    /// Configure, set up and build a list of option configurations.
    ///
    /// Returns the engine options and the callback ids claimed during setup.
    pub fn resolve(
        &self,
        configs: &[OptionConfig],
        context: &mut SetupContext<'_>,
    ) -> Result<Vec<EnvOption>> {
        let mut options = Vec::new();
        for config in configs {
            let mut builder = self.create(&config.kind)?;
            let failed = |step: &str, e: String| {
                Error::EnvironmentBuild(format!("failed to {} option {}: {}", step, config.kind, e))
            };
            builder
                .configure(&config.params)
                .map_err(|e| failed("configure", e))?;
            builder.setup(context).map_err(|e| failed("set up", e))?;
            options.extend(builder.build().map_err(|e| failed("build", e))?);
            tracing::debug!(env_id = context.env_id(), option = %config.kind, "option resolved");
        }
        Ok(options)
    }
}

impl Default for OptionRegistry {
    /// Registry with every built-in option.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(OptionalTypesBuilder::default);
        registry.register(CrossTypeNumericComparisonsBuilder::default);
        registry.register(AstValidatorsBuilder::default);
        registry
    }
}

impl fmt::Debug for OptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
