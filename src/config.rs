//! Runtime-wide settings.

use std::path::Path;

use celrt_core::api::ExecutionOptions;
use celrt_core::parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::OptionConfig;

/// Limits applied when parsing expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserLimits {
    /// Maximum nesting depth of the expression tree.
    pub max_depth: usize,
    /// Maximum expression length in code points.
    pub max_size: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Settings shared by every environment a [`crate::Runtime`] creates.
///
/// ```
/// use celrt::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(
///     r#"{"execution": {"maxIterations": 1000}, "defaultOptions": [{"type": "OptionalTypes"}]}"#,
/// )
/// .unwrap();
/// assert_eq!(config.execution.max_iterations, Some(1000));
/// assert_eq!(config.parser.max_depth, 250);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub parser: ParserLimits,
    #[serde(with = "execution_camel_case")]
    pub execution: ExecutionOptions,
    /// Options applied to every new environment before the caller's own.
    pub default_options: Vec<OptionConfig>,
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidInput(format!("invalid runtime config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }
}

/// Host-facing camelCase names for the engine's execution options.
mod execution_camel_case {
    use celrt_core::api::ExecutionOptions;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Wire {
        max_depth: usize,
        max_iterations: Option<usize>,
    }

    impl Default for Wire {
        fn default() -> Self {
            let defaults = ExecutionOptions::default();
            Wire {
                max_depth: defaults.max_depth,
                max_iterations: defaults.max_iterations,
            }
        }
    }

    pub fn serialize<S: Serializer>(options: &ExecutionOptions, serializer: S) -> Result<S::Ok, S::Error> {
        Wire {
            max_depth: options.max_depth,
            max_iterations: options.max_iterations,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ExecutionOptions, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok(ExecutionOptions {
            max_depth: wire.max_depth,
            max_iterations: wire.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(RuntimeConfig::from_json_str("{}").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = RuntimeConfig::from_json_str(r#"{"parser": {"maxSize": 64}, "execution": {"maxDepth": 10}}"#)
            .unwrap();
        assert_eq!(config.parser.max_size, 64);
        assert_eq!(config.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.execution.max_depth, 10);
        assert_eq!(config.execution.max_iterations, None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(RuntimeConfig::default()).unwrap();
        assert!(json["execution"].get("maxIterations").is_some());
        assert!(json["parser"].get("maxDepth").is_some());
        assert_eq!(json["defaultOptions"], serde_json::json!([]));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{"parser": {"maxDepth": "deep"}}"#),
            Err(Error::InvalidInput(_))
        ));
    }
}
