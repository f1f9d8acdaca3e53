use celrt_core::EnvOption;
use serde_json::Value as Json;

use super::OptionBuilder;

/// Enables `optional.of`, `optional.none`, `optional.ofNonZeroValue`, the
/// `.?field`, `[?key]`, `[?elem]` and `{?key: value}` forms, and the
/// `hasValue`, `value`, `orValue` and `or` methods. Takes no params.
#[derive(Debug, Default)]
pub struct OptionalTypesBuilder;

impl OptionBuilder for OptionalTypesBuilder {
    fn name(&self) -> &'static str {
        "OptionalTypes"
    }

    fn description(&self) -> &'static str {
        "Optional values and optional field, index and entry syntax"
    }

    fn configure(&mut self, _params: &Json) -> Result<(), String> {
        Ok(())
    }

    fn build(&self) -> Result<Vec<EnvOption>, String> {
        Ok(vec![EnvOption::OptionalTypes])
    }
}
