use celrt_core::EnvOption;
use serde::Deserialize;
use serde_json::Value as Json;

use super::{OptionBuilder, parse_params};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossTypeParams {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for CrossTypeParams {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Allows ordering and equality between `int`, `uint` and `double` operands
/// at check time, e.g. `1 < 2.5`.
#[derive(Debug, Default)]
pub struct CrossTypeNumericComparisonsBuilder {
    params: CrossTypeParams,
}

impl OptionBuilder for CrossTypeNumericComparisonsBuilder {
    fn name(&self) -> &'static str {
        "CrossTypeNumericComparisons"
    }

    fn description(&self) -> &'static str {
        "Comparisons between int, uint and double operands"
    }

    fn configure(&mut self, params: &Json) -> Result<(), String> {
        self.params = parse_params(params)?;
        Ok(())
    }

    fn build(&self) -> Result<Vec<EnvOption>, String> {
        Ok(vec![EnvOption::CrossTypeNumericComparisons(self.params.enabled)])
    }
}
