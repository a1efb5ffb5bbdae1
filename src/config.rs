use crate::error::{ReconciliationError, Result};
use crate::schema::Money;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_COMMUTE_ALLOWANCE_PER_HEAD: Money = 8000;
pub const DEFAULT_MAX_REPORTED_OFFENDERS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    #[default]
    #[schemars(description = "Abort the whole import on the first row that fails type coercion.")]
    AbortOnFirstError,

    #[schemars(
        description = "Drop rows that fail type coercion and report them in the import summary."
    )]
    SkipInvalidRows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(description = "Number of records sent to the persistence collaborator per write.")]
    pub batch_size: usize,

    #[schemars(
        description = "Per-head commute allowance used to estimate the commute forecast (payroll row count x this amount). A heuristic placeholder until a real commute forecast source exists."
    )]
    pub commute_allowance_per_head: Money,

    #[schemars(description = "What to do with rows whose fields cannot be coerced.")]
    pub coercion_policy: CoercionPolicy,

    #[schemars(
        description = "Store code assumed for rows that carry no store column. When unset such rows fail validation."
    )]
    pub default_store_code: Option<String>,

    #[schemars(description = "Maximum number of future-dated rows listed in a rejection.")]
    pub max_reported_offenders: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            commute_allowance_per_head: DEFAULT_COMMUTE_ALLOWANCE_PER_HEAD,
            coercion_policy: CoercionPolicy::default(),
            default_store_code: None,
            max_reported_offenders: DEFAULT_MAX_REPORTED_OFFENDERS,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ReconciliationError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.commute_allowance_per_head < 0 {
            return Err(ReconciliationError::InvalidConfig(format!(
                "commute_allowance_per_head must not be negative, got {}",
                self.commute_allowance_per_head
            )));
        }
        if let Some(code) = &self.default_store_code {
            if code.trim().is_empty() {
                return Err(ReconciliationError::InvalidConfig(
                    "default_store_code must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
