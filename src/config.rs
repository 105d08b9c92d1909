use crate::chart_of_accounts::ChartOfAccounts;
use crate::engine::CascadeOptions;
use crate::error::Result;
use crate::schema::AccountMappingEntry;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration, usually loaded from a JSON file.
///
/// ```json
/// {
///   "options": { "exclude_third_party_accounts": true },
///   "chart": [ { "prefix": "707", "indicator": "MC", "sub_indicator": "VENTES DE MARCHANDISES" } ]
/// }
/// ```
///
/// Leaving `chart` out selects the built-in French chart of accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SigConfig {
    #[serde(default)]
    pub options: CascadeOptions,

    #[serde(default)]
    #[schemars(description = "Custom prefix table, in priority order. Omit to use the standard PCG table.")]
    pub chart: Option<Vec<AccountMappingEntry>>,
}

impl SigConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Validates the custom table, or clones the standard one.
    pub fn build_chart(&self) -> Result<ChartOfAccounts> {
        match &self.chart {
            Some(entries) => ChartOfAccounts::from_entries(entries.clone()),
            None => Ok(ChartOfAccounts::standard().clone()),
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SigConfig)
    }
}
