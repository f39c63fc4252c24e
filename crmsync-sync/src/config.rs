//! Engine configuration.
//!
//! Loaded from a JSON file; every section has defaults so a minimal file only
//! needs the remote base URL:
//!
//! ```json
//! {
//!   "remote": { "base_url": "https://crm.example.com/api", "api_token": "..." },
//!   "validation": ["SKIP_UNCHANGED_FIELDS"],
//!   "skip_rules": [{ "entity_type": "company", "operation": "push" }]
//! }
//! ```

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::OrchestratorConfig;
use crate::remote::http::HttpRemoteConfig;
use crate::remote::retry::RetryPolicy;
use crate::skip::{SkipOptionCollection, SkipRuleConfig};
use crmsync_storage::EntityStore;
use crmsync_types::ValidationLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local entity store (SQLite file).
    pub store_path: String,
    /// Sync error ledger (SQLite file).
    pub ledger_path: String,
    pub remote: HttpRemoteConfig,
    pub retry: RetryPolicy,
    pub orchestrator: OrchestratorConfig,
    /// Validation flag names applied to every run, e.g. `"SKIP_ALL"`.
    pub validation: Vec<String>,
    pub skip_rules: Vec<SkipRuleConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: "crmsync.db".to_string(),
            ledger_path: "crmsync-ledger.db".to_string(),
            remote: HttpRemoteConfig::default(),
            retry: RetryPolicy::default(),
            orchestrator: OrchestratorConfig::default(),
            validation: Vec::new(),
            skip_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::Configuration(format!("invalid engine config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The configured validation flags as a set.
    pub fn validation_level(&self) -> SyncResult<ValidationLevel> {
        ValidationLevel::from_names(&self.validation)
            .map_err(|e| SyncError::Configuration(e.to_string()))
    }

    /// Builds the skip rules, resolving listed entities against `store`.
    pub fn skip_options(&self, store: &EntityStore) -> SyncResult<SkipOptionCollection> {
        self.skip_rules.iter().map(|rule| rule.build(store)).collect()
    }
}
