//! Configuration management for Steward
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`STW_*` prefix, highest precedence)
//! 2. steward.local.toml (gitignored, local overrides)
//! 3. steward.toml (git-tracked, project config)
//! 4. ~/.config/steward/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use steward_policy::ReviewRequiredResolution;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Steward configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    pub storage: StorageConfig,
    pub workflow: WorkflowConfig,
    pub risk: RiskConfig,
}

impl StewardConfig {
    /// Resolve relative paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.storage.data_dir.is_relative() {
            self.storage.data_dir = base.join(&self.storage.data_dir);
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.grant_validity_days < 1 {
            return Err(ConfigError::ValidationError(format!(
                "workflow.grant_validity_days must be at least 1, got {}",
                self.workflow.grant_validity_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the request collection and the id counter.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".steward/data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Days an access grant stays valid after approval.
    pub grant_validity_days: i64,
    /// How a REVIEW_REQUIRED automated outcome resolves
    /// ("auto-reject" or "await-override").
    pub review_required: ReviewRequiredResolution,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            grant_validity_days: 90,
            review_required: ReviewRequiredResolution::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Seed for the reference risk model. Unset means entropy-seeded;
    /// set it for reproducible runs.
    pub seed: Option<u64>,
}
