//! Well-known configuration file locations

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

/// Resolver for Steward's configuration file locations.
#[derive(Debug, Default)]
pub struct Paths;

impl Paths {
    pub fn new() -> Self {
        Self
    }

    /// User-level config: `~/.config/steward/config.toml` (per XDG).
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", "steward")
            .ok_or_else(|| ConfigError::XdgError("no home directory available".to_string()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Project config: `<project>/steward.toml` (git-tracked).
    pub fn project_config_file(project_dir: &Path) -> PathBuf {
        project_dir.join("steward.toml")
    }

    /// Local overrides: `<project>/steward.local.toml` (gitignored).
    pub fn local_config_file(project_dir: &Path) -> PathBuf {
        project_dir.join("steward.local.toml")
    }
}
