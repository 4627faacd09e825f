//! Publisher configuration.
//!
//! Stored as TOML. Every field has a default, so a partial file (or no file
//! at all) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::hashchain::ScriptHost;

/// Settings shared by deploys and updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployerConfig {
    /// Number of upload workers per publish.
    pub concurrent_storage_uploads: usize,
    /// Bucket holding entry documents.
    pub index_bucket: String,
    /// Bucket holding package scripts, loaders and stripped archives.
    pub pkg_bucket: String,
    /// Scheme browsers use to fetch package scripts.
    pub pkg_protocol: String,
    /// Host browsers fetch package scripts from.
    pub pkg_host: String,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            concurrent_storage_uploads: 10,
            index_bucket: "index".into(),
            pkg_bucket: "pkg".into(),
            pkg_protocol: "https".into(),
            pkg_host: "pkg.localhost".into(),
        }
    }
}

impl DeployerConfig {
    /// Loads a configuration file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: DeployerConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Rejects settings that cannot produce a working publish.
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.concurrent_storage_uploads == 0 {
            return Err(DeployError::Config(
                "concurrent_storage_uploads must be at least 1".into(),
            ));
        }
        for (field, value) in [
            ("index_bucket", &self.index_bucket),
            ("pkg_bucket", &self.pkg_bucket),
            ("pkg_protocol", &self.pkg_protocol),
            ("pkg_host", &self.pkg_host),
        ] {
            if value.is_empty() {
                return Err(DeployError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Where loader scripts point browsers for package scripts.
    pub fn script_host(&self) -> ScriptHost<'_> {
        ScriptHost {
            protocol: &self.pkg_protocol,
            host: &self.pkg_host,
        }
    }
}
