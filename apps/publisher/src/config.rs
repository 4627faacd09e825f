//! Configuration file discovery for the CLI.
//!
//! The publisher config is stored as TOML:
//! - `$XDG_CONFIG_HOME/hashpub/config.toml`
//! - or `~/.config/hashpub/config.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use hashpub_deploy::{DeployerConfig, HashPair, StandardIndex};

/// Resolves the config path: explicit flag first, then the XDG location.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("hashpub").join("config.toml"));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("hashpub").join("config.toml"))
}

/// Loads the publisher config, or the defaults when no file is found.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<DeployerConfig> {
    let Some(path) = config_path(explicit) else {
        tracing::debug!("no config location, using defaults");
        return Ok(DeployerConfig::default());
    };
    DeployerConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

/// Hashes of assets published out of band: the prelude and standard packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StandardFile {
    pub prelude: HashPair,
    pub packages: StandardIndex,
}

impl StandardFile {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}
