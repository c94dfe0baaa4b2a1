//! User configuration
//!
//! Stored in `~/.config/kustwrap/config.yaml`. Every field can be overridden
//! on the command line or through the matching `KUSTWRAP_*` variable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustwrapConfig {
    /// kustomize binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,

    /// Proxy for git fetches made by kustomize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,

    /// Directory of per-host CA bundles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_data_path: Option<PathBuf>,

    /// Default `kustomize build` options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_options: Option<String>,
}

impl KustwrapConfig {
    /// Load `path`, or the default location when `None`
    ///
    /// A missing default file yields the defaults; an explicitly requested
    /// file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
            message: format!("failed to read config {}: {}", path.display(), e),
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| {
            CliError::config_with_help(
                format!("invalid config {}: {}", path.display(), e),
                "expected keys: binaryPath, proxy, noProxy, tlsDataPath, buildOptions",
            )
        })
    }

    /// Get default configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kustwrap").join("config.yaml"))
    }
}
