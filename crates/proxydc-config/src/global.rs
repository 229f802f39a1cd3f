//! Global configuration for the proxydc Manager
//!
//! Located at `~/.config/proxydc/config.toml`. All filesystem paths the
//! core resolves (template directory, proxy artifact data directory,
//! token paths) are derived from this struct or its defaults; nothing is
//! read from global process state.

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global proxydc configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
    pub proxy: ProxyConfig,
}

/// Default settings for new environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Container runtime binary ("docker" or "podman"); empty means auto-detect.
    pub runtime: String,
    /// Directory under which named templates live, one subdirectory per template.
    pub template_dir: Option<PathBuf>,
    /// Remote user the adapter execs as inside the app container when the
    /// template does not declare one.
    pub remote_user: String,
    /// Host path to the agent auth token file (`~` expanded). Absent means skip.
    pub agent_token_path: Option<String>,
    /// Host path to the forge (git-hosting) token file. Absent means skip.
    pub forge_token_path: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            runtime: String::new(),
            template_dir: None,
            remote_user: "vscode".to_string(),
            agent_token_path: None,
            forge_token_path: None,
        }
    }
}

/// Proxy sidecar defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Image reference for the proxy sidecar.
    pub image: String,
    /// Port the proxy listens on inside its container.
    pub listen_port: u16,
    /// Container-internal path of the proxy's JSONL request log.
    pub container_log_path: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            image: "mitmproxy/mitmproxy:latest".to_string(),
            listen_port: 8080,
            container_log_path: "/var/log/proxy/requests.jsonl".to_string(),
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path, falling back to
    /// defaults when no file is present.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
        })?;

        Ok(config)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.clone(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            source: e,
        })
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "proxydc").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Application data directory (holds per-project proxy artifact directories).
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "proxydc").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn is_first_run(&self) -> bool {
        self.defaults.runtime.is_empty()
    }
}
