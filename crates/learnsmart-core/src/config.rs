//! Configuration management for LearnSmart.
//!
//! Loads configuration from ${LEARNSMART_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::shared::{resolve_base_url, resolve_token};
use crate::render::RenderPolicy;

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for LearnSmart configuration.
    //!
    //! LEARNSMART_HOME resolution order:
    //! 1. LEARNSMART_HOME environment variable (if set)
    //! 2. ~/.config/learnsmart (default)
    //! 3. ./.learnsmart when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the LearnSmart home directory.
    pub fn learnsmart_home() -> PathBuf {
        if let Ok(home) = std::env::var("LEARNSMART_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".learnsmart"),
            |h| h.join(".config").join("learnsmart"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        learnsmart_home().join("config.toml")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL (scheme + host + optional port)
    pub base_url: String,

    /// Streaming prompt endpoint, appended to `base_url`
    pub endpoint: String,

    /// Bearer token for the backend
    pub token: Option<String>,

    /// Verbose logging and raw stream capture
    pub debug: bool,

    /// Re-render strategy while a response streams
    pub render_policy: RenderPolicy,

    /// Deadline for one streaming response in seconds (0 disables)
    pub request_timeout_secs: u64,

    /// Optional log file; logs go to stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            token: None,
            debug: false,
            render_policy: RenderPolicy::default(),
            request_timeout_secs: 0,
            log_file: None,
        }
    }
}

impl Config {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    pub const DEFAULT_ENDPOINT: &str = "/api/genai/send_message";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Base URL with precedence: `LEARNSMART_BASE_URL` > config > default.
    pub fn effective_base_url(&self) -> Result<String> {
        resolve_base_url(
            Some(&self.base_url),
            "LEARNSMART_BASE_URL",
            Self::DEFAULT_BASE_URL,
        )
    }

    /// Bearer token with precedence: config > `LEARNSMART_TOKEN`.
    pub fn effective_token(&self) -> Option<String> {
        resolve_token(self.token.as_deref(), "LEARNSMART_TOKEN")
    }

    /// Full URL of the streaming endpoint.
    pub fn endpoint_url(&self) -> Result<String> {
        Ok(self.endpoint_url_for(&self.effective_base_url()?))
    }

    /// Joins the configured endpoint onto `base`.
    pub fn endpoint_url_for(&self, base: &str) -> String {
        let endpoint = self.endpoint.trim();
        let endpoint = if endpoint.is_empty() {
            Self::DEFAULT_ENDPOINT
        } else {
            endpoint
        };
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }
}
