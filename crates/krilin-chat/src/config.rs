// ABOUTME: Configuration loading and validation for krilin clients
// ABOUTME: TOML file under the user config dir with environment variable overrides

use crate::assembler::{AssemblerOptions, DEFAULT_FAILURE_MESSAGE};
use crate::client::SessionContext;
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const ENV_API_URL: &str = "KRILIN_API_URL";
pub const ENV_API_TOKEN: &str = "KRILIN_API_TOKEN";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub assembler: AssemblerConfig,
}

/// Backend connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend API (e.g., "http://localhost:8000").
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Bearer token for authenticated calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Path of the streaming chat endpoint, relative to `url`.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            token: None,
            chat_path: default_chat_path(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("chat_path", &self.chat_path)
            .finish()
    }
}

/// Reply assembly behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
    #[serde(default)]
    pub attach_progressively: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            failure_message: default_failure_message(),
            attach_progressively: false,
        }
    }
}

impl From<&AssemblerConfig> for AssemblerOptions {
    fn from(c: &AssemblerConfig) -> Self {
        Self {
            failure_message: c.failure_message.clone(),
            attach_progressively: c.attach_progressively,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_chat_path() -> String {
    "api/chat/stream".to_string()
}

fn default_failure_message() -> String {
    DEFAULT_FAILURE_MESSAGE.to_string()
}

impl Config {
    /// Returns the config directory path (<config dir>/krilin)
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("krilin"))
            .ok_or_else(|| ChatError::Config("Could not determine config directory".into()))
    }

    /// Returns the path to the default config file
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, or the default location.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    /// Environment overrides are applied after the file, then the result is validated.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read config from {:?}: {}", path, e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `KRILIN_API_URL` / `KRILIN_API_TOKEN` through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api.url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
    }

    /// Validate that required fields are present and properly formatted.
    pub fn validate(&self) -> Result<()> {
        let url = self.parsed_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "api.url must be http or https, got {:?}",
                url.scheme()
            )));
        }
        if self.api.chat_path.trim().is_empty() {
            return Err(ChatError::Config("api.chat_path is required".into()));
        }
        Ok(())
    }

    fn parsed_url(&self) -> Result<Url> {
        if self.api.url.is_empty() {
            return Err(ChatError::Config("api.url is required".into()));
        }
        Url::parse(&self.api.url)
            .map_err(|e| ChatError::Config(format!("api.url is not a valid URL: {}", e)))
    }

    pub fn session_context(&self) -> Result<SessionContext> {
        Ok(SessionContext {
            api_url: self.parsed_url()?,
            token: self.api.token.clone(),
        })
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions::from(&self.assembler)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
