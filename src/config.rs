//! Configuration for Interlude
//!
//! # Configuration File Format
//!
//! TOML format, by default in `<config dir>/interlude/config.toml`:
//!
//! ```toml
//! [review]
//! timeout_secs = 480
//!
//! [server]
//! addr = "127.0.0.1:3457"
//! public_url = "http://127.0.0.1:3457"
//! event_capacity = 1000
//! ui_dir = "/usr/share/interlude/ui"
//!
//! [llm]
//! model = "claude-3-5-haiku-20241022"
//! max_tokens = 2048
//! temperature = 0.3
//! request_timeout_secs = 60
//! ```
//!
//! Every key can be overridden from the environment as
//! `INTERLUDE__<SECTION>__<KEY>`, e.g. `INTERLUDE__REVIEW__TIMEOUT_SECS=60`.
//! The Anthropic API key is only ever read from `ANTHROPIC_API_KEY`.

use crate::error::{InterludeError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "INTERLUDE";

/// Complete Interlude configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterludeConfig {
    /// Review session settings
    #[serde(default)]
    pub review: ReviewSettings,

    /// HTTP gateway settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Prompt enhancement model settings
    #[serde(default)]
    pub llm: LlmSettings,
}

/// Review session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSettings {
    /// Fixed deadline for a reviewer decision, counted from session creation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ReviewSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Base URL handed to the reviewer; differs from `addr` behind a proxy
    #[serde(default)]
    pub public_url: Option<String>,

    /// Lifecycle event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Static assets of the review page, served under `/review`
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            public_url: None,
            event_capacity: default_event_capacity(),
            ui_dir: None,
        }
    }
}

impl ServerSettings {
    /// Parsed bind address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr.parse().map_err(|e| {
            InterludeError::Config(config::ConfigError::Message(format!(
                "Invalid server address '{}': {}",
                self.addr, e
            )))
        })
    }

    /// URL the reviewer opens, without trailing slash
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.addr),
        }
    }
}

/// Prompt enhancement model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request limit on the Anthropic call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    8 * 60
}

fn default_addr() -> String {
    "127.0.0.1:3457".to_string()
}

fn default_event_capacity() -> usize {
    1000
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_max_tokens() -> usize {
    2048
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl InterludeConfig {
    /// Load configuration from an optional file plus environment overrides
    ///
    /// A missing file is not an error; defaults fill every absent key.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults: {:?}", path);
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: InterludeConfig = settings.try_deserialize()?;
        config.validate()?;

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InterludeError::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Reject settings the broker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.review.timeout_secs == 0 {
            return Err(InterludeError::Config(config::ConfigError::Message(
                "review.timeout_secs must be greater than zero".to_string(),
            )));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(InterludeError::Config(config::ConfigError::Message(
                "llm.request_timeout_secs must be greater than zero".to_string(),
            )));
        }
        if self.server.event_capacity == 0 {
            return Err(InterludeError::Config(config::ConfigError::Message(
                "server.event_capacity must be greater than zero".to_string(),
            )));
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("interlude")
            .join("config.toml")
    }
}
