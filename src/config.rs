use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::llm::Provider;

pub(crate) const CONFIG_FILE: &str = "crucible.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which provider to use: "gemini" or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Endpoint override (proxies, OpenAI-compatible gateways)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    /// Parse the provider string into a Provider enum
    pub fn get_provider(&self) -> Result<Provider> {
        self.provider.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Per-command timeout inside the container; unset means unbounded
    #[serde(default)]
    pub exec_timeout_secs: Option<u64>,

    /// Remove the session image at teardown
    #[serde(default = "default_true")]
    pub remove_image: bool,

    /// Where build contexts are written; empty means the system temp dir
    #[serde(default)]
    pub build_dir: String,

    /// Seconds Docker waits before killing the container on stop
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: i64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            exec_timeout_secs: None,
            remove_image: true,
            build_dir: String::new(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl SandboxConfig {
    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_secs.map(Duration::from_secs)
    }

    pub fn build_dir(&self) -> PathBuf {
        if self.build_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.build_dir)
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_stop_timeout() -> i64 {
    5
}

impl Config {
    /// Load configuration from the project directory, then the user config
    /// directory, using defaults if neither has a file
    pub fn load(project_dir: &Path) -> Result<Self> {
        let user_dir = dirs::config_dir().map(|d| d.join("crucible"));
        Self::load_from(project_dir, user_dir.as_deref())
    }

    fn load_from(project_dir: &Path, user_dir: Option<&Path>) -> Result<Self> {
        let candidates = std::iter::once(project_dir).chain(user_dir);
        for dir in candidates {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                debug!("Loading config from {}", config_path.display());
                return Self::read(&config_path);
            }
        }
        Ok(Self::default())
    }

    fn read(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }
}
