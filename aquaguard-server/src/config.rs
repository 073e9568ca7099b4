//! Server Configuration
//!
//! ## Overview
//!
//! Everything the server needs at startup, assembled by the binary from CLI
//! flags and environment variables. Model credentials are optional: a model
//! without a key is registered as unconfigured and never called.
//!
//! ## Defaults
//!
//! | Setting | Default |
//! |---------|---------|
//! | `bind` | `127.0.0.1:5000` |
//! | `data_dir` | `data` |
//! | `history_path` | `<data_dir>/analysis/history.json` |
//! | `workers` | 4 |
//! | `synthetic_fallback` | `true` |
//! | model timeout | 30 s |

use std::path::PathBuf;

use aquaguard_connectors::ModelConfig;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default request worker count
pub const DEFAULT_WORKERS: usize = 4;

/// Endpoint and credential for one hosted model
#[derive(Debug, Clone, Default)]
pub struct ModelEndpoint {
    /// Chat-completions URL
    pub endpoint: Option<String>,
    /// API key; the model stays unconfigured without one
    pub api_key: Option<String>,
}

impl ModelEndpoint {
    /// Endpoint with an optional key
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { endpoint: Some(endpoint.into()), api_key }
    }

    /// Usable when both endpoint and a non-blank key are set
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }
}

/// Runtime configuration for the API server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Directory holding the four CSV datasets
    pub data_dir: PathBuf,
    /// File backing the analysis history; `None` keeps history in memory
    pub history_path: Option<PathBuf>,
    /// Request worker threads
    pub workers: usize,
    /// Serve synthetic series when a group has no recorded data
    pub synthetic_fallback: bool,
    /// o1-mini deployment
    pub o1_mini: ModelEndpoint,
    /// DeepSeek R1 deployment
    pub deepseek_r1: ModelEndpoint,
    /// Model request timeout in seconds
    pub model_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            bind: DEFAULT_BIND.to_string(),
            history_path: Some(data_dir.join("analysis").join("history.json")),
            data_dir,
            workers: DEFAULT_WORKERS,
            synthetic_fallback: true,
            o1_mini: ModelEndpoint::default(),
            deepseek_r1: ModelEndpoint::default(),
            model_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Defaults with the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            history_path: Some(data_dir.join("analysis").join("history.json")),
            data_dir,
            ..Default::default()
        }
    }

    /// Set listen address
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set history file, or keep history in memory with `None`
    pub fn history_path(mut self, path: Option<PathBuf>) -> Self {
        self.history_path = path;
        self
    }

    /// Set worker thread count (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enable or disable synthetic series
    pub fn synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    /// Configure the o1-mini deployment
    pub fn o1_mini(mut self, endpoint: ModelEndpoint) -> Self {
        self.o1_mini = endpoint;
        self
    }

    /// Configure the DeepSeek R1 deployment
    pub fn deepseek_r1(mut self, endpoint: ModelEndpoint) -> Self {
        self.deepseek_r1 = endpoint;
        self
    }

    /// Set model request timeout
    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.model_timeout_secs = secs;
        self
    }

    /// Client settings for o1-mini, when configured
    pub fn o1_mini_model(&self) -> Option<ModelConfig> {
        self.model_config(&self.o1_mini, |url| ModelConfig::o1_mini(url))
    }

    /// Client settings for DeepSeek R1, when configured
    pub fn deepseek_r1_model(&self) -> Option<ModelConfig> {
        self.model_config(&self.deepseek_r1, |url| ModelConfig::deepseek_r1(url))
    }

    fn model_config(&self, endpoint: &ModelEndpoint, build: fn(String) -> ModelConfig) -> Option<ModelConfig> {
        if !endpoint.is_configured() {
            return None;
        }
        let url = endpoint.endpoint.clone()?;
        let key = endpoint.api_key.clone()?;
        Some(build(url).api_key(key).timeout_secs(self.model_timeout_secs))
    }
}
