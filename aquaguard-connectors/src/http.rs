//! HTTP/HTTPS Connector - JSON API Integration
//!
//! ## Overview
//!
//! Thin JSON client used to reach hosted model endpoints. Requests are
//! performed by a blocking `ureq` agent on tokio's blocking pool, so several
//! requests can be in flight while the caller awaits them concurrently.
//!
//! ## Implementation Choices
//!
//! - JSON request and response bodies only
//! - One agent per connector, so TCP/TLS connections are reused
//! - Automatic retries with exponential backoff on 5xx, 429 and transport
//!   failures; other 4xx responses fail immediately
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use aquaguard_connectors::http::{HttpConnector, HttpConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::new("https://models.example.com/chat/completions")
//!     .api_key("api-key", "secret")
//!     .timeout_secs(30);
//!
//! let http = HttpConnector::new(config)?;
//! let body = serde_json::json!({ "messages": [] });
//! let response = http.post_json("", &body).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use crate::ConnectionStats;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL; request paths are appended verbatim
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Custom headers
    pub headers: BTreeMap<String, String>,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub retry_base_delay: Duration,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer(String),
    /// API key in header
    ApiKey { header: String, value: String },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            AuthMethod::ApiKey { header, .. } => write!(f, "ApiKey({}: <redacted>)", header),
        }
    }
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            headers: BTreeMap::new(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            user_agent: format!("AquaGuard/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set bearer token authentication
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set API key authentication
    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count and base backoff delay
    pub fn retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

enum Attempt {
    Done(String),
    Retry(HttpError),
    Fail(HttpError),
}

/// HTTP connector using lightweight ureq client
pub struct HttpConnector {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl HttpConnector {
    /// Create new HTTP connector
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send GET request
    pub async fn get_json(&self, path: &str) -> Result<Value, HttpError> {
        let url = format!("{}{}", self.config.base_url, path);
        let request = self.build_request(self.agent.get(&url));
        self.execute_with_retry(request, None).await
    }

    /// Send POST request with a JSON body
    pub async fn post_json<T: Serialize>(&self, path: &str, data: &T) -> Result<Value, HttpError> {
        let url = format!("{}{}", self.config.base_url, path);
        let request = self.build_request(self.agent.post(&url));

        let json = serde_json::to_string(data).map_err(|e| HttpError::Serialization(e.to_string()))?;

        self.execute_with_retry(request, Some(json)).await
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut ConnectionStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    /// Build request with authentication and headers
    fn build_request(&self, mut request: ureq::Request) -> ureq::Request {
        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {}", token));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    /// Execute request with retry logic
    async fn execute_with_retry(&self, request: ureq::Request, json: Option<String>) -> Result<Value, HttpError> {
        let body_len = json.as_ref().map_or(0, String::len) as u64;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.config.retry_base_delay, attempt);
                log::debug!("Retrying {} in {:?} (attempt {})", request.url(), delay, attempt);
                self.record(|s| s.retries += 1);
                tokio::time::sleep(delay).await;
            }

            let pending = request.clone();
            let body = json.clone();
            let outcome = tokio::task::spawn_blocking(move || send_blocking(pending, body))
                .await
                .map_err(|e| HttpError::Request(format!("Request task failed: {}", e)))?;

            match outcome {
                Attempt::Done(text) => {
                    self.record(|s| {
                        s.messages_sent += 1;
                        s.bytes_sent += body_len;
                    });

                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }

                    return serde_json::from_str(&text).map_err(|e| HttpError::Serialization(e.to_string()));
                }
                Attempt::Retry(e) => {
                    log::warn!("Request to {} failed: {}", request.url(), e);
                    last_error = Some(e);
                }
                Attempt::Fail(e) => {
                    self.record(|s| {
                        s.messages_failed += 1;
                        s.last_error = Some(e.to_string());
                    });
                    return Err(e);
                }
            }
        }

        // All retries exhausted
        let error = last_error.unwrap_or_else(|| HttpError::Request("Unknown error".into()));
        self.record(|s| {
            s.messages_failed += 1;
            s.last_error = Some(error.to_string());
        });
        Err(error)
    }
}

fn send_blocking(request: ureq::Request, json: Option<String>) -> Attempt {
    let response = match json {
        Some(body) => request.send_string(&body),
        None => request.call(),
    };

    match response {
        Ok(resp) => match resp.into_string() {
            Ok(text) => Attempt::Done(text),
            Err(e) => Attempt::Retry(HttpError::Request(e.to_string())),
        },
        Err(ureq::Error::Status(code, resp)) => {
            let message = resp.into_string().unwrap_or_default();
            match code {
                401 | 403 => Attempt::Fail(HttpError::Auth(format!("status {}: {}", code, message))),
                429 | 500..=599 => Attempt::Retry(HttpError::ServerError { status: code, message }),
                _ => Attempt::Fail(HttpError::ServerError { status: code, message }),
            }
        }
        Err(ureq::Error::Transport(e)) => Attempt::Retry(HttpError::Request(e.to_string())),
    }
}

/// Backoff before retry number `attempt` (1-based): `base`, then doubling.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.saturating_sub(1).min(16))
}
