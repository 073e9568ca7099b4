//! AI Model Connectors for Telemetry Forecasting
//!
//! ## Overview
//!
//! Forecasts come from hosted chat-completion models. This crate owns
//! everything between a [`TelemetryReading`] and a [`ModelPrediction`]:
//!
//! 1. **Prompting** ([`prompts`]): fill the group's forecast template with
//!    the current reading
//! 2. **Transport** ([`http`]): JSON over HTTPS with retry and backoff
//! 3. **Decoding** ([`response`]): pull the completion text out of the
//!    response envelope and parse the first JSON object in it
//! 4. **Orchestration** ([`runner`]): query both models concurrently and
//!    merge their answers with the core ensemble combiner
//!
//! ## Model Selection
//!
//! | Id | Notes |
//! |----|-------|
//! | `o1-mini` | No system role; instructions are prefixed to the user message |
//! | `deepseek-r1` | Needs an explicit `model` name in the request body |
//!
//! ## Retry Logic
//!
//! Exponential backoff on 5xx, 429 and transport failures:
//! ```text
//! retry_delay = base_delay * 2^attempt
//! ```
//! Client errors (4xx other than 429) fail immediately.
//!
//! ## Security Considerations
//!
//! 1. Never hard-code credentials; keys come from configuration
//! 2. Endpoints must be `http://` or `https://` URLs
//! 3. A model without a key is reported as not configured, never called
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use aquaguard_connectors::models::{ChatModelClient, ModelConfig};
//! use aquaguard_connectors::ModelConnector;
//! use aquaguard_core::{SensorGroup, TelemetryReading};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ModelConfig::deepseek_r1("https://models.example.com/chat/completions")
//!     .api_key(std::env::var("DEEPSEEK_API_KEY")?);
//! let client = ChatModelClient::new(config)?;
//!
//! let reading = TelemetryReading::new("2024-03-07T00:00:00Z").with_value("phLevel", 7.1);
//! let prediction = client.predict(SensorGroup::Fish, &reading).await?;
//! println!("{:?}", prediction.predicted);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod models;

pub mod prompts;
pub mod response;
pub mod runner;

// Re-export common types
#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpConnector, HttpError};
#[cfg(feature = "http")]
pub use models::{ChatModelClient, ModelConfig};
pub use runner::{EnsembleOutcome, EnsembleRunner, SyntheticModel, UnconfiguredModel};

use aquaguard_core::{ModelPrediction, SensorGroup, TelemetryReading};
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Model {0} is not configured")]
    NotConfigured(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("No JSON object found in model response")]
    NoJson,

    #[error("Invalid prediction JSON: {0}")]
    InvalidPrediction(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// A forecasting model reachable over some transport
#[async_trait::async_trait]
pub trait ModelConnector: Send + Sync {
    /// Stable model identifier, e.g. `deepseek-r1`
    fn model_id(&self) -> &str;

    /// Forecast the group's fields 24 hours after `reading`
    async fn predict(
        &self,
        group: SensorGroup,
        reading: &TelemetryReading,
    ) -> Result<ModelPrediction, ConnectorError>;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionStats {
    /// Requests answered successfully
    pub messages_sent: u64,
    /// Requests that failed after all retries
    pub messages_failed: u64,
    /// Request body bytes sent
    pub bytes_sent: u64,
    /// Retry attempts made
    pub retries: u32,
    /// Last error message
    pub last_error: Option<String>,
}
