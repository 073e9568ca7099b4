//! Hosted chat-completion model clients.
//!
//! Both supported models speak the same chat-completions dialect and
//! authenticate with an `api-key` header. They differ only in small request
//! details captured by [`ModelConfig`].

use std::time::Duration;

use aquaguard_core::{ModelPrediction, SensorGroup, TelemetryReading};
use serde_json::{json, Value};

use crate::http::{HttpConfig, HttpConnector};
use crate::{prompts, response, ConnectionStats, ConnectorError, ModelConnector};

/// Identifier of the o1-mini deployment.
pub const O1_MINI: &str = "o1-mini";

/// Identifier of the DeepSeek R1 deployment.
pub const DEEPSEEK_R1: &str = "deepseek-r1";

/// Instructions prepended to the prompt for models without a system role.
pub const ASSISTANT_PREFIX: &str = "You are an AI assistant specialized in aquaponics systems analysis.\n\n";

/// Request settings for one hosted model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Stable identifier used in requests and history
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Full chat-completions URL, including any `api-version` query
    pub endpoint: String,
    /// Credential sent in the `api-key` header
    pub api_key: Option<String>,
    /// Value for the request body's `model` field, when the endpoint needs one
    pub model_name: Option<String>,
    /// Text prepended to the user message
    pub instruction_prefix: Option<String>,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token limit
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl ModelConfig {
    /// Generic configuration with forecasting defaults.
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            endpoint: endpoint.into(),
            api_key: None,
            model_name: None,
            instruction_prefix: None,
            temperature: 0.1,
            max_tokens: 800,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    /// o1-mini: no system role, so instructions travel in the user message.
    pub fn o1_mini(endpoint: impl Into<String>) -> Self {
        let mut config = Self::new(O1_MINI, endpoint);
        config.display_name = "O1 Mini".into();
        config.instruction_prefix = Some(ASSISTANT_PREFIX.into());
        config
    }

    /// DeepSeek R1: the shared endpoint routes on the `model` field.
    pub fn deepseek_r1(endpoint: impl Into<String>) -> Self {
        let mut config = Self::new(DEEPSEEK_R1, endpoint);
        config.display_name = "DeepSeek R1".into();
        config.model_name = Some("DeepSeek".into());
        config
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set retry count
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Chat-completions body for a prompt.
    pub fn request_body(&self, prompt: &str) -> Value {
        let content = match &self.instruction_prefix {
            Some(prefix) => format!("{}{}", prefix, prompt),
            None => prompt.to_string(),
        };

        let mut body = json!({
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if let (Some(name), Some(object)) = (&self.model_name, body.as_object_mut()) {
            object.insert("model".into(), Value::from(name.as_str()));
        }
        body
    }
}

/// Client for one hosted chat-completion model
pub struct ChatModelClient {
    config: ModelConfig,
    http: HttpConnector,
}

impl ChatModelClient {
    /// Create a client. Fails when no API key is configured.
    pub fn new(config: ModelConfig) -> Result<Self, ConnectorError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConnectorError::NotConfigured(config.id.clone()))?;

        let http_config = HttpConfig::new(config.endpoint.clone())
            .api_key("api-key", api_key)
            .timeout(config.timeout)
            .retries(config.max_retries, Duration::from_millis(250));

        Ok(Self {
            http: HttpConnector::new(http_config)?,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ModelConnector for ChatModelClient {
    fn model_id(&self) -> &str {
        &self.config.id
    }

    async fn predict(
        &self,
        group: SensorGroup,
        reading: &TelemetryReading,
    ) -> Result<ModelPrediction, ConnectorError> {
        let prompt = prompts::forecast_prompt(group, reading);
        let body = self.config.request_body(&prompt);

        log::info!("Calling {} for {} forecast", self.config.display_name, group);
        let raw = self.http.post_json("", &body).await?;
        let text = response::completion_text(&raw)?;
        let prediction = response::parse_prediction(text)?;

        log::debug!(
            "{} predicted {} fields (confidence {:?})",
            self.config.id,
            prediction.predicted.len(),
            prediction.confidence_score
        );
        Ok(prediction)
    }

    fn stats(&self) -> ConnectionStats {
        self.http.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn o1_mini_prefixes_instructions() {
        let body = ModelConfig::o1_mini("https://models.example.com").request_body("Forecast please");
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with(ASSISTANT_PREFIX));
        assert!(content.ends_with("Forecast please"));
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("model").is_none());
        assert_eq!(body["max_tokens"], 800);
        assert_eq!(body["temperature"], 0.1);
    }

    #[test]
    fn deepseek_names_its_model() {
        let body = ModelConfig::deepseek_r1("https://models.example.com").request_body("Forecast please");
        assert_eq!(body["model"], "DeepSeek");
        assert_eq!(body["messages"][0]["content"], "Forecast please");
    }

    #[test]
    fn client_requires_api_key() {
        let missing = ChatModelClient::new(ModelConfig::o1_mini("https://models.example.com"));
        assert!(matches!(missing, Err(ConnectorError::NotConfigured(id)) if id == O1_MINI));

        let blank = ChatModelClient::new(ModelConfig::o1_mini("https://models.example.com").api_key("  "));
        assert!(blank.is_err());

        let ok = ChatModelClient::new(ModelConfig::deepseek_r1("https://models.example.com").api_key("k"));
        assert_eq!(ok.map(|c| c.model_id().to_string()).ok().as_deref(), Some(DEEPSEEK_R1));
    }

    #[test]
    fn client_rejects_bad_endpoint() {
        let result = ChatModelClient::new(ModelConfig::deepseek_r1("models.example.com").api_key("k"));
        assert!(matches!(result, Err(ConnectorError::Http(_))));
    }
}
