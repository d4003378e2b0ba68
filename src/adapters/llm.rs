use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

impl ModelConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        let prompt = &config.prompt_customization;
        Self {
            model_name: prompt.model.clone(),
            temperature: prompt.temperature as f32,
            max_tokens: prompt.max_tokens,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Failures surfaced by a model provider. Messages are meant to be read
/// by whoever maintains the CI setup, so they name the knob to turn.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("the API key was rejected (HTTP 401); check that OPENAI_API_KEY holds a valid key")]
    Unauthorized,
    #[error("model `{model}` is not available (HTTP 404); set prompt_customization.model to a model your account can use")]
    ModelNotFound { model: String },
    #[error("rate limit or quota exceeded (HTTP 429): {message}")]
    RateLimited { message: String },
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to reach {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response body: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;
    fn model_name(&self) -> &str;
}
