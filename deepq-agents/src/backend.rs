//! LLM backend abstraction
//!
//! Supports OpenAI-compatible APIs and Anthropic Claude. Every backend
//! returns plain text; provider response shapes never leak past this module.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use deepq_core::{ModelProvider, ResearchConfig};

/// Model call failures
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty response")]
    EmptyResponse,
}

/// A chat model that turns a system and user prompt into text
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const ANTHROPIC_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Settings for any OpenAI-compatible chat endpoint
#[derive(Debug, Clone)]
pub struct OpenAIBackendConfig {
    pub api_key: String,
    /// `None` talks to api.openai.com
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u16,
}

impl Default for OpenAIBackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl OpenAIBackendConfig {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self {
            base_url: Some(OPENROUTER_BASE.to_string()),
            ..Self::openai(api_key, model)
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u16) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// OpenAI and OpenRouter chat completions
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    config: OpenAIBackendConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIBackendConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("OpenAI API key is required".to_string()));
        }

        let api_config = match &config.base_url {
            Some(base) => OpenAIConfig::new().with_api_key(&config.api_key).with_api_base(base),
            None => OpenAIConfig::new().with_api_key(&config.api_key),
        };

        Ok(Self {
            client: Client::with_config(api_config),
            config,
        })
    }

    fn chat_request(&self, system: &str, user: &str) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system),
                ChatCompletionRequestMessage::User(user),
            ])
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
    }
}

fn classify_openai_error(err: OpenAIError) -> LlmError {
    let msg = err.to_string();
    if msg.contains("429") || msg.to_lowercase().contains("rate limit") {
        LlmError::RateLimited
    } else {
        LlmError::Api(msg)
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = self
            .chat_request(system, user)
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Settings for the Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
}

impl AnthropicConfig {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            base_url: ANTHROPIC_BASE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Only text blocks carry a `text` field
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages backend over plain reqwest
pub struct AnthropicBackend {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Anthropic API key is required".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: [UserMessage {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Anthropic returned {}: {}", status, detail)));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let text: String = parsed.content.into_iter().filter_map(|block| block.text).collect();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

pub type SharedBackend = Arc<dyn LlmBackend>;

pub fn create_backend(config: OpenAIBackendConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(OpenAIBackend::new(config)?))
}

pub fn create_anthropic_backend(config: AnthropicConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(AnthropicBackend::new(config)?))
}

/// Create the backend selected by a research config
pub fn backend_for(config: &ResearchConfig) -> Result<SharedBackend, LlmError> {
    let key = config
        .model_api_key
        .as_deref()
        .ok_or_else(|| LlmError::Config("model API key is required".to_string()))?;

    match config.model_provider {
        ModelProvider::OpenAI => create_backend(
            OpenAIBackendConfig::openai(key, &config.model_id)
                .with_sampling(config.temperature, config.max_tokens),
        ),
        ModelProvider::OpenRouter => create_backend(
            OpenAIBackendConfig::openrouter(key, &config.model_id)
                .with_sampling(config.temperature, config.max_tokens),
        ),
        ModelProvider::Anthropic => {
            let mut anthropic = AnthropicConfig::new(key, &config.model_id);
            anthropic.max_tokens = u32::from(config.max_tokens);
            anthropic.temperature = config.temperature;
            create_anthropic_backend(anthropic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn anthropic_at(server: &MockServer) -> AnthropicBackend {
        let mut config = AnthropicConfig::new("sk-ant-test", "claude-3-5-sonnet-20241022");
        config.base_url = server.uri();
        AnthropicBackend::new(config).unwrap()
    }

    #[test]
    fn test_backend_for_requires_key() {
        let config = ResearchConfig::new("rust");
        assert!(matches!(backend_for(&config), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_backend_for_providers() {
        let config = ResearchConfig::new("rust")
            .with_model(ModelProvider::Anthropic, "claude-3-5-haiku-20241022")
            .with_model_key(Some("sk-ant".into()));
        let backend = backend_for(&config).unwrap();
        assert_eq!(backend.model_name(), "claude-3-5-haiku-20241022");

        let config = config.with_model(ModelProvider::OpenRouter, "openai/gpt-4o");
        assert_eq!(backend_for(&config).unwrap().model_name(), "openai/gpt-4o");
    }

    #[tokio::test]
    async fn test_anthropic_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "text", "text": "world"}
                ]
            })))
            .mount(&server)
            .await;

        let text = anthropic_at(&server).generate("sys", "user").await.unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_anthropic_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let err = anthropic_at(&server).generate("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": []})))
            .mount(&server)
            .await;
        let err = anthropic_at(&server).generate("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
