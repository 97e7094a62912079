use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vitrine_core::config::{LlmConfig, LlmProvider};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    fn turns(&self) -> impl Iterator<Item = (Role, &str)> + '_ {
        self.history
            .iter()
            .map(|turn| (turn.role, turn.content.as_str()))
            .chain(std::iter::once((Role::User, self.message.as_str())))
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider returned status {status}")]
    Upstream { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("provider configuration is invalid: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn details(&self) -> String {
        match self {
            Self::Upstream { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Text completion provider. Returns the generated text, possibly empty; the
/// caller decides what an empty completion means.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|err| LlmError::Configuration(format!("failed to build HTTP client: {err}")))?;

    match config.provider {
        LlmProvider::Anthropic => {
            let api_key = required_key(config)?;
            let api_base = config.base_url.clone().unwrap_or_else(|| ANTHROPIC_API_BASE.to_string());
            Ok(Arc::new(AnthropicClient::new(http, api_key, api_base, config.model.clone())))
        }
        LlmProvider::OpenAi => {
            let api_key = required_key(config)?;
            let api_base = config.base_url.clone().unwrap_or_else(|| OPENAI_API_BASE.to_string());
            Ok(Arc::new(OpenAiCompatibleClient::new(
                http,
                "openai",
                Some(api_key),
                chat_completions_url(&api_base),
                config.model.clone(),
            )))
        }
        LlmProvider::Ollama => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| LlmError::Configuration("ollama requires llm.base_url".to_string()))?;
            let api_base = format!("{}/v1", base_url.trim_end_matches('/'));
            Ok(Arc::new(OpenAiCompatibleClient::new(
                http,
                "ollama",
                None,
                chat_completions_url(&api_base),
                config.model.clone(),
            )))
        }
    }
}

fn required_key(config: &LlmConfig) -> Result<SecretString, LlmError> {
    config
        .api_key
        .clone()
        .ok_or_else(|| LlmError::Configuration("llm.api_key is not set".to_string()))
}

fn chat_completions_url(api_base: &str) -> String {
    format!("{}/chat/completions", api_base.trim_end_matches('/'))
}

async fn read_failure(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|_| "<response unavailable>".to_string());
    LlmError::Upstream { status, body }
}

fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Transport(format!("request timed out: {err}"))
    } else {
        LlmError::Transport(err.to_string())
    }
}

pub struct AnthropicClient {
    http: Client,
    api_key: SecretString,
    api_base: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(http: Client, api_key: SecretString, api_base: String, model: String) -> Self {
        Self { http, api_key, api_base, model }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: request.turns().map(|(role, content)| WireMessage { role, content }).collect(),
        };

        let url = format!("{}/messages", self.api_base.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(read_failure(response).await);
        }

        let response: AnthropicResponse =
            response.json().await.map_err(|err| LlmError::Decode(err.to_string()))?;

        // Only the first text block is used; tool and image blocks are ignored.
        Ok(response
            .content
            .into_iter()
            .find_map(|block| if block.kind == "text" { block.text } else { None })
            .unwrap_or_default())
    }
}

/// Client for the `/chat/completions` wire format shared by OpenAI and Ollama.
pub struct OpenAiCompatibleClient {
    http: Client,
    provider: &'static str,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        http: Client,
        provider: &'static str,
        api_key: Option<SecretString>,
        endpoint: String,
        model: String,
    ) -> Self {
        Self { http, provider, api_key, endpoint, model }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut messages = vec![OpenAiMessage { role: "system", content: &request.system }];
        messages.extend(request.turns().map(|(role, content)| OpenAiMessage {
            role: match role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content,
        }));

        let body = OpenAiRequest { model: &self.model, max_tokens: request.max_tokens, messages };

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }
        let response = builder.send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(read_failure(response).await);
        }

        let response: OpenAiResponse =
            response.json().await.map_err(|err| LlmError::Decode(err.to_string()))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
