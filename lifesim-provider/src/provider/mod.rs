//! # Text Generation Providers
//!
//! A trait-based abstraction over the LLM backends the simulator talks to.
//!
//! ## Design
//! - `LlmProvider` trait defines the single `complete` call the core needs
//! - Implementations for OpenAI-compatible APIs, Anthropic and Gemini
//! - `AnyProvider` dispatches to whichever backend was configured at startup
//! - Sampling options (temperature, top_p, token limit, response format) travel
//!   with each request, so callers decide them instead of the adapter

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;

use lifesim_error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Shape the model is asked to answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<usize>,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// The system prompt, if any message carries one
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Total characters across all messages, used for logging
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl CompletionResponse {
    /// Text of the reply, or an error when the model returned nothing
    pub fn into_text(self) -> std::result::Result<String, ProviderError> {
        match self.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ProviderError::Other(format!(
                "no content in response (finish reason: {:?})",
                self.finish_reason
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Errors
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// The HTTP client gave up waiting
    Timeout,
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Invalid request
    InvalidRequest(String),
    /// Model not found
    ModelNotFound(String),
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            Self::ModelNotFound(m) => write!(f, "Model not found: {}", m),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed,
            404 => Self::ModelNotFound(message),
            429 => Self::RateLimited { retry_after },
            400 | 422 => Self::InvalidRequest(message),
            _ => Self::Api { status, message },
        }
    }

    /// Classify a transport failure from reqwest
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Convert into the workspace error, keeping this error as the source.
    ///
    /// Every variant becomes one of the collaborator kinds: a malformed
    /// provider response is the provider's failure, not a parse failure of
    /// model output.
    pub fn into_error(self, provider: &str) -> Error {
        let kind = match &self {
            Self::Network(_) => ErrorKind::NetworkFailed,
            Self::Timeout => ErrorKind::CollaboratorTimeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::Api { .. }
            | Self::Parse(_)
            | Self::InvalidRequest(_)
            | Self::ModelNotFound(_)
            | Self::Other(_) => ErrorKind::CollaboratorFailed,
        };

        let mut err = Error::new(kind, self.to_string()).with_context("provider", provider);
        if let Self::Api { status, .. } = &self {
            err = err.with_context("status", status.to_string());
        }
        err.set_source(self)
    }
}

/// Read a `Retry-After` header as whole seconds
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Build the shared HTTP client for an adapter
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| {
            Error::config_invalid(format!("failed to create HTTP client: {}", e))
                .with_operation("provider::http_client")
                .set_source(e)
        })
}

// ============================================================================
// Provider Trait
// ============================================================================

/// The text generation collaborator
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "gemini")
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;
}

impl<P: LlmProvider> LlmProvider for &P {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        (**self).complete(request).await
    }
}

impl<P: LlmProvider> LlmProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        (**self).complete(request).await
    }
}

/// Whichever backend the configuration selected
pub enum AnyProvider {
    OpenAI(OpenAIProvider),
    Anthropic(AnthropicProvider),
    Gemini(GeminiProvider),
}

impl AnyProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(match config.provider_type {
            ProviderType::OpenAI | ProviderType::Local => Self::OpenAI(OpenAIProvider::new(config)?),
            ProviderType::Anthropic => Self::Anthropic(AnthropicProvider::new(config)?),
            ProviderType::Gemini => Self::Gemini(GeminiProvider::new(config)?),
        })
    }
}

impl LlmProvider for AnyProvider {
    fn name(&self) -> &str {
        match self {
            Self::OpenAI(p) => p.name(),
            Self::Anthropic(p) => p.name(),
            Self::Gemini(p) => p.name(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            Self::OpenAI(p) => p.default_model(),
            Self::Anthropic(p) => p.default_model(),
            Self::Gemini(p) => p.default_model(),
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        match self {
            Self::OpenAI(p) => p.complete(request).await,
            Self::Anthropic(p) => p.complete(request).await,
            Self::Gemini(p) => p.complete(request).await,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    Gemini,
    Local,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Gemini => "gemini",
            ProviderType::Local => "local",
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "gemini" => Ok(ProviderType::Gemini),
            "local" => Ok(ProviderType::Local),
            other => Err(Error::config_invalid(format!("unknown provider '{}'", other))
                .with_context("provider", other)),
        }
    }
}

/// Base URL override shared by every provider
pub const BASE_URL_ENV: &str = "LIFESIM_BASE_URL";
/// Model override shared by every provider
pub const MODEL_ENV: &str = "LIFESIM_MODEL";

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("anthropic-version".into(), "2023-06-01".into());

        Self {
            provider_type: ProviderType::Anthropic,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.anthropic.com/v1".into()),
            default_model: Some("claude-sonnet-4-20250514".into()),
            headers,
            timeout_secs: Some(120),
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Gemini,
            api_key: Some(api_key.into()),
            base_url: Some("https://generativelanguage.googleapis.com/v1beta".into()),
            default_model: Some("gemini-1.5-pro-002".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    /// Any OpenAI-compatible server that needs no key (Ollama, vLLM)
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    /// Build a config from the process environment.
    ///
    /// Fails with `ConfigInvalid` when the provider's key variable is unset,
    /// so a misconfigured run stops before any simulation step.
    pub fn from_env(provider_type: ProviderType) -> Result<Self> {
        Self::from_lookup(provider_type, |var| std::env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup(
        provider_type: ProviderType,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let key = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::missing_env(var).with_operation("provider::from_env"))
        };

        let mut config = match provider_type {
            ProviderType::OpenAI => Self::openai(key("OPENAI_API_KEY")?),
            ProviderType::Anthropic => Self::anthropic(key("ANTHROPIC_API_KEY")?),
            ProviderType::Gemini => Self::gemini(key("GEMINI_API_KEY")?),
            ProviderType::Local => {
                let base_url = key(BASE_URL_ENV)?;
                let model = key(MODEL_ENV)?;
                return Ok(Self::local(base_url, model));
            }
        };

        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.base_url = Some(base_url);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            config.default_model = Some(model);
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are helpful");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are helpful");

        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("Hello"),
        ])
        .with_model("gemini-1.5-pro-002")
        .with_temperature(0.3)
        .with_top_p(0.95)
        .with_max_tokens(512)
        .with_response_format(ResponseFormat::Json);

        assert_eq!(request.model.as_deref(), Some("gemini-1.5-pro-002"));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.top_p, Some(0.95));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.system_prompt(), Some("be brief"));
        assert_eq!(request.prompt_chars(), 13);
    }

    #[test]
    fn test_empty_response_is_an_error() {
        let response = CompletionResponse {
            id: "r1".into(),
            model: "m".into(),
            content: Some("   ".into()),
            finish_reason: FinishReason::Length,
            usage: Usage::default(),
        };
        assert!(response.into_text().is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, String::new(), Some(3)),
            ProviderError::RateLimited { retry_after: Some(3) }
        ));
        assert!(matches!(
            ProviderError::from_status(401, String::new(), None),
            ProviderError::AuthenticationFailed
        ));
        assert!(matches!(
            ProviderError::from_status(500, "boom".into(), None),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_into_error_kinds() {
        let err = ProviderError::RateLimited { retry_after: None }.into_error("openai");
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.context_value("provider"), Some("openai"));

        let err = ProviderError::Api { status: 503, message: "down".into() }.into_error("gemini");
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailed);
        assert_eq!(err.context_value("status"), Some("503"));
        assert!(err.source_ref().is_some());

        let err = ProviderError::Parse("bad json".into()).into_error("anthropic");
        assert!(err.kind().is_collaborator());

        let err = ProviderError::Timeout.into_error("openai");
        assert_eq!(err.kind(), ErrorKind::CollaboratorTimeout);
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::openai("sk-test");
        assert_eq!(config.provider_type, ProviderType::OpenAI);
        assert_eq!(config.default_model, Some("gpt-4o".into()));

        let config = ProviderConfig::anthropic("sk-ant-test");
        assert_eq!(config.provider_type, ProviderType::Anthropic);
        assert!(config.headers.contains_key("anthropic-version"));

        let config = ProviderConfig::gemini("g-test").with_timeout(30);
        assert_eq!(config.default_model.as_deref(), Some("gemini-1.5-pro-002"));
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_from_lookup_missing_key_fails_fast() {
        let err = ProviderConfig::from_lookup(ProviderType::Gemini, |_| None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.context_value("env"), Some("GEMINI_API_KEY"));
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = ProviderConfig::from_lookup(ProviderType::OpenAI, |var| match var {
            "OPENAI_API_KEY" => Some("sk-env".into()),
            MODEL_ENV => Some("gpt-4o-mini".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.default_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.base_url.as_deref(), Some("https://api.openai.com/v1"));
    }

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!("Gemini".parse::<ProviderType>().unwrap(), ProviderType::Gemini);
        assert!("mistral".parse::<ProviderType>().is_err());
    }
}
