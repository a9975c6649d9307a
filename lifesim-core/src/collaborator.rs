//! Text collaborator wrapper
//!
//! Binds a provider to the sampling options and system instruction of one
//! kind of call, bounds each call by the optional timeout and converts
//! provider failures into workspace errors.

use crate::config::GenerationOptions;
use lifesim_error::{Error, Result};
use lifesim_provider::{ChatMessage, CompletionRequest, LlmProvider};
use std::time::Duration;
use tracing::debug;

pub struct TextCollaborator<P> {
    provider: P,
    options: GenerationOptions,
    system_instruction: String,
    timeout: Option<Duration>,
}

impl<P: LlmProvider> TextCollaborator<P> {
    pub fn new(
        provider: P,
        options: GenerationOptions,
        system_instruction: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            options,
            system_instruction: system_instruction.into(),
            timeout,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    fn model(&self) -> &str {
        self.options
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    fn request(&self, prompt: &str) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !self.system_instruction.is_empty() {
            messages.push(ChatMessage::system(self.system_instruction.as_str()));
        }
        messages.push(ChatMessage::user(prompt));

        CompletionRequest::new(messages)
            .with_model(self.model())
            .with_max_tokens(self.options.max_output_tokens)
            .with_temperature(self.options.temperature)
            .with_top_p(self.options.top_p)
            .with_response_format(self.options.response_format)
    }

    /// Send one prompt and return the reply text.
    ///
    /// `operation` names the calling step in any error.
    pub async fn generate(&self, prompt: &str, operation: &'static str) -> Result<String> {
        let request = self.request(prompt);
        let model = self.model().to_string();
        debug!(
            provider = self.provider.name(),
            model = %model,
            prompt_chars = prompt.len(),
            operation,
            "collaborator call"
        );

        let call = async {
            self.provider
                .complete(request)
                .await
                .and_then(|response| response.into_text())
        };

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(|e| e.into_error(self.provider.name())),
                Err(_) => Err(Error::collaborator_timeout(limit.as_secs_f64())
                    .with_context("provider", self.provider.name())),
            },
            None => call.await.map_err(|e| e.into_error(self.provider.name())),
        };

        let text = outcome
            .map_err(|e| e.with_operation(operation).with_context("model", model.as_str()))?;

        debug!(operation, reply_chars = text.len(), "collaborator reply");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use lifesim_error::ErrorKind;
    use lifesim_provider::{ResponseFormat, Role};

    fn options() -> GenerationOptions {
        GenerationOptions {
            model: Some("mock-large".into()),
            response_format: ResponseFormat::Json,
            ..GenerationOptions::default()
        }
    }

    #[tokio::test]
    async fn test_generate_sends_options_and_system_instruction() {
        let mock = MockProvider::fixed("a reply");
        let collaborator = TextCollaborator::new(&mock, options(), "be helpful", None);

        let reply = collaborator.generate("hello", "test::generate").await.unwrap();
        assert_eq!(reply, "a reply");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        let request = &calls[0];
        assert_eq!(request.model.as_deref(), Some("mock-large"));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.top_p, Some(0.95));
        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_model_falls_back_to_provider_default() {
        let mock = MockProvider::fixed("ok");
        let collaborator = TextCollaborator::new(&mock, GenerationOptions::default(), "", None);
        collaborator.generate("hi", "test::generate").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].model.as_deref(), Some(mock.default_model()));
        assert_eq!(calls[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_collaborator_error() {
        let mock = MockProvider::failing();
        let collaborator = TextCollaborator::new(&mock, options(), "", None);

        let err = collaborator.generate("hi", "test::generate").await.unwrap_err();
        assert!(err.kind().is_collaborator());
        assert_eq!(err.operation(), "test::generate");
        assert_eq!(err.context_value("provider"), Some("mock"));
        assert_eq!(err.context_value("model"), Some("mock-large"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_collaborator_failure() {
        let mock = MockProvider::fixed("   ");
        let collaborator = TextCollaborator::new(&mock, options(), "", None);

        let err = collaborator.generate("hi", "test::generate").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mock = MockProvider::fixed("late").with_delay(Duration::from_secs(10));
        let collaborator =
            TextCollaborator::new(&mock, options(), "", Some(Duration::from_secs(1)));

        let err = collaborator.generate("hi", "test::generate").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorTimeout);
        assert_eq!(err.context_value("timeout_secs"), Some("1.0"));
    }
}
