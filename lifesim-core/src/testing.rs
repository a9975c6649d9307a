//! Scripted provider for unit tests

use lifesim_provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError, Usage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Answers every request through a closure over the last user message
pub struct MockProvider {
    responder: Responder,
    calls: Mutex<Vec<CompletionRequest>>,
    count: AtomicUsize,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(responder: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn fixed(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| {
            Err(ProviderError::Api {
                status: 500,
                message: "internal error".into(),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// User prompts in call order
    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-default"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let model = request.model.clone().unwrap_or_else(|| self.default_model().to_string());
        self.calls.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = (self.responder)(&prompt)?;
        Ok(CompletionResponse {
            id: format!("mock-{}", self.call_count()),
            model,
            content: Some(content),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }
}
