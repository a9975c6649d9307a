//! # lifesim-provider
//!
//! Thin adapters for the remote services lifesim depends on.
//!
//! ## Collaborators
//! - **Text**: `LlmProvider` trait with OpenAI-compatible, Anthropic and Gemini backends
//! - **Images**: `ImageGenerator` trait with a Replicate backend
//! - **Speech**: `SpeechSynthesizer` trait with a Google Cloud Text-to-Speech backend
//!
//! Every adapter is built from an explicit config value. Nothing here reads
//! ambient state except the `from_env` constructors, which the CLI calls once
//! at startup.

pub mod image;
pub mod provider;
pub mod speech;

pub use image::{ImageGenerator, ImageRequest, ReplicateConfig, ReplicateImageGenerator};
pub use lifesim_error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    AnthropicProvider, AnyProvider, ChatMessage, CompletionRequest, CompletionResponse,
    FinishReason, GeminiProvider, LlmProvider, OpenAIProvider, ProviderConfig, ProviderError,
    ProviderType, ResponseFormat, Role, Usage,
};
pub use speech::{GoogleSpeechSynthesizer, SpeechConfig, SpeechSynthesizer};
