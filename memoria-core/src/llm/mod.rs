use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;

/// One item of a streamed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Next piece of response text, in emission order
    Fragment(String),
    /// End of the response; delivered once, after the last fragment
    End,
}

/// Stream of response events from the model service
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Trait for model service implementations.
///
/// The service takes fully formatted prompt text (see
/// [`crate::prompt::PromptBuilder`]) and either answers in one piece or
/// streams the answer back fragment by fragment.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Synchronous round-trip used for summarization.
    ///
    /// Returns the full response text, or an empty string when the service
    /// cannot be reached or answers with a failure status.
    async fn request(&self, prompt: &str) -> String;

    /// Start a streamed completion.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request cannot be dispatched.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

pub mod providers;
pub mod retry;
mod scripted;

pub use providers::OllamaService;
pub use retry::{RetryConfig, with_retry};
pub use scripted::ScriptedService;
