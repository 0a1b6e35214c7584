//! Prompt Builders
//!
//! Each model family expects its own tag convention around the system
//! instruction, the conversation context and the new user turn. A builder is
//! a pure function of its inputs and the system instruction bound at
//! construction.

mod templates;

pub use templates::{
    AlpacaPrompt, ChatMlPrompt, DefaultPrompt, Llama2Prompt, MistralPrompt, ZephyrPrompt,
};

use std::sync::Arc;

use crate::error::{MemoriaError, Result};

/// Instruction given to the model when it is asked to condense a conversation
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation between a user \
and an AI assistant in a few sentences. Keep names, facts, decisions and open questions. \
Reply with the summary only.";

/// Formats prompts for one model family
pub trait PromptBuilder: Send + Sync {
    /// Variant id, as accepted by [`PromptBuilderFactory::create`]
    fn name(&self) -> &'static str;

    /// System instruction bound at construction
    fn system_instruction(&self) -> &str;

    /// Prompt sent for a new user turn
    fn build_prompt(&self, user_input: &str, context: &str) -> String;

    /// Prompt asking the model to summarize `raw_text`
    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!("{}\n\n{}\n\nSummary:", SUMMARY_INSTRUCTION, raw_text)
    }
}

/// Factory for creating prompt builders from a model id
pub struct PromptBuilderFactory;

impl PromptBuilderFactory {
    /// Ids accepted by [`create`](Self::create)
    pub const MODELS: &'static [&'static str] =
        &["default", "llama2", "mistral", "chatml", "zephyr", "alpaca"];

    /// Create the builder for `model_id`.
    ///
    /// A `:tag` suffix (as in `llama2:13b`) is ignored. `system_prompt`
    /// overrides the variant's built-in instruction.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown model id.
    pub fn create(model_id: &str, system_prompt: Option<&str>) -> Result<Arc<dyn PromptBuilder>> {
        let family = model_id
            .split(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let builder: Arc<dyn PromptBuilder> = match family.as_str() {
            "default" => Arc::new(DefaultPrompt::new(system_prompt)),
            "llama2" => Arc::new(Llama2Prompt::new(system_prompt)),
            "mistral" => Arc::new(MistralPrompt::new(system_prompt)),
            "chatml" => Arc::new(ChatMlPrompt::new(system_prompt)),
            "zephyr" => Arc::new(ZephyrPrompt::new(system_prompt)),
            "alpaca" => Arc::new(AlpacaPrompt::new(system_prompt)),
            _ => {
                return Err(MemoriaError::Configuration(format!(
                    "Unknown model: {} (expected one of {})",
                    model_id,
                    Self::MODELS.join(", ")
                )));
            }
        };

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_known_models() {
        for model in PromptBuilderFactory::MODELS {
            let builder = PromptBuilderFactory::create(model, None).unwrap();
            assert_eq!(builder.name(), *model);
        }
    }

    #[test]
    fn test_factory_strips_tag_suffix() {
        let builder = PromptBuilderFactory::create("llama2:13b-chat", None).unwrap();
        assert_eq!(builder.name(), "llama2");
    }

    #[test]
    fn test_factory_unknown_model() {
        let err = PromptBuilderFactory::create("gpt-17", None).err().unwrap();
        assert!(matches!(err, MemoriaError::Configuration(_)));
    }

    #[test]
    fn test_system_prompt_override() {
        let builder = PromptBuilderFactory::create("zephyr", Some("Be terse.")).unwrap();
        assert_eq!(builder.system_instruction(), "Be terse.");
        assert!(builder.build_prompt("hi", "").contains("Be terse."));
    }
}
