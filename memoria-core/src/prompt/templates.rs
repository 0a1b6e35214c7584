//! Per-model prompt templates

use super::{PromptBuilder, SUMMARY_INSTRUCTION};

const DEFAULT_SYSTEM: &str = "You are a helpful assistant chatting in a terminal. \
Answer clearly and concisely.";

const LLAMA2_SYSTEM: &str = "You are a helpful, respectful and honest assistant. \
Always answer as helpfully as possible while being safe. If you don't know the answer \
to a question, say so instead of making something up.";

const MISTRAL_SYSTEM: &str = "You are a helpful assistant. Answer truthfully and keep \
replies short unless asked for detail.";

const CHATML_SYSTEM: &str = "You are a helpful assistant. You remember what the user \
told you earlier in this conversation and use it when answering.";

const ZEPHYR_SYSTEM: &str = "You are a friendly chatbot who answers questions \
accurately and briefly.";

const ALPACA_SYSTEM: &str = "Below is an instruction that describes a task, paired \
with the conversation so far. Write a response that appropriately completes the request.";

fn system_or(system_prompt: Option<&str>, fallback: &str) -> String {
    system_prompt.unwrap_or(fallback).to_string()
}

fn context_line(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("\nConversation so far: {}", context)
    }
}

/// Minimal fallback template using plain speaker tags
#[derive(Debug, Clone)]
pub struct DefaultPrompt {
    system: String,
}

impl DefaultPrompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, DEFAULT_SYSTEM),
        }
    }
}

impl PromptBuilder for DefaultPrompt {
    fn name(&self) -> &'static str {
        "default"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        format!(
            "{}{}\n\nUser: {}\nAI:",
            self.system,
            context_line(context),
            user_input
        )
    }
}

/// Llama 2 chat: `[INST]` with a `<<SYS>>` block
#[derive(Debug, Clone)]
pub struct Llama2Prompt {
    system: String,
}

impl Llama2Prompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, LLAMA2_SYSTEM),
        }
    }
}

impl PromptBuilder for Llama2Prompt {
    fn name(&self) -> &'static str {
        "llama2"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        format!(
            "<s>[INST] <<SYS>>\n{}{}\n<</SYS>>\n\n{} [/INST]",
            self.system,
            context_line(context),
            user_input
        )
    }

    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!(
            "<s>[INST] <<SYS>>\n{}\n<</SYS>>\n\n{} [/INST]",
            SUMMARY_INSTRUCTION, raw_text
        )
    }
}

/// Mistral instruct: `[INST]` with the instruction inlined
#[derive(Debug, Clone)]
pub struct MistralPrompt {
    system: String,
}

impl MistralPrompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, MISTRAL_SYSTEM),
        }
    }
}

impl PromptBuilder for MistralPrompt {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        format!(
            "<s>[INST] {}{}\n\n{} [/INST]",
            self.system,
            context_line(context),
            user_input
        )
    }

    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!("<s>[INST] {}\n\n{} [/INST]", SUMMARY_INSTRUCTION, raw_text)
    }
}

/// ChatML: `<|im_start|>role ... <|im_end|>` blocks
#[derive(Debug, Clone)]
pub struct ChatMlPrompt {
    system: String,
}

impl ChatMlPrompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, CHATML_SYSTEM),
        }
    }
}

impl PromptBuilder for ChatMlPrompt {
    fn name(&self) -> &'static str {
        "chatml"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        format!(
            "<|im_start|>system\n{}{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
            self.system,
            context_line(context),
            user_input
        )
    }

    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!(
            "<|im_start|>system\n{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
            SUMMARY_INSTRUCTION, raw_text
        )
    }
}

/// Zephyr: `<|system|>`, `<|user|>`, `<|assistant|>` separated by `</s>`
#[derive(Debug, Clone)]
pub struct ZephyrPrompt {
    system: String,
}

impl ZephyrPrompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, ZEPHYR_SYSTEM),
        }
    }
}

impl PromptBuilder for ZephyrPrompt {
    fn name(&self) -> &'static str {
        "zephyr"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        format!(
            "<|system|>\n{}{}</s>\n<|user|>\n{}</s>\n<|assistant|>\n",
            self.system,
            context_line(context),
            user_input
        )
    }

    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!(
            "<|system|>\n{}</s>\n<|user|>\n{}</s>\n<|assistant|>\n",
            SUMMARY_INSTRUCTION, raw_text
        )
    }
}

/// Alpaca: `### Instruction` / `### Input` / `### Response` sections
#[derive(Debug, Clone)]
pub struct AlpacaPrompt {
    system: String,
}

impl AlpacaPrompt {
    pub fn new(system_prompt: Option<&str>) -> Self {
        Self {
            system: system_or(system_prompt, ALPACA_SYSTEM),
        }
    }
}

impl PromptBuilder for AlpacaPrompt {
    fn name(&self) -> &'static str {
        "alpaca"
    }

    fn system_instruction(&self) -> &str {
        &self.system
    }

    fn build_prompt(&self, user_input: &str, context: &str) -> String {
        let context_section = if context.is_empty() {
            String::new()
        } else {
            format!("### Context:\n{}\n\n", context)
        };
        format!(
            "### Instruction:\n{}\n\n{}### Input:\n{}\n\n### Response:\n",
            self.system, context_section, user_input
        )
    }

    fn build_summarization_prompt(&self, raw_text: &str) -> String {
        format!(
            "### Instruction:\n{}\n\n### Input:\n{}\n\n### Response:\n",
            SUMMARY_INSTRUCTION, raw_text
        )
    }
}
