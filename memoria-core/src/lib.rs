//! # Memoria - Bounded Conversation Memory for a Terminal LLM Client
//!
//! Memoria keeps a chat with a local model coherent across turns while
//! respecting the model's context budget:
//! - Turn log with streaming-aware merging of response fragments
//! - Buffer memory (most recent turns that fit) and summary memory (one
//!   LLM-produced synthesis, refreshed after each response)
//! - Prompt builders for common model families
//! - Session lifecycle with save and resume
//! - Response intake with a waiting indicator that never interleaves with
//!   streamed text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memoria_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MemoriaConfig::load(None)?;
//!     let mut controller = SessionController::builder()
//!         .config(config)
//!         .display(Arc::new(RecordingDisplay::new()))
//!         .build()?;
//!
//!     controller.start().await;
//!     controller.process_input("What is a B-tree?").await;
//!     controller.end().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Conversation**: [`conversation::TurnLog`] and the word-count window
//! - **Memory**: [`memory::MemoryPolicy`], chosen from configuration
//! - **Prompt**: [`prompt::PromptBuilder`] variants per model family
//! - **LLM**: [`llm::ModelService`] with the Ollama transport
//! - **Session**: [`session::SessionController`] and session stores
//! - **Intake**: [`intake::ResponseIntake`] and the activity indicator

pub mod config;
pub mod conversation;
pub mod display;
pub mod error;
pub mod intake;
pub mod llm;
pub mod memory;
pub mod prompt;
pub mod session;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{IndicatorConfig, LLMProviderConfig, MemoriaConfig, StorageConfig};
    pub use crate::conversation::{Speaker, Turn, TurnLog, count_tokens, recent_window};
    pub use crate::display::{DisplaySink, RecordingDisplay};
    pub use crate::error::{MemoriaError, Result};
    pub use crate::intake::{ActivityIndicator, IntakeState, ResponseIntake};
    pub use crate::llm::{
        FragmentStream, ModelService, OllamaService, RetryConfig, ScriptedService, StreamEvent,
    };
    pub use crate::memory::{
        BufferPolicy, MemoryKind, MemoryPolicy, Summarizer, SummaryPolicy, build_policy,
    };
    pub use crate::prompt::{PromptBuilder, PromptBuilderFactory};
    pub use crate::session::{
        FileSessionStore, MemorySessionStore, SavedSession, SessionController,
        SessionControllerBuilder, SessionState, SessionStore, extract_session_id,
    };
}
