//! Memory Policies
//!
//! A memory policy owns the turn log for the active session and derives the
//! bounded context fed into the next prompt.
//!
//! - [`BufferPolicy`]: sliding window of the most recent turns that fit the
//!   token budget
//! - [`SummaryPolicy`]: a single LLM-produced summary, refreshed after every
//!   response
//!
//! The variant is chosen once, from configuration, when the session
//! controller is built (see [`MemoryKind`] and [`build_policy`]).

mod buffer;
mod summary;

pub use buffer::BufferPolicy;
pub use summary::SummaryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::conversation::TurnLog;
use crate::error::{MemoriaError, Result};

/// Turns a block of conversation text into a short synthesis.
///
/// Implementations round-trip through the model service and return an empty
/// string when the service fails.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, raw_text: &str) -> String;
}

/// Strategy producing bounded context from the turn log
#[async_trait]
pub trait MemoryPolicy: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> MemoryKind;

    /// Turn log for the current session
    fn log(&self) -> &TurnLog;

    /// Mutable turn log, used by response intake to append fragments
    fn log_mut(&mut self) -> &mut TurnLog;

    /// Context as an ordered list
    fn context(&self, max_tokens: usize) -> Vec<String>;

    /// Context as a single string ready for prompt embedding
    fn context_string(&self, max_tokens: usize) -> String;

    /// Restore context from a saved snapshot
    async fn set_context(&mut self, context: Vec<String>);

    /// Called once after every complete response
    async fn on_end_of_response(&mut self);

    /// Clear the turn log and any derived state
    fn reset(&mut self);
}

/// Memory policy identifiers accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Buffer,
    Summary,
}

impl MemoryKind {
    /// Configuration id of this variant
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Buffer => "buffer",
            MemoryKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = MemoriaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buffer" => Ok(MemoryKind::Buffer),
            "summary" => Ok(MemoryKind::Summary),
            other => Err(MemoriaError::Configuration(format!(
                "Unknown memory type: {}",
                other
            ))),
        }
    }
}

/// Build the memory policy named by `memory_id`.
///
/// # Errors
///
/// Returns a configuration error for an unknown id.
pub fn build_policy(
    memory_id: &str,
    summarizer: Arc<dyn Summarizer>,
    max_total_tokens: usize,
) -> Result<Box<dyn MemoryPolicy>> {
    let policy: Box<dyn MemoryPolicy> = match memory_id.parse::<MemoryKind>()? {
        MemoryKind::Buffer => Box::new(BufferPolicy::new()),
        MemoryKind::Summary => Box::new(SummaryPolicy::new(summarizer, max_total_tokens)),
    };
    Ok(policy)
}
