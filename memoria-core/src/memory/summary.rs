//! Recursive LLM-summary memory

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::conversation::{TurnLog, history_budget, join_window, recent_window};

use super::{MemoryKind, MemoryPolicy, Summarizer};

/// Holds one summary of the conversation, regenerated after every response.
///
/// [`context`](MemoryPolicy::context) ignores its budget and always returns
/// the full stored summary.
pub struct SummaryPolicy {
    log: TurnLog,
    summary: String,
    summarizer: Arc<dyn Summarizer>,
    max_total_tokens: usize,
}

impl SummaryPolicy {
    /// Create a summary policy with an empty summary
    pub fn new(summarizer: Arc<dyn Summarizer>, max_total_tokens: usize) -> Self {
        Self {
            log: TurnLog::new(),
            summary: String::new(),
            summarizer,
            max_total_tokens,
        }
    }

    /// Current summary text
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Re-summarize the most recent history that fits the budget.
    ///
    /// Blocks until the summarizer answers; the next prompt has no usable
    /// context until it does. An empty window clears the summary.
    pub async fn summarize_now(&mut self) {
        let budget = history_budget(self.max_total_tokens);
        let window = join_window(&recent_window(self.log.turns(), budget));

        if window.is_empty() {
            self.summary.clear();
            return;
        }

        debug!(budget, window_len = window.len(), "Summarizing conversation");
        self.summary = self.summarizer.summarize(&window).await;
        if self.summary.is_empty() {
            warn!("Summarizer returned an empty summary");
        }
    }
}

#[async_trait]
impl MemoryPolicy for SummaryPolicy {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Summary
    }

    fn log(&self) -> &TurnLog {
        &self.log
    }

    fn log_mut(&mut self) -> &mut TurnLog {
        &mut self.log
    }

    fn context(&self, _max_tokens: usize) -> Vec<String> {
        vec![self.summary.clone()]
    }

    fn context_string(&self, _max_tokens: usize) -> String {
        self.summary.clone()
    }

    async fn set_context(&mut self, context: Vec<String>) {
        match context.len() {
            0 => self.summary.clear(),
            1 => self.summary = context.into_iter().next().unwrap_or_default(),
            // More than one entry is an unsummarized window, rebuild from the log
            _ => self.summarize_now().await,
        }
    }

    async fn on_end_of_response(&mut self) {
        self.summarize_now().await;
    }

    fn reset(&mut self) {
        self.log.reset();
        self.summary.clear();
    }
}
