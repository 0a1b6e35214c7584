//! Sliding token-window memory

use async_trait::async_trait;

use crate::conversation::{TurnLog, join_window, recent_window};

use super::{MemoryKind, MemoryPolicy};

/// Keeps the most recent turns that fit the budget.
///
/// Context is derived purely from the log, so there is no separate state to
/// restore or refresh.
#[derive(Debug, Clone, Default)]
pub struct BufferPolicy {
    log: TurnLog,
}

impl BufferPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryPolicy for BufferPolicy {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Buffer
    }

    fn log(&self) -> &TurnLog {
        &self.log
    }

    fn log_mut(&mut self) -> &mut TurnLog {
        &mut self.log
    }

    fn context(&self, max_tokens: usize) -> Vec<String> {
        recent_window(self.log.turns(), max_tokens)
    }

    fn context_string(&self, max_tokens: usize) -> String {
        join_window(&self.context(max_tokens))
    }

    async fn set_context(&mut self, _context: Vec<String>) {}

    async fn on_end_of_response(&mut self) {}

    fn reset(&mut self) {
        self.log.reset();
    }
}
