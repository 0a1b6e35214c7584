//! Conversation History
//!
//! The turn log shared by every memory policy, plus the word-count token
//! approximation and the most-recent-fit window used to bound context.
//!
//! # Example
//!
//! ```rust
//! use memoria_core::conversation::{recent_window, TurnLog, AI_PLACEHOLDER};
//!
//! let mut log = TurnLog::new();
//! log.append("User: hi");
//! log.append(AI_PLACEHOLDER);
//! log.append("hello there");
//!
//! assert_eq!(log.len(), 2);
//! assert_eq!(recent_window(log.turns(), 10), vec!["User: hi", "AI: hello there"]);
//! ```

mod history;
mod window;

pub use history::{AI_PLACEHOLDER, AI_TAG, AppendOutcome, Speaker, Turn, TurnLog, USER_TAG};
pub use window::{
    CONTEXT_SEPARATOR, SAFETY_MARGIN, count_tokens, history_budget, input_budget, join_window,
    recent_window,
};
