//! Session lifecycle and persistence
//!
//! - [`SessionController`]: start, end, resume and the per-input exchange
//! - [`SessionStore`]: where ended sessions go ([`FileSessionStore`],
//!   [`MemorySessionStore`])
//! - [`generate_session_id`] / [`extract_session_id`]: timestamp ids

mod controller;
mod id;
mod store;

pub use controller::{
    LlmSummarizer, REPLAY_USER_LABEL, SessionController, SessionControllerBuilder, SessionState,
};
pub use id::{extract_session_id, generate_session_id};
pub use store::{FileSessionStore, MemorySessionStore, SavedSession, SessionStore};
