//! Display sink: where streamed text, replayed history and errors are shown

use std::sync::Mutex;

/// Single-message sink. Text is appended verbatim; no line semantics are
/// assumed.
pub trait DisplaySink: Send + Sync {
    fn show(&self, text: &str);
}

/// Sink that records every message, for tests and transcripts
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    messages: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message shown so far, in order
    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// All messages concatenated, as a terminal would render them
    pub fn transcript(&self) -> String {
        self.lock().concat()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&self, text: &str) {
        self.lock().push(text.to_string());
    }
}
