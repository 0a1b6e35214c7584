//! Scripted model service for deterministic, offline runs
//!
//! Replays canned fragment sequences and summaries and records every prompt
//! it receives.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{MemoriaError, Result};
use crate::llm::{FragmentStream, ModelInfo, ModelService, StreamEvent};

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Vec<String>>,
    summaries: VecDeque<String>,
    stream_prompts: Vec<String>,
    request_prompts: Vec<String>,
}

/// In-process model service with predetermined answers.
///
/// Each streamed call consumes the next queued reply (or repeats the default
/// reply once the queue is empty). Each synchronous call consumes the next
/// queued summary (or returns an empty string, like a failed transport).
#[derive(Debug)]
pub struct ScriptedService {
    script: Mutex<Script>,
    default_reply: Vec<String>,
    fragment_delay: Duration,
    first_fragment_delay: Duration,
    fail_stream: bool,
    omit_end: bool,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    /// Create a service whose default reply is a single "ok" fragment
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            default_reply: vec!["ok".to_string()],
            fragment_delay: Duration::ZERO,
            first_fragment_delay: Duration::ZERO,
            fail_stream: false,
            omit_end: false,
        }
    }

    /// Queue a streamed reply
    pub fn with_reply<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .replies
            .push_back(fragments.into_iter().map(Into::into).collect());
        self
    }

    /// Reply used once the queue is exhausted
    pub fn with_default_reply<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_reply = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Queue a synchronous (summary) response
    pub fn with_summary(self, summary: impl Into<String>) -> Self {
        self.lock().summaries.push_back(summary.into());
        self
    }

    /// Delay before every fragment
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// Extra delay before the first fragment, simulating model latency
    pub fn with_first_fragment_delay(mut self, delay: Duration) -> Self {
        self.first_fragment_delay = delay;
        self
    }

    /// Make every streamed call fail at dispatch
    pub fn failing(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    /// Close streams without sending the end sentinel
    pub fn without_end_sentinel(mut self) -> Self {
        self.omit_end = true;
        self
    }

    /// Prompts received by `stream`, in order
    pub fn stream_prompts(&self) -> Vec<String> {
        self.lock().stream_prompts.clone()
    }

    /// Prompts received by `request`, in order
    pub fn request_prompts(&self) -> Vec<String> {
        self.lock().request_prompts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A poisoned script only means a test panicked mid-call
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ModelService for ScriptedService {
    async fn request(&self, prompt: &str) -> String {
        let mut script = self.lock();
        script.request_prompts.push(prompt.to_string());
        script.summaries.pop_front().unwrap_or_default()
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        let fragments = {
            let mut script = self.lock();
            script.stream_prompts.push(prompt.to_string());
            script
                .replies
                .pop_front()
                .unwrap_or_else(|| self.default_reply.clone())
        };

        if self.fail_stream {
            return Err(MemoriaError::Transport(
                "scripted service refused the request".to_string(),
            ));
        }

        let mut events: Vec<(Duration, StreamEvent)> = fragments
            .into_iter()
            .enumerate()
            .map(|(index, fragment)| {
                let delay = if index == 0 {
                    self.first_fragment_delay + self.fragment_delay
                } else {
                    self.fragment_delay
                };
                (delay, StreamEvent::Fragment(fragment))
            })
            .collect();
        if !self.omit_end {
            events.push((Duration::ZERO, StreamEvent::End));
        }

        let stream = futures::stream::iter(events).then(|(delay, event)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, MemoriaError>(event)
        });

        Ok(Box::pin(stream))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "offline".to_string(),
        }
    }
}
