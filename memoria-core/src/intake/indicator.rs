//! Activity indicator: a rotating glyph shown while a response is pending

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::IndicatorConfig;
use crate::display::DisplaySink;

/// Moves the cursor back over the glyph just drawn
const BACKSPACE: char = '\u{8}';

/// Periodic "waiting" animation.
///
/// Each frame is a glyph followed by a backspace, so the glyph sits in place
/// after whatever text precedes it. The last frame is erased when the
/// indicator stops.
#[derive(Debug, Clone)]
pub struct ActivityIndicator {
    frames: Vec<char>,
    interval: Duration,
}

impl ActivityIndicator {
    /// Create an indicator cycling through `frames`
    pub fn new(frames: &str, interval: Duration) -> Self {
        let mut frames: Vec<char> = frames.chars().collect();
        if frames.is_empty() {
            frames.push('.');
        }
        Self { frames, interval }
    }

    pub fn from_config(config: &IndicatorConfig) -> Self {
        Self::new(&config.frames, config.interval)
    }

    /// Frame text for tick `n`
    pub fn frame(&self, tick: usize) -> String {
        format!("{}{}", self.frames[tick % self.frames.len()], BACKSPACE)
    }

    /// Text that erases a drawn frame
    pub fn erase_sequence() -> String {
        format!(" {}", BACKSPACE)
    }

    /// Start animating on `sink` until the returned handle is stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, sink: Arc<dyn DisplaySink>) -> IndicatorHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let indicator = self.clone();

        let task = tokio::spawn(async move {
            let mut tick = 0;
            while !task_token.is_cancelled() {
                sink.show(&indicator.frame(tick));
                tick += 1;

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(indicator.interval) => {}
                }
            }
            if tick > 0 {
                sink.show(&ActivityIndicator::erase_sequence());
            }
            debug!(frames = tick, "Activity indicator stopped");
        });

        IndicatorHandle {
            token,
            task: Some(task),
        }
    }
}

/// Stop handle for a running indicator
#[derive(Debug)]
pub struct IndicatorHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl IndicatorHandle {
    /// Request a stop and wait for the animation task to finish.
    ///
    /// Returns only after the task has drawn its last frame and erased it,
    /// so nothing from the indicator can appear after this call. Calling it
    /// again is a no-op.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "Activity indicator task ended abnormally");
            }
        }
    }

    /// Whether `stop` has not completed yet
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for IndicatorHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
