//! Response Intake
//!
//! Receives streamed response fragments, appends them to the turn log and
//! forwards them to the display. The activity indicator is stopped (and its
//! task joined) before the first fragment is shown, so indicator frames never
//! interleave with response text.
//!
//! State machine:
//!
//! ```text
//! Idle --begin--> Waiting --first fragment--> Streaming --finish--> Idle
//!                    \__________________finish________________/
//! ```

mod indicator;

pub use indicator::{ActivityIndicator, IndicatorHandle};

use std::sync::Arc;
use tracing::debug;

use crate::conversation::{AI_PLACEHOLDER, TurnLog};
use crate::display::DisplaySink;
use crate::memory::MemoryPolicy;

/// Where the intake is in the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeState {
    /// No request outstanding
    Idle,
    /// Request dispatched, indicator running, nothing received yet
    Waiting,
    /// At least one fragment received
    Streaming,
}

/// Couples fragment display with indicator shutdown
pub struct ResponseIntake {
    display: Arc<dyn DisplaySink>,
    indicator: ActivityIndicator,
    running: Option<IndicatorHandle>,
    state: IntakeState,
    fragments: usize,
}

impl ResponseIntake {
    pub fn new(display: Arc<dyn DisplaySink>, indicator: ActivityIndicator) -> Self {
        Self {
            display,
            indicator,
            running: None,
            state: IntakeState::Idle,
            fragments: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> IntakeState {
        self.state
    }

    /// Display sink fragments are forwarded to
    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    /// Open a new AI turn and start the indicator (`Idle -> Waiting`).
    ///
    /// The empty `AI: ` placeholder is appended to the log and shown, so the
    /// fragments that follow merge into it.
    pub async fn begin(&mut self, log: &mut TurnLog) {
        // A previous exchange that never finished must not leave its indicator behind
        self.stop_indicator().await;

        log.append(AI_PLACEHOLDER);
        self.display.show(AI_PLACEHOLDER);
        self.running = Some(self.indicator.start(Arc::clone(&self.display)));
        self.state = IntakeState::Waiting;
        self.fragments = 0;
    }

    /// Accept one streamed fragment.
    ///
    /// The first fragment of an exchange stops the indicator before anything
    /// is shown (`Waiting -> Streaming`).
    pub async fn accept(&mut self, fragment: &str, log: &mut TurnLog) {
        if self.state == IntakeState::Waiting {
            self.stop_indicator().await;
            self.state = IntakeState::Streaming;
        }

        log.append(fragment);
        self.display.show(fragment);
        self.fragments += 1;
    }

    /// Handle the end-of-stream sentinel (`-> Idle`).
    ///
    /// Ends the displayed line and notifies the memory policy, which may
    /// summarize before this returns.
    pub async fn finish(&mut self, memory: &mut dyn MemoryPolicy) {
        self.stop_indicator().await;
        self.display.show("\n");
        self.state = IntakeState::Idle;
        debug!(fragments = self.fragments, "Response complete");

        memory.on_end_of_response().await;
    }

    /// Show a failure as one `Error: ...` message, indicator stopped first.
    ///
    /// The state is left alone; follow with [`finish`](Self::finish) or
    /// [`abort`](Self::abort).
    pub async fn fail(&mut self, message: &str) {
        self.stop_indicator().await;
        self.display.show(&format!("Error: {}", message));
    }

    /// Abandon the exchange without notifying the memory policy (`-> Idle`).
    ///
    /// When nothing was received, the placeholder opened by
    /// [`begin`](Self::begin) is removed from the log.
    pub async fn abort(&mut self, log: &mut TurnLog) {
        self.stop_indicator().await;
        if self.state == IntakeState::Waiting {
            log.discard_placeholder();
        }
        if self.state != IntakeState::Idle {
            self.display.show("\n");
        }
        self.state = IntakeState::Idle;
    }

    async fn stop_indicator(&mut self) {
        if let Some(mut handle) = self.running.take() {
            handle.stop().await;
        }
    }
}
