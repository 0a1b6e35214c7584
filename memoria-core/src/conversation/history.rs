//! Turn log: the ordered, speaker-tagged conversation history

use serde::{Deserialize, Serialize};

use super::window::count_tokens;

/// Tag that opens every user turn
pub const USER_TAG: &str = "User: ";

/// Tag that opens every AI turn
pub const AI_TAG: &str = "AI: ";

/// The empty AI turn emitted before the first streamed fragment arrives
pub const AI_PLACEHOLDER: &str = AI_TAG;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

impl Speaker {
    /// The tag this speaker's turns begin with
    pub fn tag(self) -> &'static str {
        match self {
            Speaker::User => USER_TAG,
            Speaker::Ai => AI_TAG,
        }
    }

    /// Detect the speaker tag a piece of text begins with, if any
    pub fn of(text: &str) -> Option<Speaker> {
        if text.starts_with(USER_TAG) {
            Some(Speaker::User)
        } else if text.starts_with(AI_TAG) {
            Some(Speaker::Ai)
        } else {
            None
        }
    }
}

/// A single speaker-tagged unit of conversation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Turn(String);

impl Turn {
    /// Create a user turn
    pub fn user(content: impl AsRef<str>) -> Self {
        Self(format!("{}{}", USER_TAG, content.as_ref()))
    }

    /// Create an AI turn
    pub fn ai(content: impl AsRef<str>) -> Self {
        Self(format!("{}{}", AI_TAG, content.as_ref()))
    }

    /// Create the empty AI placeholder turn
    pub fn placeholder() -> Self {
        Self(AI_PLACEHOLDER.to_string())
    }

    /// Wrap already-tagged text verbatim (used when restoring a saved log)
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Full turn text, tag included
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Speaker of this turn
    pub fn speaker(&self) -> Option<Speaker> {
        Speaker::of(&self.0)
    }

    /// Turn text with the speaker tag removed
    pub fn content(&self) -> &str {
        match self.speaker() {
            Some(speaker) => &self.0[speaker.tag().len()..],
            None => &self.0,
        }
    }

    /// Whether this is the empty AI placeholder
    pub fn is_placeholder(&self) -> bool {
        self.0 == AI_PLACEHOLDER
    }

    /// Whitespace-delimited word count of the full text
    pub fn token_count(&self) -> usize {
        count_tokens(&self.0)
    }

    fn push_str(&mut self, fragment: &str) {
        self.0.push_str(fragment);
    }

    pub fn into_text(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Turn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What [`TurnLog::append`] did with a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Concatenated onto the in-progress AI turn
    Merged,
    /// Stored as a new turn
    Appended,
}

/// Ordered turn history for one session.
///
/// Insertion order is conversational order. Streaming produces one AI turn
/// split across many fragments, so an untagged fragment that follows an AI
/// turn is concatenated onto it instead of becoming a turn of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append text, merging streaming continuations into the current AI turn.
    ///
    /// A `User: ` turn always starts a new turn. Anything else lands on the
    /// empty AI placeholder if that is the last turn (an `AI: ` tag on the
    /// fragment is dropped so the turn keeps a single tag). An untagged
    /// fragment following a non-empty AI turn is concatenated onto it. All
    /// other text becomes a new turn; untagged text with no AI turn to
    /// continue is stored as an AI turn.
    pub fn append(&mut self, text: impl Into<String>) -> AppendOutcome {
        let text = text.into();
        let speaker = Speaker::of(&text);

        if speaker != Some(Speaker::User) {
            if let Some(last) = self.turns.last_mut() {
                if last.is_placeholder() {
                    let fragment = text.strip_prefix(AI_TAG).unwrap_or(&text);
                    last.push_str(fragment);
                    return AppendOutcome::Merged;
                }
                if speaker.is_none() && last.speaker() == Some(Speaker::Ai) {
                    last.push_str(&text);
                    return AppendOutcome::Merged;
                }
            }
        }

        let turn = match speaker {
            Some(_) => Turn::from_text(text),
            None => Turn::ai(text),
        };
        self.turns.push(turn);
        AppendOutcome::Appended
    }

    /// Remove every turn
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Drop the last turn if it is an empty AI placeholder.
    ///
    /// Returns whether a turn was removed.
    pub fn discard_placeholder(&mut self) -> bool {
        if self.turns.last().is_some_and(Turn::is_placeholder) {
            self.turns.pop();
            return true;
        }
        false
    }

    /// Copy of the turns as plain text, in order
    pub fn snapshot(&self) -> Vec<String> {
        self.turns.iter().map(|t| t.text().to_string()).collect()
    }

    /// Replace the whole log with previously saved turns
    pub fn restore<I, S>(&mut self, turns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.turns = turns.into_iter().map(Turn::from_text).collect();
    }

    /// All turns
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Last turn, if any
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turn count
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total word count over every turn
    pub fn token_count(&self) -> usize {
        self.turns.iter().map(Turn::token_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_tags() {
        let turn = Turn::user("hello");
        assert_eq!(turn.text(), "User: hello");
        assert_eq!(turn.speaker(), Some(Speaker::User));
        assert_eq!(turn.content(), "hello");

        let turn = Turn::ai("hi there");
        assert_eq!(turn.speaker(), Some(Speaker::Ai));
        assert_eq!(turn.content(), "hi there");
        assert!(!turn.is_placeholder());
        assert!(Turn::placeholder().is_placeholder());
    }

    #[test]
    fn test_stream_fragments_merge_into_placeholder() {
        let mut log = TurnLog::new();
        log.append("User: tell me a joke");
        log.append(AI_PLACEHOLDER);
        assert_eq!(log.len(), 2);

        assert_eq!(log.append("Why did"), AppendOutcome::Merged);
        assert_eq!(log.append(" the chicken"), AppendOutcome::Merged);
        assert_eq!(log.append(" cross?"), AppendOutcome::Merged);

        assert_eq!(log.len(), 2);
        assert_eq!(log.turns()[1].text(), "AI: Why did the chicken cross?");
    }

    #[test]
    fn test_tagged_fragment_fills_placeholder_once() {
        let mut log = TurnLog::new();
        log.append(AI_PLACEHOLDER);
        assert_eq!(log.append("AI: hello"), AppendOutcome::Merged);
        assert_eq!(log.turns()[0].text(), "AI: hello");
    }

    #[test]
    fn test_tagged_ai_text_after_ai_turn_is_new_turn() {
        let mut log = TurnLog::new();
        log.append("AI: first");
        assert_eq!(log.append("AI: second"), AppendOutcome::Appended);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_user_turn_always_appends() {
        let mut log = TurnLog::new();
        log.append(AI_PLACEHOLDER);
        assert_eq!(log.append("User: hi"), AppendOutcome::Appended);
        log.append("AI: answer");
        assert_eq!(log.append("User: again"), AppendOutcome::Appended);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_orphan_fragment_becomes_ai_turn() {
        let mut log = TurnLog::new();
        log.append("User: hi");
        assert_eq!(log.append("stray"), AppendOutcome::Appended);
        assert_eq!(log.turns()[1].text(), "AI: stray");
    }

    #[test]
    fn test_snapshot_restore_reset() {
        let mut log = TurnLog::new();
        log.append("User: hi");
        log.append("AI: hello there");
        let saved = log.snapshot();
        assert_eq!(saved, vec!["User: hi", "AI: hello there"]);

        let mut other = TurnLog::new();
        other.append("User: unrelated");
        other.restore(saved.clone());
        assert_eq!(other.snapshot(), saved);
        assert_eq!(other.token_count(), 5);

        other.reset();
        assert!(other.is_empty());
    }

    #[test]
    fn test_discard_placeholder() {
        let mut log = TurnLog::new();
        log.append("User: hi");
        log.append(AI_PLACEHOLDER);
        assert!(log.discard_placeholder());
        assert_eq!(log.snapshot(), vec!["User: hi"]);

        // Only an empty trailing AI turn is removed
        assert!(!log.discard_placeholder());
        log.append("AI: hello");
        assert!(!log.discard_placeholder());
        assert_eq!(log.len(), 2);
    }
}
