//! Session identifiers
//!
//! A session id is the creation time in milliseconds since the Unix epoch,
//! rendered as decimal digits. Saved identifiers embed it (for example
//! `chat-1700000000000.yaml`), so the id can be recovered from any of them.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicI64, Ordering};

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Generate a new session id.
///
/// Ids are strictly increasing within a process, even when two sessions start
/// in the same millisecond.
pub fn generate_session_id() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_ISSUED.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_ISSUED.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

/// Recover the session id from a saved identifier: the first run of digits
/// in its final path component, so directories never contribute.
///
/// ```
/// use memoria_core::session::extract_session_id;
///
/// assert_eq!(
///     extract_session_id("chat-1700000000000.yaml").as_deref(),
///     Some("1700000000000")
/// );
/// assert_eq!(
///     extract_session_id("/home/user1/sessions/chat-1700000000000.yaml").as_deref(),
///     Some("1700000000000")
/// );
/// assert_eq!(extract_session_id("notes.yaml"), None);
/// ```
pub fn extract_session_id(identifier: &str) -> Option<String> {
    let name = Path::new(identifier)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(identifier);
    DIGITS.find(name).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_saved_identifier() {
        assert_eq!(
            extract_session_id("chat-1700000000000.yaml"),
            Some("1700000000000".to_string())
        );
        assert_eq!(
            extract_session_id("/var/lib/memoria/chat-42.yaml"),
            Some("42".to_string())
        );
        assert_eq!(extract_session_id("1700000000000"), Some("1700000000000".to_string()));
        assert_eq!(extract_session_id("chat-.yaml"), None);
    }

    #[test]
    fn test_extract_ignores_directory_digits() {
        assert_eq!(
            extract_session_id("/home/user1/v2/sessions/chat-1700000000000.yaml"),
            Some("1700000000000".to_string())
        );
        assert_eq!(extract_session_id("backup-2024/notes.yaml"), None);
    }

    #[test]
    fn test_generated_ids_increase() {
        let ids: Vec<i64> = (0..50)
            .map(|_| generate_session_id().parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_generated_id_round_trips() {
        let id = generate_session_id();
        let identifier = format!("chat-{}.yaml", id);
        assert_eq!(extract_session_id(&identifier), Some(id));
    }
}
