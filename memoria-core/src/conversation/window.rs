//! Token counting and the most-recent-fit history window

use super::history::Turn;

/// Tokens reserved for formatting and speaker-tag overhead in every budget
pub const SAFETY_MARGIN: usize = 30;

/// Separator used when a context window is embedded in a prompt
pub const CONTEXT_SEPARATOR: &str = ", ";

/// Approximate token count: the number of whitespace-delimited words.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Budget left for history once the safety margin is reserved
pub fn history_budget(max_total_tokens: usize) -> usize {
    max_total_tokens.saturating_sub(SAFETY_MARGIN)
}

/// Budget left for history alongside a given user input.
///
/// Clamps at zero when the input alone exceeds the total budget.
pub fn input_budget(max_total_tokens: usize, user_input: &str) -> usize {
    max_total_tokens
        .saturating_sub(count_tokens(user_input))
        .saturating_sub(SAFETY_MARGIN)
}

/// Greedy most-recent-fit window over a turn history.
///
/// Walks from the newest turn backwards, keeping turns while the running
/// word count stays within `max_tokens`. The first turn that would overflow
/// ends the scan; turns are never split. The result is in chronological
/// order.
pub fn recent_window(turns: &[Turn], max_tokens: usize) -> Vec<String> {
    let mut used = 0;
    let mut start = turns.len();

    for (index, turn) in turns.iter().enumerate().rev() {
        let cost = turn.token_count();
        if used + cost > max_tokens {
            break;
        }
        used += cost;
        start = index;
    }

    turns[start..].iter().map(|t| t.text().to_string()).collect()
}

/// Join a window for direct prompt embedding
pub fn join_window(window: &[String]) -> String {
    window.join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(texts: &[&str]) -> Vec<Turn> {
        texts.iter().map(|t| Turn::from_text(*t)).collect()
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("User: hi"), 2);
        assert_eq!(count_tokens("  AI:   hello\tthere\n"), 3);
    }

    #[test]
    fn test_window_fits_everything() {
        let log = turns(&["User: hi", "AI: hello there"]);
        assert_eq!(recent_window(&log, 10), vec!["User: hi", "AI: hello there"]);
    }

    #[test]
    fn test_window_nothing_fits() {
        let log = turns(&["User: hi", "AI: hello there"]);
        assert!(recent_window(&log, 1).is_empty());
    }

    #[test]
    fn test_window_stops_at_first_overflow() {
        // 2, 6, 2 words: a budget of 5 keeps only the last turn even though
        // the first would still fit after skipping the middle one
        let log = turns(&["User: hi", "AI: one two three four five", "User: ok"]);
        assert_eq!(recent_window(&log, 5), vec!["User: ok"]);
        assert_eq!(
            recent_window(&log, 8),
            vec!["AI: one two three four five", "User: ok"]
        );
    }

    #[test]
    fn test_window_is_maximal_suffix() {
        let log = turns(&["User: a b c", "AI: d e", "User: f", "AI: g h i j"]);
        for budget in 0..20 {
            let window = recent_window(&log, budget);
            let used: usize = window.iter().map(|t| count_tokens(t)).sum();
            assert!(used <= budget);

            let suffix_start = log.len() - window.len();
            let expected: Vec<String> =
                log[suffix_start..].iter().map(|t| t.text().to_string()).collect();
            assert_eq!(window, expected);

            if suffix_start > 0 {
                assert!(used + log[suffix_start - 1].token_count() > budget);
            }
        }
    }

    #[test]
    fn test_budgets() {
        assert_eq!(history_budget(300), 270);
        assert_eq!(history_budget(10), 0);
        assert_eq!(input_budget(300, "one two three"), 267);
        assert_eq!(input_budget(20, "one two three"), 0);
    }

    #[test]
    fn test_join_window() {
        let window = vec!["User: hi".to_string(), "AI: hello".to_string()];
        assert_eq!(join_window(&window), "User: hi, AI: hello");
        assert_eq!(join_window(&[]), "");
    }
}
