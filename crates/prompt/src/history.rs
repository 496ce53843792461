//! Conversation history compression.

use crate::types::{HistoryTurn, TurnRole};

/// Number of question/answer pairs carried into the prompt by default.
pub const DEFAULT_HISTORY_PAIRS: usize = 2;

/// Longest answer excerpt kept per pair, in characters.
const MAX_ANSWER_CHARS: usize = 300;

/// Summarize the most recent user→assistant pairs of a conversation.
///
/// Only a user turn immediately followed by an assistant turn forms a pair.
/// Returns an empty string when no pair exists.
pub fn compress_history(history: &[HistoryTurn], max_pairs: usize) -> String {
    if max_pairs == 0 {
        return String::new();
    }

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for (i, turn) in history.iter().enumerate().rev() {
        if turn.role != TurnRole::User {
            continue;
        }
        if let Some(next) = history.get(i + 1) {
            if next.role == TurnRole::Assistant {
                pairs.push((&turn.content, &next.content));
                if pairs.len() >= max_pairs {
                    break;
                }
            }
        }
    }

    if pairs.is_empty() {
        return String::new();
    }
    pairs.reverse();

    let mut lines = vec!["=== Previous Conversation ===".to_string()];
    for (idx, (question, answer)) in pairs.iter().enumerate() {
        let n = idx + 1;
        lines.push(format!("\nQ{}: {}", n, question));
        lines.push(format!("A{}: {}", n, truncate_answer(answer)));
    }
    lines.push("\n=== End ===\n".to_string());

    lines.join("\n")
}

fn truncate_answer(answer: &str) -> String {
    match answer.char_indices().nth(MAX_ANSWER_CHARS) {
        Some((cut, _)) => format!("{}...", &answer[..cut]),
        None => answer.to_string(),
    }
}
