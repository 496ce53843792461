//! Token estimation for context budgeting.

/// Rough token count: one token per four characters, rounded down.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
