//! Answer Classifier
//!
//! Decides whether a raw free-text answer is a skip command, an affirmative
//! command, or a literal value. Classification is pure: callers decide what a
//! skip or an affirmative means for the question being answered.

use serde::{Deserialize, Serialize};

/// Recognised aliases for "leave this blank" / "no".
pub const SKIP_WORDS: [&str; 9] = [
    "skip",
    "no",
    "n",
    "leave it",
    "leave",
    "none",
    "not needed",
    "pass",
    "done",
];

/// Recognised aliases for "yes" / "add another".
pub const AFFIRMATIVE_WORDS: [&str; 13] = [
    "yes",
    "y",
    "yeah",
    "yep",
    "yup",
    "sure",
    "ok",
    "okay",
    "add",
    "add more",
    "please",
    "let's do it",
    "continue",
];

/// Outcome of classifying one raw answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Classification {
    /// Skip command, or blank input
    Skip,
    /// Affirmative command
    Affirmative,
    /// Any other text, trimmed
    Literal(String),
}

impl Classification {
    /// Get the literal text if this is a literal answer
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            _ => None,
        }
    }
}

/// Classify a raw answer.
///
/// Matching is case-insensitive on the trimmed input. Internal whitespace is
/// collapsed so that `"add   more"` behaves like `"add more"`.
pub fn classify(raw: &str) -> Classification {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Classification::Skip;
    }

    let normalized = normalize_command(trimmed);
    if SKIP_WORDS.contains(&normalized.as_str()) {
        Classification::Skip
    } else if AFFIRMATIVE_WORDS.contains(&normalized.as_str()) {
        Classification::Affirmative
    } else {
        Classification::Literal(trimmed.to_string())
    }
}

/// True for values that read as "nothing given": blank or a skip alias.
pub fn is_negative(value: &str) -> bool {
    matches!(classify(value), Classification::Skip)
}

fn normalize_command(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{2019}', "'")
        .to_lowercase()
}
