//! Question Keys
//!
//! Stable string identifiers for questions. Three shapes exist:
//! - `name` - a fixed field (e.g. `corePromise`)
//! - `group[i].field` - a field of repeatable item `i` (e.g. `proof[1].type`)
//! - `gate[i]` - the "add another?" gate asked when `i` items exist
//!   (e.g. `ask-more-proof[2]`)
//!
//! Keys are persisted verbatim in UI snapshots, so the rendering is part of
//! the storage contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of one question in a wizard step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionKey(String);

/// Structural view of a question key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape<'a> {
    Fixed(&'a str),
    Item {
        group: &'a str,
        index: usize,
        field: &'a str,
    },
    Gate {
        gate: &'a str,
        index: usize,
    },
}

impl QuestionKey {
    /// Key of a fixed (non-repeating) field.
    pub fn fixed(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key of `field` inside repeatable item `index` of `group`.
    pub fn item(group: &str, index: usize, field: &str) -> Self {
        Self(format!("{}[{}].{}", group, index, field))
    }

    /// Key of the gate asked while `index` items exist.
    pub fn gate(gate: &str, index: usize) -> Self {
        Self(format!("{}[{}]", gate, index))
    }

    /// Parse and validate a key string.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::parse("Question key cannot be empty"));
        }
        let key = Self(raw.to_string());
        if let KeyShape::Fixed(name) = key.shape() {
            if name.contains(&['[', ']'][..]) {
                return Err(CoreError::parse(format!("Malformed question key: '{}'", raw)));
            }
        }
        Ok(key)
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decompose the key into its shape.
    pub fn shape(&self) -> KeyShape<'_> {
        let s = self.0.as_str();
        let Some(open) = s.find('[') else {
            return KeyShape::Fixed(s);
        };
        let Some(close_rel) = s[open..].find(']') else {
            return KeyShape::Fixed(s);
        };
        let close = open + close_rel;
        let Ok(index) = s[open + 1..close].parse::<usize>() else {
            return KeyShape::Fixed(s);
        };
        let head = &s[..open];
        let rest = &s[close + 1..];
        if head.is_empty() {
            return KeyShape::Fixed(s);
        }
        if rest.is_empty() {
            KeyShape::Gate { gate: head, index }
        } else if let Some(field) = rest.strip_prefix('.').filter(|f| !f.is_empty()) {
            KeyShape::Item {
                group: head,
                index,
                field,
            }
        } else {
            KeyShape::Fixed(s)
        }
    }

    /// Item index for item and gate keys.
    pub fn index(&self) -> Option<usize> {
        match self.shape() {
            KeyShape::Item { index, .. } | KeyShape::Gate { index, .. } => Some(index),
            KeyShape::Fixed(_) => None,
        }
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QuestionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that a model-level name can be embedded in a key.
pub(crate) fn validate_name(kind: &str, name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::model(format!("{} name cannot be empty", kind)));
    }
    if name.contains(&['[', ']', '.'][..]) || name.chars().any(char::is_whitespace) {
        return Err(CoreError::model(format!(
            "{} name '{}' may not contain brackets, dots or whitespace",
            kind, name
        )));
    }
    Ok(())
}
