//! Query terms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a term's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// The value is a field value (or, on the id field, an identifier).
    Literal,
    /// The value is the key of another collection whose members are resolved.
    KeyRef,
}

/// One unit of query input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// How `value` is interpreted.
    pub kind: TermKind,
    /// Field value, identifier, or collection key.
    pub value: String,
}

impl Term {
    /// Create a literal term.
    pub fn literal<S: Into<String>>(value: S) -> Self {
        Term {
            kind: TermKind::Literal,
            value: value.into(),
        }
    }

    /// Create a term referencing the collection stored at `key`.
    pub fn key_ref<S: Into<String>>(key: S) -> Self {
        Term {
            kind: TermKind::KeyRef,
            value: key.into(),
        }
    }

    /// Get the term value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TermKind::Literal => write!(f, "{:?}", self.value),
            TermKind::KeyRef => write!(f, "@{}", self.value),
        }
    }
}
