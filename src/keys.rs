//! Key naming for model collections.
//!
//! Every key belonging to a model starts with the model namespace:
//!
//! - `<namespace>:id` holds the identifier collection,
//! - `<namespace>:idx:<field>:<value>` holds the ids whose `field` equals `value`,
//! - `<namespace>:uni:<field>` maps values of a unique field to their owning id.

use serde::{Deserialize, Serialize};

use crate::error::{KvWhereError, Result};

/// Segments used to build model keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLayout {
    /// Separator placed between key segments.
    pub separator: String,

    /// Segment naming the identifier collection.
    pub id_segment: String,

    /// Segment prefixing per-value index collections.
    pub index_segment: String,

    /// Segment prefixing unique-field maps.
    pub unique_segment: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        KeyLayout {
            separator: ":".to_string(),
            id_segment: "id".to_string(),
            index_segment: "idx".to_string(),
            unique_segment: "uni".to_string(),
        }
    }
}

impl KeyLayout {
    /// Key of the identifier collection of `namespace`.
    pub fn id_key(&self, namespace: &str) -> String {
        self.join(&[namespace, self.id_segment.as_str()])
    }

    /// Key of the index collection for `field == value`.
    pub fn index_key(&self, namespace: &str, field: &str, value: &str) -> String {
        self.join(&[namespace, self.index_segment.as_str(), field, value])
    }

    /// Key of the unique-value map of `field`.
    pub fn unique_key(&self, namespace: &str, field: &str) -> String {
        self.join(&[namespace, self.unique_segment.as_str(), field])
    }

    /// Check that every segment is usable and the three collection
    /// segments are distinct.
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(KvWhereError::config("key separator must not be empty"));
        }

        let segments = [
            ("id_segment", &self.id_segment),
            ("index_segment", &self.index_segment),
            ("unique_segment", &self.unique_segment),
        ];
        for (name, segment) in segments {
            if segment.is_empty() {
                return Err(KvWhereError::config(format!("{name} must not be empty")));
            }
            if segment.contains(self.separator.as_str()) {
                return Err(KvWhereError::config(format!(
                    "{name} '{segment}' contains the separator '{}'",
                    self.separator
                )));
            }
        }

        if self.id_segment == self.index_segment
            || self.id_segment == self.unique_segment
            || self.index_segment == self.unique_segment
        {
            return Err(KvWhereError::config("key segments must be distinct"));
        }

        Ok(())
    }

    fn join(&self, parts: &[&str]) -> String {
        parts.join(self.separator.as_str())
    }
}

/// Key of the index collection for `field == value` under the default layout.
pub fn index_key(namespace: &str, field: &str, value: &str) -> String {
    KeyLayout::default().index_key(namespace, field, value)
}
