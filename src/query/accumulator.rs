//! Destination collection of a resolution.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{CollectionKind, KeyValueStore};

/// Handle to the caller-owned collection resolved ids are unioned into.
///
/// The resolver only appends to it. Creating, clearing and deleting the
/// underlying key is up to the caller, who should use one accumulator key
/// per logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accumulator {
    key: String,
    kind: CollectionKind,
}

impl Accumulator {
    /// Create a handle for the collection at `key`.
    pub fn new<S: Into<String>>(key: S, kind: CollectionKind) -> Self {
        Accumulator {
            key: key.into(),
            kind,
        }
    }

    /// Create a handle for an unordered collection.
    pub fn unordered<S: Into<String>>(key: S) -> Self {
        Self::new(key, CollectionKind::Unordered)
    }

    /// Create a handle for an ordered collection.
    pub fn ordered<S: Into<String>>(key: S) -> Self {
        Self::new(key, CollectionKind::Ordered)
    }

    /// Key of the collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Representation kind of the collection.
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Number of ids currently accumulated.
    pub fn cardinality(&self, store: &dyn KeyValueStore) -> Result<usize> {
        match self.kind {
            CollectionKind::Unordered => store.set_cardinality(&self.key),
            CollectionKind::Ordered => store.sorted_cardinality(&self.key),
        }
    }

    /// Accumulated ids, sorted. Ordered collections are sorted by score.
    pub fn members(&self, store: &dyn KeyValueStore) -> Result<Vec<String>> {
        match self.kind {
            CollectionKind::Unordered => {
                let mut members = store.set_members(&self.key)?;
                members.sort();
                Ok(members)
            }
            CollectionKind::Ordered => Ok(store
                .sorted_range(&self.key)?
                .into_iter()
                .map(|(member, _)| member)
                .collect()),
        }
    }

    /// Accumulated ids with their scores, sorted by score.
    ///
    /// Unordered collections carry no scores and report `1.0` for every id.
    pub fn scored_members(&self, store: &dyn KeyValueStore) -> Result<Vec<(String, f64)>> {
        match self.kind {
            CollectionKind::Unordered => Ok(self
                .members(store)?
                .into_iter()
                .map(|member| (member, 1.0))
                .collect()),
            CollectionKind::Ordered => store.sorted_range(&self.key),
        }
    }
}
