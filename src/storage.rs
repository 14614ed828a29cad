//! Storage abstraction layer for kvwhere.
//!
//! The resolver never talks to a concrete backend. It sees a key-value store
//! through two traits:
//!
//! - **KeyValueStore**: the raw primitives over sets, sorted sets and hashes
//!   (membership, scores, intersection, enumeration, cardinality, hash lookup)
//!   plus the writer operations an indexing pipeline uses.
//! - **Store**: the transactional entry point. Every resolution runs inside one
//!   `transaction` call so no other caller can observe a half-built result.
//!
//! Absent keys read as empty collections. Reading a key through an operation of
//! the wrong collection type is an error ([`KvWhereError::WrongType`]).
//!
//! # Example
//!
//! ```
//! use kvwhere::storage::{KeyValueStore, Store};
//! use kvwhere::storage::memory::MemoryStore;
//!
//! # fn main() -> kvwhere::error::Result<()> {
//! let store = MemoryStore::new();
//! let count = store.transaction(|tx| {
//!     tx.set_add("user:id", "1")?;
//!     tx.set_add("user:id", "2")?;
//!     tx.set_cardinality("user:id")
//! })?;
//! assert_eq!(count, 2);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KvWhereError, Result};

pub mod memory;

/// The type of value held under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Unordered set of unique strings.
    Set,
    /// Set of unique strings, each carrying a score.
    SortedSet,
    /// String-to-string map.
    Hash,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Set => write!(f, "set"),
            KeyType::SortedSet => write!(f, "sorted set"),
            KeyType::Hash => write!(f, "hash"),
        }
    }
}

/// Representation kind of the identifier, index and accumulator collections.
///
/// Chosen once per resolution; every collection touched by that resolution is
/// read and written with the primitives of this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Plain sets.
    #[default]
    Unordered,
    /// Sorted sets scored by the identifier collection.
    Ordered,
}

impl CollectionKind {
    /// The key type collections of this kind are stored as.
    pub fn key_type(self) -> KeyType {
        match self {
            CollectionKind::Unordered => KeyType::Set,
            CollectionKind::Ordered => KeyType::SortedSet,
        }
    }
}

/// Raw key-value primitives.
///
/// Read operations treat a missing key as an empty collection (or `None` for
/// point lookups). Scores are always finite: writes and weighted sums that
/// would produce a non-finite score are rejected.
pub trait KeyValueStore: Send + fmt::Debug {
    /// Get the type of the value stored at `key`, if any.
    fn key_type(&self, key: &str) -> Result<Option<KeyType>>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&mut self, key: &str) -> Result<bool>;

    /// Check whether `member` belongs to the set at `key`.
    fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// Add `member` to the set at `key`. Returns whether it was newly added.
    fn set_add(&mut self, key: &str, member: &str) -> Result<bool>;

    /// All members of the set at `key`, in no particular order.
    fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Number of members of the set at `key`.
    fn set_cardinality(&self, key: &str) -> Result<usize>;

    /// Members present in every set at `keys`. A missing key makes the
    /// result empty.
    fn set_intersection(&self, keys: &[&str]) -> Result<Vec<String>>;

    /// Score of `member` in the sorted set at `key`.
    fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Add `member` with `score` to the sorted set at `key`, replacing any
    /// previous score. Returns whether it was newly added.
    fn sorted_add(&mut self, key: &str, member: &str, score: f64) -> Result<bool>;

    /// All `(member, score)` pairs of the sorted set at `key`, ordered by
    /// score and then by member.
    fn sorted_range(&self, key: &str) -> Result<Vec<(String, f64)>>;

    /// Number of members of the sorted set at `key`.
    fn sorted_cardinality(&self, key: &str) -> Result<usize>;

    /// Members present in every sorted set at `keys`, each scored with the
    /// sum of its scores multiplied by the matching entry of `weights`.
    ///
    /// `weights` must have one entry per key. A missing key makes the result
    /// empty. The result is ordered like [`sorted_range`](Self::sorted_range).
    fn sorted_intersection(&self, keys: &[&str], weights: &[f64]) -> Result<Vec<(String, f64)>>;

    /// Value of `field` in the hash at `key`.
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Set `field` to `value` in the hash at `key`. Returns whether the field
    /// was newly created.
    fn hash_set(&mut self, key: &str, field: &str, value: &str) -> Result<bool>;
}

/// A store that runs closures atomically against its keyspace.
pub trait Store: Send + Sync + fmt::Debug {
    /// Run `f` as one atomic unit.
    ///
    /// No other transaction observes the keyspace while `f` runs. When `f`
    /// returns an error, every write it made is discarded and the error is
    /// returned unchanged.
    fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn KeyValueStore) -> Result<R>;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Store is closed.
    StoreClosed,

    /// Snapshot could not be interpreted.
    InvalidSnapshot(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::StoreClosed => write!(f, "Store is closed"),
            StorageError::InvalidSnapshot(msg) => write!(f, "Invalid snapshot: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for KvWhereError {
    fn from(err: StorageError) -> Self {
        KvWhereError::storage(err.to_string())
    }
}
