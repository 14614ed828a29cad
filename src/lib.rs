//! # kvwhere
//!
//! Resolves disjunctive (OR) predicates over one indexed field of a document
//! model stored as secondary indices in a key-value store, and materializes
//! the matching ids into a caller-owned accumulator collection.
//!
//! ## Features
//!
//! - Unordered (set) and ordered (sorted set) representations
//! - Identifier, unique and indexed field strategies
//! - Literal terms and references to value collections
//! - Atomic resolution inside one store transaction
//! - In-memory store with rollback and JSON snapshots

pub mod backend;
pub mod config;
pub mod error;
pub mod keys;
pub mod query;
pub mod storage;

pub mod prelude {
    pub use crate::config::ResolverConfig;
    pub use crate::error::{KvWhereError, Result};
    pub use crate::query::{Accumulator, FieldStrategy, Resolution, Resolver, Term, TermKind};
    pub use crate::storage::memory::MemoryStore;
    pub use crate::storage::{CollectionKind, KeyValueStore, Store};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
