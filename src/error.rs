//! Error types for the kvwhere library.
//!
//! All failures surfaced by the library are represented by the [`KvWhereError`]
//! enum. Missing identifiers, missing unique-map entries and dangling key
//! references are *not* errors: the resolver treats them as absent data.
//!
//! # Examples
//!
//! ```
//! use kvwhere::error::{KvWhereError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(KvWhereError::config("separator must not be empty"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::storage::KeyType;

/// The main error type for kvwhere operations.
#[derive(Error, Debug)]
pub enum KvWhereError {
    /// I/O errors (loading configuration or snapshots from disk).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A key holds a value of a different type than the operation expects.
    #[error("Wrong type for key '{key}': expected {expected}, found {found}")]
    WrongType {
        key: String,
        expected: KeyType,
        found: KeyType,
    },

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An argument was rejected before reaching the store.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for operations that may fail with KvWhereError.
pub type Result<T> = std::result::Result<T, KvWhereError>;

impl KvWhereError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        KvWhereError::Storage(msg.into())
    }

    /// Create a new wrong-type error for `key`.
    pub fn wrong_type<S: Into<String>>(key: S, expected: KeyType, found: KeyType) -> Self {
        KvWhereError::WrongType {
            key: key.into(),
            expected,
            found,
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        KvWhereError::Config(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        KvWhereError::InvalidArgument(msg.into())
    }
}
