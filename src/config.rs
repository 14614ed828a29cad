//! Configuration for term resolution.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KvWhereError, Result};
use crate::keys::KeyLayout;

/// Configuration shared by every resolution a [`Resolver`](crate::query::Resolver) runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Name of the primary identifier field.
    ///
    /// Terms on this field name identifiers directly instead of going
    /// through an index collection.
    pub id_field: String,

    /// How model keys are built.
    pub keys: KeyLayout,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            keys: KeyLayout::default(),
        }
    }
}

impl ResolverConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier field name.
    pub fn with_id_field<S: Into<String>>(mut self, id_field: S) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Set the key layout.
    pub fn with_keys(mut self, keys: KeyLayout) -> Self {
        self.keys = keys;
        self
    }

    /// Set the key separator.
    pub fn with_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.keys.separator = separator.into();
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ResolverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that the configuration can build keys.
    pub fn validate(&self) -> Result<()> {
        if self.id_field.is_empty() {
            return Err(KvWhereError::config("id_field must not be empty"));
        }
        self.keys.validate()
    }
}
