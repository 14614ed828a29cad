//! Capability interface the resolver runs against.
//!
//! A [`Backend`] binds a transaction to one [`CollectionKind`] and one
//! identifier collection, and exposes the handful of operations term
//! resolution needs. Each operation maps to the set or the sorted-set
//! primitive of the store depending on the kind.

use log::trace;

use crate::error::Result;
use crate::storage::{CollectionKind, KeyValueStore};

/// Finite, single-use sequence of collection members.
pub type Members = std::vec::IntoIter<String>;

/// Kind-parameterized view over a store transaction.
#[derive(Debug)]
pub struct Backend<'a> {
    store: &'a mut dyn KeyValueStore,
    kind: CollectionKind,
    id_key: String,
}

impl<'a> Backend<'a> {
    /// Create a backend over `store`, validating ids against `id_key`.
    pub fn new<S: Into<String>>(
        store: &'a mut dyn KeyValueStore,
        kind: CollectionKind,
        id_key: S,
    ) -> Self {
        Backend {
            store,
            kind,
            id_key: id_key.into(),
        }
    }

    /// Merge the valid identifiers of `source` into `dest` in place.
    ///
    /// Only members of `source` that also belong to the identifier collection
    /// are added. Ordered collections take each member's score from the
    /// identifier collection, so merging the same id twice keeps that score.
    /// A missing `source` contributes nothing. Returns the new cardinality of
    /// `dest`.
    pub fn union_into(&mut self, dest: &str, source: &str) -> Result<usize> {
        trace!("union {source} into {dest}");
        let keys = [source, self.id_key.as_str()];
        match self.kind {
            CollectionKind::Unordered => {
                for id in self.store.set_intersection(&keys)? {
                    self.store.set_add(dest, &id)?;
                }
            }
            CollectionKind::Ordered => {
                for (id, score) in self.store.sorted_intersection(&keys, &[0.0, 1.0])? {
                    self.store.sorted_add(dest, &id, score)?;
                }
            }
        }
        self.cardinality(dest)
    }

    /// Add `id` to `dest` if it is a valid identifier.
    ///
    /// Unordered: `id` must be a member of the identifier collection.
    /// Ordered: `id` must have a score in the identifier collection, and is
    /// added with that score. Nothing is written for an invalid id.
    pub fn add_if_valid(&mut self, dest: &str, id: &str) -> Result<bool> {
        match self.kind {
            CollectionKind::Unordered => {
                if !self.store.set_contains(&self.id_key, id)? {
                    trace!("skipping unknown id '{id}'");
                    return Ok(false);
                }
                self.store.set_add(dest, id)?;
            }
            CollectionKind::Ordered => {
                let Some(score) = self.store.sorted_score(&self.id_key, id)? else {
                    trace!("skipping unknown id '{id}'");
                    return Ok(false);
                };
                self.store.sorted_add(dest, id, score)?;
            }
        }
        Ok(true)
    }

    /// All members of the collection at `key`. A missing key yields nothing.
    pub fn members(&self, key: &str) -> Result<Members> {
        let members = match self.kind {
            CollectionKind::Unordered => self.store.set_members(key)?,
            CollectionKind::Ordered => self
                .store
                .sorted_range(key)?
                .into_iter()
                .map(|(member, _)| member)
                .collect(),
        };
        Ok(members.into_iter())
    }

    /// Identifier mapped to `value` in the unique-field map at `map_key`.
    pub fn lookup_unique(&self, map_key: &str, value: &str) -> Result<Option<String>> {
        self.store.hash_get(map_key, value)
    }

    /// Number of members of the collection at `key`.
    pub fn cardinality(&self, key: &str) -> Result<usize> {
        match self.kind {
            CollectionKind::Unordered => self.store.set_cardinality(key),
            CollectionKind::Ordered => self.store.sorted_cardinality(key),
        }
    }
}
