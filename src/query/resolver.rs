//! Disjunctive term resolution over secondary indices.
//!
//! A [`Resolution`] names one field of one model and an [`Accumulator`].
//! Resolving a list of terms against it unions, term by term, the ids
//! matching each term into the accumulator and returns the accumulator's
//! cardinality. How a term is resolved depends on the field:
//!
//! | Field | Literal term | KeyRef term |
//! |---|---|---|
//! | id field | add the id if valid | union the valid ids of the referenced collection |
//! | unique field | unique map -> id, add if valid | same, for every value in the referenced collection |
//! | other field | union the valid ids of the value's index collection | same, for every value in the referenced collection |
//!
//! An id is valid while it belongs to the model's identifier collection, so
//! index entries left behind by deleted records never reach the accumulator.
//! Ordered accumulators always carry the identifier collection's score.
//! Unknown ids, values with no unique-map entry and references to missing
//! keys contribute nothing. Store failures abort the whole resolution.
//!
//! # Example
//!
//! ```
//! use kvwhere::query::{Accumulator, Resolution, Resolver, Term};
//! use kvwhere::storage::memory::MemoryStore;
//!
//! # fn main() -> kvwhere::error::Result<()> {
//! let store = MemoryStore::from_snapshot_json(r#"{
//!     "keys": {
//!         "car:id": { "set": ["1", "2", "3"] },
//!         "car:idx:color:red": { "set": ["1", "3"] },
//!         "car:idx:color:blue": { "set": ["2"] }
//!     }
//! }"#)?;
//!
//! let resolution = Resolution::new("car", "color", Accumulator::unordered("tmp:q1"));
//! let count = Resolver::default().resolve(
//!     &store,
//!     &resolution,
//!     &[Term::literal("red"), Term::literal("blue")],
//! )?;
//! assert_eq!(count, 3);
//! # Ok(())
//! # }
//! ```

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::query::accumulator::Accumulator;
use crate::query::term::{Term, TermKind};
use crate::storage::{CollectionKind, KeyValueStore, Store};

/// How terms on a field are turned into ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStrategy {
    /// The primary identifier field: values are ids.
    Identifier,
    /// A unique field: values map to one id through the unique-field map.
    Unique,
    /// Any other indexed field: values map to an index collection of ids.
    Indexed,
}

impl FieldStrategy {
    /// Pick the strategy for `field`. The id field wins over the unique flag.
    pub fn select(field: &str, unique: bool, id_field: &str) -> Self {
        if field == id_field {
            FieldStrategy::Identifier
        } else if unique {
            FieldStrategy::Unique
        } else {
            FieldStrategy::Indexed
        }
    }
}

/// One field of one model to resolve terms against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Model namespace prefixing every key of the model.
    pub namespace: String,
    /// Field the terms constrain.
    pub field: String,
    /// Whether the field is declared unique.
    pub unique: bool,
    /// Collection results are unioned into.
    pub accumulator: Accumulator,
}

impl Resolution {
    /// Create a resolution over a non-unique field.
    pub fn new<N, F>(namespace: N, field: F, accumulator: Accumulator) -> Self
    where
        N: Into<String>,
        F: Into<String>,
    {
        Resolution {
            namespace: namespace.into(),
            field: field.into(),
            unique: false,
            accumulator,
        }
    }

    /// Mark the field as unique (or not).
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Representation kind used for the whole resolution.
    pub fn kind(&self) -> CollectionKind {
        self.accumulator.kind()
    }
}

/// Resolves term lists into accumulators.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Resolver { config })
    }

    /// Get the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Strategy `resolution` will use.
    pub fn strategy(&self, resolution: &Resolution) -> FieldStrategy {
        FieldStrategy::select(&resolution.field, resolution.unique, &self.config.id_field)
    }

    /// Resolve `terms` atomically in one store transaction.
    ///
    /// Returns the cardinality of the accumulator once every term has been
    /// folded in. On error nothing the call wrote is kept.
    pub fn resolve<S: Store>(
        &self,
        store: &S,
        resolution: &Resolution,
        terms: &[Term],
    ) -> Result<usize> {
        store.transaction(|tx| self.resolve_in(tx, resolution, terms))
    }

    /// Resolve `terms` inside an already open transaction.
    pub fn resolve_in(
        &self,
        store: &mut dyn KeyValueStore,
        resolution: &Resolution,
        terms: &[Term],
    ) -> Result<usize> {
        let strategy = self.strategy(resolution);
        let dest = resolution.accumulator.key();
        let keys = &self.config.keys;

        debug!(
            "resolving {} term(s) on {}.{} ({:?}, {:?}) into {}",
            terms.len(),
            resolution.namespace,
            resolution.field,
            strategy,
            resolution.kind(),
            dest
        );

        let mut backend = Backend::new(store, resolution.kind(), keys.id_key(&resolution.namespace));
        for term in terms {
            trace!("term {term}");
            match (strategy, term.kind) {
                (FieldStrategy::Identifier, TermKind::KeyRef) => {
                    backend.union_into(dest, &term.value)?;
                }
                (FieldStrategy::Identifier, TermKind::Literal) => {
                    backend.add_if_valid(dest, &term.value)?;
                }
                (FieldStrategy::Unique, TermKind::Literal) => {
                    let map_key = keys.unique_key(&resolution.namespace, &resolution.field);
                    Self::add_unique(&mut backend, dest, &map_key, &term.value)?;
                }
                (FieldStrategy::Unique, TermKind::KeyRef) => {
                    // The referenced collection holds raw field values.
                    let map_key = keys.unique_key(&resolution.namespace, &resolution.field);
                    for value in backend.members(&term.value)? {
                        Self::add_unique(&mut backend, dest, &map_key, &value)?;
                    }
                }
                (FieldStrategy::Indexed, TermKind::KeyRef) => {
                    for value in backend.members(&term.value)? {
                        let source =
                            keys.index_key(&resolution.namespace, &resolution.field, &value);
                        backend.union_into(dest, &source)?;
                    }
                }
                (FieldStrategy::Indexed, TermKind::Literal) => {
                    let source =
                        keys.index_key(&resolution.namespace, &resolution.field, &term.value);
                    backend.union_into(dest, &source)?;
                }
            }
        }

        let cardinality = backend.cardinality(dest)?;
        debug!("{dest} now holds {cardinality} id(s)");
        Ok(cardinality)
    }

    fn add_unique(backend: &mut Backend<'_>, dest: &str, map_key: &str, value: &str) -> Result<()> {
        match backend.lookup_unique(map_key, value)? {
            Some(id) => {
                backend.add_if_valid(dest, &id)?;
            }
            None => trace!("no unique entry for '{value}' in {map_key}"),
        }
        Ok(())
    }
}

/// Resolve `terms` on `field` of `namespace` into `destination` using the
/// default configuration. Returns the destination's cardinality.
pub fn resolve<S: Store>(
    store: &S,
    namespace: &str,
    kind: CollectionKind,
    destination: &str,
    field: &str,
    unique: bool,
    terms: &[Term],
) -> Result<usize> {
    let resolution =
        Resolution::new(namespace, field, Accumulator::new(destination, kind)).with_unique(unique);
    Resolver::default().resolve(store, &resolution, terms)
}
