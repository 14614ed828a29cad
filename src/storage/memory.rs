//! In-memory store implementation for testing and embedding.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::{AHashMap, AHashSet};
use log::{trace, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{KvWhereError, Result};
use crate::storage::{KeyType, KeyValueStore, StorageError, Store};

/// A value held under one key.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Set(AHashSet<String>),
    SortedSet(AHashMap<String, f64>),
    Hash(AHashMap<String, String>),
}

impl Value {
    fn key_type(&self) -> KeyType {
        match self {
            Value::Set(_) => KeyType::Set,
            Value::SortedSet(_) => KeyType::SortedSet,
            Value::Hash(_) => KeyType::Hash,
        }
    }
}

type Keyspace = AHashMap<String, Value>;

/// An in-memory key-value store.
///
/// Transactions take an exclusive lock on the whole keyspace, so a resolution
/// running inside [`Store::transaction`] is atomic with respect to every other
/// caller of the same store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: RwLock<Keyspace>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut keyspace = Keyspace::default();
        for (key, value) in snapshot.keys {
            keyspace.insert(key.clone(), value.into_value(&key)?);
        }

        Ok(MemoryStore {
            keyspace: RwLock::new(keyspace),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a store from a JSON-encoded [`Snapshot`].
    pub fn from_snapshot_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    /// Capture the current contents of the store.
    pub fn snapshot(&self) -> Snapshot {
        let keyspace = self.keyspace.read();
        let keys = keyspace
            .iter()
            .map(|(key, value)| (key.clone(), SnapshotValue::from_value(value)))
            .collect();
        Snapshot { keys }
    }

    /// Capture the current contents of the store as pretty-printed JSON.
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Get the number of keys stored.
    pub fn key_count(&self) -> usize {
        self.keyspace.read().len()
    }

    /// Check if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keyspace.read().is_empty()
    }

    /// Remove every key from the store.
    pub fn clear(&self) -> Result<()> {
        self.check_closed()?;
        self.keyspace.write().clear();
        Ok(())
    }

    /// Close the store. Subsequent transactions fail; one already running
    /// completes.
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Check if the store is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            Err(StorageError::StoreClosed.into())
        } else {
            Ok(())
        }
    }
}

impl Store for MemoryStore {
    fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn KeyValueStore) -> Result<R>,
    {
        self.check_closed()?;

        let mut keyspace = self.keyspace.write();
        let mut tx = MemoryTransaction::new(&mut *keyspace);
        match f(&mut tx) {
            Ok(value) => Ok(value),
            Err(err) => {
                let restored = tx.rollback();
                warn!("transaction aborted, restored {restored} key(s): {err}");
                Err(err)
            }
        }
    }
}

/// A view of the keyspace for the duration of one transaction.
///
/// The first write to each key records its previous value so a failed
/// transaction can put every touched key back.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    keyspace: &'a mut Keyspace,
    journal: Vec<(String, Option<Value>)>,
    journaled: AHashSet<String>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(keyspace: &'a mut Keyspace) -> Self {
        MemoryTransaction {
            keyspace,
            journal: Vec::new(),
            journaled: AHashSet::new(),
        }
    }

    /// Undo every write. Returns the number of keys restored.
    fn rollback(self) -> usize {
        let MemoryTransaction {
            keyspace, journal, ..
        } = self;

        let restored = journal.len();
        for (key, previous) in journal.into_iter().rev() {
            trace!("rollback: restoring '{key}'");
            match previous {
                Some(value) => {
                    keyspace.insert(key, value);
                }
                None => {
                    keyspace.remove(&key);
                }
            }
        }
        restored
    }

    fn record(&mut self, key: &str) {
        if self.journaled.insert(key.to_string()) {
            self.journal
                .push((key.to_string(), self.keyspace.get(key).cloned()));
        }
    }

    fn set(&self, key: &str) -> Result<Option<&AHashSet<String>>> {
        match self.keyspace.get(key) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(other) => Err(KvWhereError::wrong_type(
                key,
                KeyType::Set,
                other.key_type(),
            )),
        }
    }

    fn sorted(&self, key: &str) -> Result<Option<&AHashMap<String, f64>>> {
        match self.keyspace.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(zset)) => Ok(Some(zset)),
            Some(other) => Err(KvWhereError::wrong_type(
                key,
                KeyType::SortedSet,
                other.key_type(),
            )),
        }
    }

    fn hash(&self, key: &str) -> Result<Option<&AHashMap<String, String>>> {
        match self.keyspace.get(key) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(Some(hash)),
            Some(other) => Err(KvWhereError::wrong_type(
                key,
                KeyType::Hash,
                other.key_type(),
            )),
        }
    }

    /// Get a mutable value of the expected type, creating it when absent.
    fn value_mut(&mut self, key: &str, expected: KeyType) -> Result<&mut Value> {
        if let Some(existing) = self.keyspace.get(key) {
            let found = existing.key_type();
            if found != expected {
                return Err(KvWhereError::wrong_type(key, expected, found));
            }
        }

        self.record(key);
        Ok(self
            .keyspace
            .entry(key.to_string())
            .or_insert_with(|| match expected {
                KeyType::Set => Value::Set(AHashSet::new()),
                KeyType::SortedSet => Value::SortedSet(AHashMap::new()),
                KeyType::Hash => Value::Hash(AHashMap::new()),
            }))
    }
}

impl KeyValueStore for MemoryTransaction<'_> {
    fn key_type(&self, key: &str) -> Result<Option<KeyType>> {
        Ok(self.keyspace.get(key).map(Value::key_type))
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        if !self.keyspace.contains_key(key) {
            return Ok(false);
        }
        self.record(key);
        self.keyspace.remove(key);
        Ok(true)
    }

    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.set(key)?.is_some_and(|set| set.contains(member)))
    }

    fn set_add(&mut self, key: &str, member: &str) -> Result<bool> {
        match self.value_mut(key, KeyType::Set)? {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            other => Err(KvWhereError::wrong_type(key, KeyType::Set, other.key_type())),
        }
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .set(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn set_cardinality(&self, key: &str) -> Result<usize> {
        Ok(self.set(key)?.map_or(0, |set| set.len()))
    }

    fn set_intersection(&self, keys: &[&str]) -> Result<Vec<String>> {
        let sets = keys
            .iter()
            .map(|key| self.set(key))
            .collect::<Result<Vec<_>>>()?;
        let Some(mut sets) = sets.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(Vec::new());
        };

        sets.sort_by_key(|set| set.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        Ok(smallest
            .iter()
            .filter(|member| rest.iter().all(|set| set.contains(*member)))
            .cloned()
            .collect())
    }

    fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        Ok(self
            .sorted(key)?
            .and_then(|zset| zset.get(member).copied()))
    }

    fn sorted_add(&mut self, key: &str, member: &str, score: f64) -> Result<bool> {
        if !score.is_finite() {
            return Err(KvWhereError::invalid_argument(format!(
                "score for '{member}' in '{key}' is not finite"
            )));
        }

        match self.value_mut(key, KeyType::SortedSet)? {
            Value::SortedSet(zset) => Ok(zset.insert(member.to_string(), score).is_none()),
            other => Err(KvWhereError::wrong_type(
                key,
                KeyType::SortedSet,
                other.key_type(),
            )),
        }
    }

    fn sorted_range(&self, key: &str) -> Result<Vec<(String, f64)>> {
        let mut entries: Vec<(String, f64)> = self
            .sorted(key)?
            .map(|zset| {
                zset.iter()
                    .map(|(member, score)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();

        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    fn sorted_cardinality(&self, key: &str) -> Result<usize> {
        Ok(self.sorted(key)?.map_or(0, |zset| zset.len()))
    }

    fn sorted_intersection(&self, keys: &[&str], weights: &[f64]) -> Result<Vec<(String, f64)>> {
        if keys.len() != weights.len() {
            return Err(KvWhereError::invalid_argument(format!(
                "{} weight(s) given for {} key(s)",
                weights.len(),
                keys.len()
            )));
        }

        let zsets = keys
            .iter()
            .map(|key| self.sorted(key))
            .collect::<Result<Vec<_>>>()?;
        let Some(zsets) = zsets.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(Vec::new());
        };
        let Some(first) = zsets.first() else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        'members: for member in first.keys() {
            let mut score = 0.0;
            for (zset, weight) in zsets.iter().zip(weights) {
                match zset.get(member) {
                    Some(member_score) => score += weight * member_score,
                    None => continue 'members,
                }
            }
            if !score.is_finite() {
                return Err(KvWhereError::invalid_argument(format!(
                    "weighted score for '{member}' is not finite"
                )));
            }
            entries.push((member.clone(), score));
        }

        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.hash(key)?.and_then(|hash| hash.get(field).cloned()))
    }

    fn hash_set(&mut self, key: &str, field: &str, value: &str) -> Result<bool> {
        match self.value_mut(key, KeyType::Hash)? {
            Value::Hash(hash) => Ok(hash
                .insert(field.to_string(), value.to_string())
                .is_none()),
            other => Err(KvWhereError::wrong_type(key, KeyType::Hash, other.key_type())),
        }
    }
}

/// Serializable image of a [`MemoryStore`].
///
/// ```json
/// {
///   "keys": {
///     "user:id": { "set": ["1", "2"] },
///     "user:uni:name": { "hash": { "alice": "1" } },
///     "post:id": { "sorted_set": { "7": 1.5 } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Every key with its value.
    pub keys: BTreeMap<String, SnapshotValue>,
}

/// Serializable image of one stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotValue {
    /// Set members.
    Set(Vec<String>),
    /// Sorted set members with their scores.
    SortedSet(BTreeMap<String, f64>),
    /// Hash fields with their values.
    Hash(BTreeMap<String, String>),
}

impl SnapshotValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Set(set) => {
                let mut members: Vec<String> = set.iter().cloned().collect();
                members.sort();
                SnapshotValue::Set(members)
            }
            Value::SortedSet(zset) => SnapshotValue::SortedSet(
                zset.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            ),
            Value::Hash(hash) => SnapshotValue::Hash(
                hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
            ),
        }
    }

    fn into_value(self, key: &str) -> Result<Value> {
        let empty = match &self {
            SnapshotValue::Set(members) => members.is_empty(),
            SnapshotValue::SortedSet(zset) => zset.is_empty(),
            SnapshotValue::Hash(hash) => hash.is_empty(),
        };
        if empty {
            return Err(
                StorageError::InvalidSnapshot(format!("key '{key}' holds an empty value")).into(),
            );
        }

        Ok(match self {
            SnapshotValue::Set(members) => Value::Set(members.into_iter().collect()),
            SnapshotValue::SortedSet(zset) => {
                if let Some((member, _)) = zset.iter().find(|(_, score)| !score.is_finite()) {
                    return Err(StorageError::InvalidSnapshot(format!(
                        "score for '{member}' in '{key}' is not finite"
                    ))
                    .into());
                }
                Value::SortedSet(zset.into_iter().collect())
            }
            SnapshotValue::Hash(hash) => Value::Hash(hash.into_iter().collect()),
        })
    }
}
