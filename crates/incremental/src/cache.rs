//! Keyed collection that records every mutation as a change.
//!
//! A ChangeAwareCache holds the current key → value state and accumulates
//! the changes produced by each mutation until they are captured.

use crate::edit_diff::edit_diff;
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashMap;
use rivulet_core::{Change, ChangeSet};

/// A keyed collection that records its own mutations.
#[derive(Clone, Debug)]
pub struct ChangeAwareCache<K, V> {
    /// Current state
    data: HashMap<K, V>,
    /// Changes recorded since the last capture, in call order
    pending: Vec<Change<K, V>>,
}

impl<K, V> Default for ChangeAwareCache<K, V> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
            pending: Vec::new(),
        }
    }
}

impl<K, V> ChangeAwareCache<K, V> {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the cache holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if there are uncaptured changes.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the underlying map.
    #[inline]
    pub fn data(&self) -> &HashMap<K, V> {
        &self.data
    }

    /// Iterates over the current items.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.data.iter()
    }

    /// Takes the recorded changes, leaving the pending list empty.
    pub fn capture_changes(&mut self) -> ChangeSet<K, V> {
        ChangeSet::from_changes(core::mem::take(&mut self.pending))
    }
}

impl<K, V> ChangeAwareCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Looks up the value for a key.
    #[inline]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.data.get(key)
    }

    /// Returns true if the key is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    /// Inserts or replaces the value for a key.
    pub fn add_or_update(&mut self, key: K, value: V) {
        match self.data.insert(key.clone(), value.clone()) {
            Some(previous) => self.pending.push(Change::update(key, value, previous)),
            None => self.pending.push(Change::add(key, value)),
        }
    }

    /// Removes a key. Absent keys are ignored.
    pub fn remove(&mut self, key: &K) {
        if let Some(previous) = self.data.remove(key) {
            self.pending.push(Change::remove(key.clone(), previous));
        }
    }

    /// Re-signals a key with its current value. Absent keys are ignored.
    pub fn refresh(&mut self, key: &K) {
        if let Some(current) = self.data.get(key) {
            self.pending.push(Change::refresh(key.clone(), current.clone()));
        }
    }

    /// Re-signals every key.
    pub fn refresh_all(&mut self) {
        self.pending.extend(
            self.data
                .iter()
                .map(|(k, v)| Change::refresh(k.clone(), v.clone())),
        );
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.pending.extend(
            self.data
                .drain()
                .map(|(key, previous)| Change::remove(key, previous)),
        );
    }

    /// Replaces the whole contents, recording only the minimal diff.
    pub fn load<I, E>(&mut self, items: I, are_equal: E)
    where
        I: IntoIterator<Item = (K, V)>,
        E: Fn(&V, &V) -> bool,
    {
        let changes = edit_diff(&self.data, items, are_equal);
        for change in &changes {
            match change {
                Change::Add { key, current, .. } | Change::Update { key, current, .. } => {
                    self.data.insert(key.clone(), current.clone());
                }
                Change::Remove { key, .. } => {
                    self.data.remove(key);
                }
                Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        self.pending.extend(changes);
    }

    /// Returns every item as an Add change.
    pub fn snapshot(&self) -> ChangeSet<K, V> {
        self.data
            .iter()
            .map(|(k, v)| Change::add(k.clone(), v.clone()))
            .collect()
    }
}

/// Applies a change set to a plain keyed map.
///
/// Replaying every change set emitted by a source, in order, reproduces the
/// source's contents.
pub fn replay<K, V, C>(target: &mut HashMap<K, V>, changes: &ChangeSet<K, V, C>)
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    for change in changes {
        match change {
            Change::Add { key, current, .. }
            | Change::Update { key, current, .. }
            | Change::Moved { key, current, .. }
            | Change::Refresh { key, current, .. } => {
                target.insert(key.clone(), current.clone());
            }
            Change::Remove { key, .. } => {
                target.remove(key);
            }
        }
    }
}
