//! The mutation surface handed to `Store::edit`.

use hashbrown::HashSet;
use rivulet_incremental::ChangeAwareCache;
use std::hash::Hash;
use std::sync::Arc;

/// Equality used by `load` to decide whether a value changed.
pub type Equality<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// One recorded mutation, applied when the edit commits.
pub(crate) enum EditOp<K, V> {
    AddOrUpdate { key: K, value: V },
    Remove { key: K },
    Refresh { key: K },
    RefreshAll,
    Clear,
    Load { items: Vec<(K, V)>, equal: Equality<V> },
}

impl<K, V> EditOp<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn apply(self, cache: &mut ChangeAwareCache<K, V>) {
        match self {
            EditOp::AddOrUpdate { key, value } => cache.add_or_update(key, value),
            EditOp::Remove { key } => cache.remove(&key),
            EditOp::Refresh { key } => cache.refresh(&key),
            EditOp::RefreshAll => cache.refresh_all(),
            EditOp::Clear => cache.clear(),
            EditOp::Load { items, equal } => cache.load(items, |a, b| equal(a, b)),
        }
    }
}

/// Records the operations of one edit.
///
/// Operations are applied in call order when the edit closure returns, and
/// the whole edit is published as a single change set. Reads through the
/// updater see the edit's own earlier operations.
pub struct Updater<'a, K, V> {
    committed: &'a ChangeAwareCache<K, V>,
    key_of: &'a (dyn Fn(&V) -> K + Send + Sync),
    ops: Vec<EditOp<K, V>>,
}

impl<'a, K, V> Updater<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(
        committed: &'a ChangeAwareCache<K, V>,
        key_of: &'a (dyn Fn(&V) -> K + Send + Sync),
    ) -> Self {
        Self {
            committed,
            key_of,
            ops: Vec::new(),
        }
    }

    pub(crate) fn into_ops(self) -> Vec<EditOp<K, V>> {
        self.ops
    }

    /// Adds `value`, or replaces the value with the same key.
    pub fn add_or_update(&mut self, value: V) {
        let key = (self.key_of)(&value);
        self.ops.push(EditOp::AddOrUpdate { key, value });
    }

    /// Adds or replaces every value, in order.
    pub fn add_or_update_many(&mut self, values: impl IntoIterator<Item = V>) {
        for value in values {
            self.add_or_update(value);
        }
    }

    /// Removes the item with the same key as `value`.
    pub fn remove(&mut self, value: &V) {
        let key = (self.key_of)(value);
        self.remove_key(key);
    }

    /// Removes the items with the same keys as `values`.
    pub fn remove_many<'v>(&mut self, values: impl IntoIterator<Item = &'v V>)
    where
        V: 'v,
    {
        for value in values {
            self.remove(value);
        }
    }

    /// Removes a key. Absent keys are ignored.
    pub fn remove_key(&mut self, key: K) {
        self.ops.push(EditOp::Remove { key });
    }

    /// Removes every listed key.
    pub fn remove_keys(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.remove_key(key);
        }
    }

    /// Re-signals the item with the same key as `value`.
    pub fn refresh(&mut self, value: &V) {
        let key = (self.key_of)(value);
        self.refresh_key(key);
    }

    /// Re-signals a key with its current value.
    pub fn refresh_key(&mut self, key: K) {
        self.ops.push(EditOp::Refresh { key });
    }

    /// Re-signals every item.
    pub fn refresh_all(&mut self) {
        self.ops.push(EditOp::RefreshAll);
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.ops.push(EditOp::Clear);
    }

    /// Replaces the whole contents with `values`, emitting only the
    /// minimal diff. Values equal under `PartialEq` produce no change.
    pub fn load(&mut self, values: impl IntoIterator<Item = V>)
    where
        V: PartialEq + 'static,
    {
        self.load_with(values, |a: &V, b: &V| a == b);
    }

    /// Like `load`, with a custom equality.
    pub fn load_with<E>(&mut self, values: impl IntoIterator<Item = V>, equal: E)
    where
        E: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        let items = values
            .into_iter()
            .map(|value| ((self.key_of)(&value), value))
            .collect();
        self.ops.push(EditOp::Load {
            items,
            equal: Arc::new(equal),
        });
    }

    /// Looks up a key, taking this edit's earlier operations into account.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        for op in self.ops.iter().rev() {
            match op {
                EditOp::AddOrUpdate { key: k, value } if k == key => return Some(value),
                EditOp::Remove { key: k } if k == key => return None,
                EditOp::Clear => return None,
                EditOp::Load { items, .. } => {
                    return items.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v);
                }
                _ => {}
            }
        }
        self.committed.lookup(key)
    }

    /// Number of items once this edit's operations so far are applied.
    pub fn count(&self) -> usize {
        if self.ops.is_empty() {
            return self.committed.len();
        }
        let mut keys: HashSet<&K> = self.committed.data().keys().collect();
        for op in &self.ops {
            match op {
                EditOp::AddOrUpdate { key, .. } => {
                    keys.insert(key);
                }
                EditOp::Remove { key } => {
                    keys.remove(key);
                }
                EditOp::Clear => keys.clear(),
                EditOp::Load { items, .. } => {
                    keys.clear();
                    keys.extend(items.iter().map(|(k, _)| k));
                }
                EditOp::Refresh { .. } | EditOp::RefreshAll => {}
            }
        }
        keys.len()
    }

    /// Returns true if no operation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
