//! Ordered batches of changes.
//!
//! A ChangeSet is the unit every stage consumes and emits. Order is
//! authoritative: a later change may depend on the effect of an earlier one
//! in the same batch, so consumers must replay changes in sequence.
//!
//! Plain, sorted and windowed batches share this one type and differ only in
//! the context payload `C`.

use crate::change::{Change, ChangeReason};
use alloc::vec::Vec;
use core::slice;

/// An ordered batch of changes with an optional context payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet<K, V, C = ()> {
    changes: Vec<Change<K, V>>,
    context: C,
}

impl<K, V> ChangeSet<K, V, ()> {
    /// The empty batch.
    pub const EMPTY: Self = Self {
        changes: Vec::new(),
        context: (),
    };

    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Creates a change set from a list of changes.
    #[inline]
    pub fn from_changes(changes: Vec<Change<K, V>>) -> Self {
        Self {
            changes,
            context: (),
        }
    }
}

impl<K, V> Default for ChangeSet<K, V, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> ChangeSet<K, V, C> {
    /// Creates a change set carrying the given context.
    #[inline]
    pub fn with_context(changes: Vec<Change<K, V>>, context: C) -> Self {
        Self { changes, context }
    }

    /// Returns the context payload.
    #[inline]
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Returns the changes in emission order.
    #[inline]
    pub fn changes(&self) -> &[Change<K, V>] {
        &self.changes
    }

    /// Returns an iterator over the changes in emission order.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Change<K, V>> {
        self.changes.iter()
    }

    /// Returns the number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Appends a change.
    #[inline]
    pub fn push(&mut self, change: Change<K, V>) {
        self.changes.push(change);
    }

    /// Splits the change set into its changes and context.
    pub fn into_parts(self) -> (Vec<Change<K, V>>, C) {
        (self.changes, self.context)
    }

    /// Replaces the context payload.
    pub fn map_context<D, F>(self, f: F) -> ChangeSet<K, V, D>
    where
        F: FnOnce(C) -> D,
    {
        ChangeSet {
            changes: self.changes,
            context: f(self.context),
        }
    }

    /// Drops the context payload.
    pub fn without_context(self) -> ChangeSet<K, V> {
        ChangeSet {
            changes: self.changes,
            context: (),
        }
    }

    /// Counts changes with the given reason.
    pub fn count(&self, reason: ChangeReason) -> usize {
        self.changes.iter().filter(|c| c.reason() == reason).count()
    }

    /// Number of additions.
    pub fn adds(&self) -> usize {
        self.count(ChangeReason::Add)
    }

    /// Number of updates.
    pub fn updates(&self) -> usize {
        self.count(ChangeReason::Update)
    }

    /// Number of removals.
    pub fn removes(&self) -> usize {
        self.count(ChangeReason::Remove)
    }

    /// Number of refreshes.
    pub fn refreshes(&self) -> usize {
        self.count(ChangeReason::Refresh)
    }

    /// Number of moves.
    pub fn moves(&self) -> usize {
        self.count(ChangeReason::Moved)
    }
}

impl<K, V> FromIterator<Change<K, V>> for ChangeSet<K, V, ()> {
    fn from_iter<I: IntoIterator<Item = Change<K, V>>>(iter: I) -> Self {
        Self::from_changes(iter.into_iter().collect())
    }
}

impl<K, V, C> IntoIterator for ChangeSet<K, V, C> {
    type Item = Change<K, V>;
    type IntoIter = alloc::vec::IntoIter<Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a ChangeSet<K, V, C> {
    type Item = &'a Change<K, V>;
    type IntoIter = slice::Iter<'a, Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_change_set_new() {
        let cs: ChangeSet<u32, i64> = ChangeSet::new();
        assert!(cs.is_empty());
        assert_eq!(cs.len(), 0);
        assert_eq!(cs, ChangeSet::EMPTY);
    }

    #[test]
    fn test_change_set_counts() {
        let cs: ChangeSet<u32, i64> = vec![
            Change::add(1, 10),
            Change::add(2, 20),
            Change::update(1, 11, 10),
            Change::remove(2, 20),
            Change::refresh(1, 11),
        ]
        .into_iter()
        .collect();

        assert_eq!(cs.len(), 5);
        assert_eq!(cs.adds(), 2);
        assert_eq!(cs.updates(), 1);
        assert_eq!(cs.removes(), 1);
        assert_eq!(cs.refreshes(), 1);
        assert_eq!(cs.moves(), 0);
    }

    #[test]
    fn test_change_set_preserves_order() {
        let mut cs = ChangeSet::new();
        cs.push(Change::add(3, "c"));
        cs.push(Change::add(1, "a"));
        cs.push(Change::remove(3, "c"));

        let keys: Vec<_> = cs.iter().map(|c| *c.key()).collect();
        assert_eq!(keys, vec![3, 1, 3]);
    }

    #[test]
    fn test_change_set_context() {
        let cs = ChangeSet::with_context(vec![Change::add(1, 10)], "ctx");
        assert_eq!(*cs.context(), "ctx");

        let mapped = cs.map_context(|c| c.len());
        assert_eq!(*mapped.context(), 3);

        let plain = mapped.without_context();
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn test_change_set_into_iter() {
        let cs = ChangeSet::from_changes(vec![Change::add(1, 10), Change::add(2, 20)]);
        let mut total = 0;
        for change in &cs {
            total += change.value();
        }
        assert_eq!(total, 30);
        assert_eq!(cs.into_iter().count(), 2);
    }
}
