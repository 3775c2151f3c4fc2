//! Incremental sort operator.
//!
//! The engine owns an ordered projection of a keyed stream and translates
//! raw Add/Update/Remove/Refresh changes into positioned changes. Batches
//! larger than the reset threshold, comparer changes and explicit reorders
//! bypass per-item positioning and rebuild the projection from scratch.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::hash::Hash;
use hashbrown::{HashMap, HashSet};
use rivulet_core::{Change, ChangeSet, Comparer, SortOptions, SortReason, Sorted, SortedChangeSet};

/// Maintains a sorted projection of a keyed collection.
pub struct SortEngine<K, V> {
    comparer: Comparer<V>,
    options: SortOptions,
    /// The projection, ordered by `comparer`
    sorted: Vec<(K, V)>,
    /// Key -> value currently held in `sorted`
    values: HashMap<K, V>,
}

impl<K, V> SortEngine<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an engine with an empty projection.
    pub fn new(comparer: Comparer<V>, options: SortOptions) -> Self {
        Self {
            comparer,
            options,
            sorted: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Returns the active comparer.
    #[inline]
    pub fn comparer(&self) -> &Comparer<V> {
        &self.comparer
    }

    /// Returns the engine options.
    #[inline]
    pub fn options(&self) -> &SortOptions {
        &self.options
    }

    /// Returns the ordered projection.
    #[inline]
    pub fn sorted_items(&self) -> &[(K, V)] {
        &self.sorted
    }

    /// Returns the number of items in the projection.
    #[inline]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Returns true if the projection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Returns the position of a key.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        let stored = self.values.get(key)?;
        self.locate(key, stored)
    }

    /// Describes the current projection as positioned adds, for a new
    /// subscriber. Returns `None` when the projection is empty.
    pub fn snapshot(&self) -> Option<SortedChangeSet<K, V>> {
        if self.sorted.is_empty() {
            return None;
        }
        let changes = self
            .sorted
            .iter()
            .enumerate()
            .map(|(i, (k, v))| Change::add_at(k.clone(), v.clone(), i))
            .collect();
        Some(self.emit(changes, SortReason::InitialLoad))
    }

    /// Applies one upstream batch, returning the positioned changes.
    ///
    /// Returns `None` when the batch leaves the projection untouched.
    pub fn process<C>(&mut self, changes: &ChangeSet<K, V, C>) -> Option<SortedChangeSet<K, V>> {
        if changes.is_empty() {
            return None;
        }
        if self.sorted.is_empty() {
            return self.initial_load(changes);
        }
        if self.options.exceeds_threshold(changes.len()) {
            return Some(self.reset(changes));
        }

        let mut output = Vec::new();
        for change in changes {
            match change {
                Change::Add { key, current, .. }
                | Change::Update { key, current, .. }
                | Change::Moved { key, current, .. } => {
                    if self.values.contains_key(key) {
                        self.update_item(key, current, &mut output);
                    } else {
                        self.insert_item(key, current, &mut output);
                    }
                }
                Change::Remove { key, .. } => self.remove_item(key, &mut output),
                Change::Refresh { key, current, .. } => {
                    if !self.options.optimisations.ignore_refresh && self.values.contains_key(key) {
                        self.refresh_item(key, current, &mut output);
                    }
                }
            }
        }

        if output.is_empty() {
            None
        } else {
            Some(self.emit(output, SortReason::DataChanged))
        }
    }

    /// Replaces the comparer and re-sorts the whole projection.
    ///
    /// Returns `None` when the new order equals the old one.
    pub fn change_comparer(&mut self, comparer: Comparer<V>) -> Option<SortedChangeSet<K, V>> {
        self.comparer = comparer;
        self.resort(SortReason::ComparerChanged)
    }

    /// Re-sorts the projection with the current comparer, picking up values
    /// whose ordering fields changed in place.
    pub fn reorder(&mut self) -> Option<SortedChangeSet<K, V>> {
        self.resort(SortReason::Reorder)
    }

    fn initial_load<C>(&mut self, changes: &ChangeSet<K, V, C>) -> Option<SortedChangeSet<K, V>> {
        self.sorted = self.rebuild(changes);
        if self.sorted.is_empty() {
            return None;
        }
        let added = self
            .sorted
            .iter()
            .enumerate()
            .map(|(i, (k, v))| Change::add_at(k.clone(), v.clone(), i))
            .collect();
        Some(self.emit(added, SortReason::InitialLoad))
    }

    fn reset<C>(&mut self, changes: &ChangeSet<K, V, C>) -> SortedChangeSet<K, V> {
        let rebuilt = self.rebuild(changes);
        let previous = core::mem::replace(&mut self.sorted, rebuilt);
        self.replacement(previous, SortReason::Reset)
    }

    fn resort(&mut self, reason: SortReason) -> Option<SortedChangeSet<K, V>> {
        let mut items = self.sorted.clone();
        items.sort_by(|a, b| self.comparer.compare(&a.1, &b.1));
        let unchanged = items
            .iter()
            .zip(self.sorted.iter())
            .all(|(a, b)| a.0 == b.0);
        if unchanged {
            return None;
        }
        let previous = core::mem::replace(&mut self.sorted, items);
        Some(self.replacement(previous, reason))
    }

    /// Applies a batch to the key → value map and sorts the survivors.
    ///
    /// Surviving keys keep their previous relative order, new keys follow in
    /// batch order, and the stable sort preserves that order among equals.
    fn rebuild<C>(&mut self, changes: &ChangeSet<K, V, C>) -> Vec<(K, V)> {
        let mut order: Vec<K> = self.sorted.iter().map(|(k, _)| k.clone()).collect();
        for change in changes {
            match change {
                Change::Add { key, current, .. }
                | Change::Update { key, current, .. }
                | Change::Moved { key, current, .. } => {
                    if self.values.insert(key.clone(), current.clone()).is_none() {
                        order.push(key.clone());
                    }
                }
                Change::Refresh { key, current, .. } => {
                    if let Some(value) = self.values.get_mut(key) {
                        *value = current.clone();
                    }
                }
                Change::Remove { key, .. } => {
                    self.values.remove(key);
                }
            }
        }

        let mut seen = HashSet::with_capacity(order.len());
        let mut items: Vec<(K, V)> = order
            .into_iter()
            .filter_map(|k| {
                let value = self.values.get(&k)?.clone();
                seen.insert(k.clone()).then_some((k, value))
            })
            .collect();
        items.sort_by(|a, b| self.comparer.compare(&a.1, &b.1));
        items
    }

    /// Expresses a full replacement: every previous item is removed from the
    /// last index down, then every current item is added in order.
    fn replacement(&self, previous: Vec<(K, V)>, reason: SortReason) -> SortedChangeSet<K, V> {
        let mut changes = Vec::with_capacity(previous.len() + self.sorted.len());
        changes.extend(
            previous
                .into_iter()
                .enumerate()
                .rev()
                .map(|(i, (k, v))| Change::remove_at(k, v, i)),
        );
        changes.extend(
            self.sorted
                .iter()
                .enumerate()
                .map(|(i, (k, v))| Change::add_at(k.clone(), v.clone(), i)),
        );
        self.emit(changes, reason)
    }

    fn insert_item(&mut self, key: &K, current: &V, output: &mut Vec<Change<K, V>>) {
        let index = self.insertion_index(current);
        self.sorted.insert(index, (key.clone(), current.clone()));
        self.values.insert(key.clone(), current.clone());
        output.push(Change::add_at(key.clone(), current.clone(), index));
    }

    fn update_item(&mut self, key: &K, current: &V, output: &mut Vec<Change<K, V>>) {
        let Some(previous) = self.values.get(key).cloned() else {
            return;
        };
        let Some(index) = self.locate(key, &previous) else {
            self.values.remove(key);
            self.insert_item(key, current, output);
            return;
        };
        self.values.insert(key.clone(), current.clone());

        if self.fits_at(index, current) {
            self.sorted[index].1 = current.clone();
            output.push(Change::update_at(key.clone(), current.clone(), previous, index));
            return;
        }

        self.sorted.remove(index);
        let target = self.insertion_index(current);
        self.sorted.insert(target, (key.clone(), current.clone()));
        if target == index {
            output.push(Change::update_at(key.clone(), current.clone(), previous, index));
        } else {
            output.push(Change::moved(key.clone(), current.clone(), previous, target, index));
        }
    }

    fn refresh_item(&mut self, key: &K, current: &V, output: &mut Vec<Change<K, V>>) {
        // The ordering fields may have changed in place, so the stored value
        // cannot be trusted for a binary search.
        let Some(index) = self.sorted.iter().position(|(k, _)| k == key) else {
            return;
        };
        self.values.insert(key.clone(), current.clone());

        if self.fits_at(index, current) {
            self.sorted[index].1 = current.clone();
            output.push(Change::refresh_at(key.clone(), current.clone(), index));
            return;
        }

        self.sorted.remove(index);
        let target = self.insertion_index(current);
        self.sorted.insert(target, (key.clone(), current.clone()));
        if target == index {
            output.push(Change::refresh_at(key.clone(), current.clone(), index));
        } else {
            output.push(Change::moved(
                key.clone(),
                current.clone(),
                current.clone(),
                target,
                index,
            ));
        }
    }

    fn remove_item(&mut self, key: &K, output: &mut Vec<Change<K, V>>) {
        let Some(stored) = self.values.get(key).cloned() else {
            return;
        };
        let located = self.locate(key, &stored);
        self.values.remove(key);
        if let Some(index) = located {
            let (k, v) = self.sorted.remove(index);
            output.push(Change::remove_at(k, v, index));
        }
    }

    /// Returns true if `value` is still ordered between the neighbours of
    /// the item at `index`.
    fn fits_at(&self, index: usize, value: &V) -> bool {
        let after_previous =
            index == 0 || !self.comparer.is_greater(&self.sorted[index - 1].1, value);
        let before_next = index + 1 >= self.sorted.len()
            || !self.comparer.is_greater(value, &self.sorted[index + 1].1);
        after_previous && before_next
    }

    /// Position at which `value` is inserted: after every item that does
    /// not compare greater.
    fn insertion_index(&self, value: &V) -> usize {
        if self.options.optimisations.compares_immutable_values_only {
            self.sorted
                .partition_point(|(_, v)| !self.comparer.is_greater(v, value))
        } else {
            self.sorted
                .iter()
                .position(|(_, v)| self.comparer.is_greater(v, value))
                .unwrap_or(self.sorted.len())
        }
    }

    /// Finds the current position of `key`, whose projected value is `stored`.
    fn locate(&self, key: &K, stored: &V) -> Option<usize> {
        if self.options.optimisations.compares_immutable_values_only {
            let start = self
                .sorted
                .partition_point(|(_, v)| self.comparer.compare(v, stored) == Ordering::Less);
            for (offset, (k, v)) in self.sorted[start..].iter().enumerate() {
                if k == key {
                    return Some(start + offset);
                }
                if self.comparer.compare(v, stored) != Ordering::Equal {
                    break;
                }
            }
        }
        self.sorted.iter().position(|(k, _)| k == key)
    }

    fn emit(&self, changes: Vec<Change<K, V>>, reason: SortReason) -> SortedChangeSet<K, V> {
        ChangeSet::with_context(
            changes,
            Sorted {
                reason,
                items: self.sorted.as_slice().into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use rivulet_core::{ChangeReason, SortOptimisations};

    type Item = (u32, i64);

    fn by_value() -> Comparer<i64> {
        Comparer::natural()
    }

    fn engine(optimised: bool) -> SortEngine<u32, i64> {
        let mut options = SortOptions::default();
        if optimised {
            options = options.with_optimisations(SortOptimisations::NONE.compares_immutable_values_only());
        }
        SortEngine::new(by_value(), options)
    }

    fn adds(items: &[Item]) -> ChangeSet<u32, i64> {
        items.iter().map(|&(k, v)| Change::add(k, v)).collect()
    }

    fn keys(engine: &SortEngine<u32, i64>) -> Vec<u32> {
        engine.sorted_items().iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_initial_load_sorts() {
        for optimised in [false, true] {
            let mut sort = engine(optimised);
            let out = sort.process(&adds(&[(3, 30), (1, 10), (2, 20)])).unwrap();

            assert_eq!(out.sort_reason(), SortReason::InitialLoad);
            assert_eq!(keys(&sort), vec![1, 2, 3]);
            assert_eq!(out.changes()[0], Change::add_at(1, 10, 0));
            assert_eq!(out.changes()[2], Change::add_at(3, 30, 2));
        }
    }

    #[test]
    fn test_incremental_adds_report_positions() {
        for optimised in [false, true] {
            let mut sort = engine(optimised);
            sort.process(&adds(&[(3, 30)]));
            let out = sort.process(&adds(&[(1, 10)])).unwrap();
            assert_eq!(out.changes(), &[Change::add_at(1, 10, 0)]);

            let out = sort.process(&adds(&[(2, 20)])).unwrap();
            assert_eq!(out.sort_reason(), SortReason::DataChanged);
            assert_eq!(out.changes(), &[Change::add_at(2, 20, 1)]);
            assert_eq!(
                out.sorted_items(),
                &[(1, 10), (2, 20), (3, 30)]
            );
        }
    }

    #[test]
    fn test_remove_reports_index() {
        for optimised in [false, true] {
            let mut sort = engine(optimised);
            sort.process(&adds(&[(1, 10), (2, 20), (3, 30)]));

            let out = sort
                .process(&ChangeSet::from_changes(vec![Change::remove(2, 20)]))
                .unwrap();
            assert_eq!(out.changes(), &[Change::remove_at(2, 20, 1)]);
            assert_eq!(keys(&sort), vec![1, 3]);
        }
    }

    #[test]
    fn test_remove_unknown_key_is_ignored() {
        let mut sort = engine(false);
        sort.process(&adds(&[(1, 10)]));
        let out = sort.process(&ChangeSet::from_changes(vec![Change::remove(9, 90)]));
        assert!(out.is_none());
    }

    #[test]
    fn test_update_that_moves_emits_moved() {
        for optimised in [false, true] {
            let mut sort = engine(optimised);
            sort.process(&adds(&[(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)]));

            let out = sort
                .process(&ChangeSet::from_changes(vec![Change::update(2, 45, 20)]))
                .unwrap();

            assert_eq!(out.changes(), &[Change::moved(2, 45, 20, 3, 1)]);
            assert_eq!(keys(&sort), vec![1, 3, 4, 2, 5]);
            assert_eq!(sort.index_of(&2), Some(3));
        }
    }

    #[test]
    fn test_update_in_place_emits_update_only() {
        for optimised in [false, true] {
            let mut sort = engine(optimised);
            sort.process(&adds(&[(1, 10), (2, 20), (3, 30)]));

            let out = sort
                .process(&ChangeSet::from_changes(vec![Change::update(2, 25, 20)]))
                .unwrap();

            assert_eq!(out.len(), 1);
            assert_eq!(out.moves(), 0);
            assert_eq!(out.changes()[0], Change::update_at(2, 25, 20, 1));
        }
    }

    #[test]
    fn test_refresh_repositions() {
        let mut sort = engine(false);
        sort.process(&adds(&[(1, 10), (2, 20), (3, 30)]));

        let out = sort
            .process(&ChangeSet::from_changes(vec![Change::refresh(1, 35)]))
            .unwrap();
        assert_eq!(out.changes(), &[Change::moved(1, 35, 35, 2, 0)]);

        let out = sort
            .process(&ChangeSet::from_changes(vec![Change::refresh(1, 35)]))
            .unwrap();
        assert_eq!(out.changes(), &[Change::refresh_at(1, 35, 2)]);
    }

    #[test]
    fn test_ignore_refresh() {
        let options = SortOptions::default()
            .with_optimisations(SortOptimisations::NONE.ignore_refresh());
        let mut sort = SortEngine::new(by_value(), options);
        sort.process(&adds(&[(1, 10), (2, 20)]));

        let out = sort.process(&ChangeSet::from_changes(vec![Change::refresh(1, 99)]));
        assert!(out.is_none());
        assert_eq!(keys(&sort), vec![1, 2]);
    }

    #[test]
    fn test_batch_over_threshold_resets() {
        let options = SortOptions::default().with_reset_threshold(3);
        let mut sort = SortEngine::new(by_value(), options);
        sort.process(&adds(&[(1, 10), (2, 20)]));

        let batch = ChangeSet::from_changes(vec![
            Change::add(3, 5),
            Change::update(1, 50, 10),
            Change::remove(2, 20),
            Change::add(4, 1),
        ]);
        let out = sort.process(&batch).unwrap();

        assert_eq!(out.sort_reason(), SortReason::Reset);
        assert_eq!(out.moves(), 0);
        assert_eq!(out.removes(), 2);
        assert_eq!(out.adds(), 3);
        assert_eq!(out.changes()[0], Change::remove_at(2, 20, 1));
        assert_eq!(out.changes()[1], Change::remove_at(1, 10, 0));
        assert_eq!(keys(&sort), vec![4, 3, 1]);
    }

    #[test]
    fn test_reset_with_remove_and_readd_has_no_duplicates() {
        let options = SortOptions::default().with_reset_threshold(1);
        let mut sort = SortEngine::new(by_value(), options);
        sort.process(&adds(&[(1, 10), (2, 20)]));

        let batch = ChangeSet::from_changes(vec![Change::remove(1, 10), Change::add(1, 30)]);
        sort.process(&batch);
        assert_eq!(keys(&sort), vec![2, 1]);
    }

    #[test]
    fn test_change_comparer() {
        let mut sort = engine(false);
        sort.process(&adds(&[(1, 10), (2, 20), (3, 30)]));

        let out = sort.change_comparer(by_value().reverse()).unwrap();
        assert_eq!(out.sort_reason(), SortReason::ComparerChanged);
        assert_eq!(keys(&sort), vec![3, 2, 1]);
        assert_eq!(out.removes(), 3);
        assert_eq!(out.adds(), 3);
        assert_eq!(out.changes()[3], Change::add_at(3, 30, 0));
    }

    #[test]
    fn test_change_comparer_same_order_is_silent() {
        let mut sort = engine(false);
        sort.process(&adds(&[(1, 10), (2, 20)]));
        assert!(sort.change_comparer(by_value()).is_none());
        assert!(sort.reorder().is_none());
    }

    #[test]
    fn test_snapshot() {
        let mut sort = engine(false);
        assert!(sort.snapshot().is_none());
        sort.process(&adds(&[(2, 20), (1, 10)]));

        let snapshot = sort.snapshot().unwrap();
        assert_eq!(snapshot.sort_reason(), SortReason::InitialLoad);
        assert!(snapshot.iter().all(|c| c.reason() == ChangeReason::Add));
        assert_eq!(snapshot.changes()[0].current_index(), Some(0));
    }

    #[test]
    fn test_binary_search_with_duplicate_values() {
        let mut sort = engine(true);
        sort.process(&adds(&[(1, 10), (2, 10), (3, 10), (4, 20)]));

        let out = sort
            .process(&ChangeSet::from_changes(vec![Change::remove(3, 10)]))
            .unwrap();
        assert_eq!(out.changes(), &[Change::remove_at(3, 10, 2)]);
        assert_eq!(keys(&sort), vec![1, 2, 4]);
    }
}
