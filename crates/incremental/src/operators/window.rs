//! Paging and virtualisation over a sorted projection.
//!
//! The window engine keeps the latest full projection published by a sort
//! stage and the slice of it that is currently visible. Every data batch or
//! request change recomputes the slice and diffs it by key against the
//! previous one. The emitted changes apply in sequence: replaying them in
//! order onto the previous slice yields the new one.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::{HashMap, HashSet};
use rivulet_core::{
    Change, ChangeSet, SortReason, SortedChangeSet, WindowRequest, WindowResponse, Windowed,
    WindowedChangeSet,
};

/// Maintains a window over a sorted projection.
pub struct WindowEngine<K, V> {
    request: WindowRequest,
    /// Full projection from the last sorted batch
    all: Arc<[(K, V)]>,
    /// Currently visible slice of `all`
    visible: Vec<(K, V)>,
    response: WindowResponse,
}

impl<K, V> WindowEngine<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an engine over an empty projection.
    pub fn new(request: impl Into<WindowRequest>) -> Self {
        let request = request.into();
        Self {
            request,
            all: Arc::from(Vec::new()),
            visible: Vec::new(),
            response: request.resolve(0),
        }
    }

    /// Returns the active request.
    #[inline]
    pub fn request(&self) -> WindowRequest {
        self.request
    }

    /// Returns the last resolved response.
    #[inline]
    pub fn response(&self) -> WindowResponse {
        self.response
    }

    /// Returns the visible items.
    #[inline]
    pub fn visible_items(&self) -> &[(K, V)] {
        &self.visible
    }

    /// Describes the visible slice as positioned adds, for a new subscriber.
    pub fn snapshot(&self) -> Option<WindowedChangeSet<K, V>> {
        if self.visible.is_empty() {
            return None;
        }
        let changes = self
            .visible
            .iter()
            .enumerate()
            .map(|(i, (k, v))| Change::add_at(k.clone(), v.clone(), i))
            .collect();
        Some(self.emit(changes))
    }

    /// Applies a sorted batch. Returns `None` if the visible slice did not
    /// change.
    pub fn on_data(&mut self, changes: &SortedChangeSet<K, V>) -> Option<WindowedChangeSet<K, V>> {
        self.all = changes.shared_items();
        // A comparer change or reorder keeps every value; other re-adds may
        // carry a new one.
        let readds_keep_values = matches!(
            changes.sort_reason(),
            SortReason::ComparerChanged | SortReason::Reorder
        );
        self.recompute(changes.changes(), readds_keep_values)
    }

    /// Replaces the request. Returns `None` if the visible slice did not
    /// change.
    pub fn on_request(&mut self, request: impl Into<WindowRequest>) -> Option<WindowedChangeSet<K, V>> {
        self.request = request.into();
        self.recompute(&[], true)
    }

    /// Emits, in order: Removes from the highest previous index down, Moved
    /// changes reordering the surviving keys (indices relative to the
    /// survivors), Adds at their new indices, then the upstream value changes
    /// of surviving keys that did not move, at their new indices.
    fn recompute(
        &mut self,
        upstream: &[Change<K, V>],
        readds_keep_values: bool,
    ) -> Option<WindowedChangeSet<K, V>> {
        let total = self.all.len();
        self.response = self.request.resolve(total);
        let start = self.response.start_index.min(total);
        let end = start.saturating_add(self.response.size).min(total);
        let next = self.all[start..end].to_vec();
        let previous = core::mem::replace(&mut self.visible, next);

        let old_positions: HashMap<&K, usize> = previous
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k, i))
            .collect();
        let new_positions: HashMap<&K, usize> = self
            .visible
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (k, i))
            .collect();

        let mut changes = Vec::new();

        for (i, (key, value)) in previous.iter().enumerate().rev() {
            if !new_positions.contains_key(key) {
                changes.push(Change::remove_at(key.clone(), value.clone(), i));
            }
        }

        // Survivors, in their previous order, then in their new order
        let mut survivors: Vec<&K> = previous
            .iter()
            .map(|(k, _)| k)
            .filter(|k| new_positions.contains_key(*k))
            .collect();
        let reordered: Vec<(usize, &K)> = self
            .visible
            .iter()
            .enumerate()
            .filter_map(|(i, (k, _))| old_positions.get(k).map(|_| (i, k)))
            .collect();
        let was: Vec<usize> = reordered
            .iter()
            .map(|(_, k)| old_positions.get(*k).copied().unwrap_or_default())
            .collect();
        let stable = increasing_run(&was);

        let mut moved: HashSet<&K> = HashSet::new();
        for (slot, &(now, key)) in reordered.iter().enumerate() {
            if stable[slot] {
                continue;
            }
            let Some(from) = survivors.iter().position(|k| *k == key) else {
                continue;
            };
            survivors.remove(from);
            let to = match slot.checked_sub(1) {
                Some(before) => {
                    let anchor = reordered[before].1;
                    survivors.iter().position(|k| *k == anchor).map_or(0, |i| i + 1)
                }
                None => 0,
            };
            survivors.insert(to, key);
            moved.insert(key);

            let previous_value = previous[was[slot]].1.clone();
            changes.push(Change::moved(
                key.clone(),
                self.visible[now].1.clone(),
                previous_value,
                to,
                from,
            ));
        }

        for (i, (key, value)) in self.visible.iter().enumerate() {
            if !old_positions.contains_key(key) {
                changes.push(Change::add_at(key.clone(), value.clone(), i));
            }
        }

        for change in upstream {
            let key = change.key();
            if moved.contains(key) || !old_positions.contains_key(key) {
                continue;
            }
            let Some(&now) = new_positions.get(key) else {
                continue;
            };
            match change {
                Change::Update { .. } | Change::Refresh { .. } => {
                    changes.push(change.with_index(Some(now)));
                }
                Change::Moved {
                    key,
                    current,
                    previous,
                    ..
                } => {
                    changes.push(Change::update_at(key.clone(), current.clone(), previous.clone(), now));
                }
                // Removed and re-added upstream while staying visible
                Change::Add { key, current, .. } if !readds_keep_values => {
                    changes.push(Change::refresh_at(key.clone(), current.clone(), now));
                }
                Change::Add { .. } | Change::Remove { .. } => {}
            }
        }

        if changes.is_empty() {
            None
        } else {
            Some(self.emit(changes))
        }
    }

    fn emit(&self, changes: Vec<Change<K, V>>) -> WindowedChangeSet<K, V> {
        ChangeSet::with_context(
            changes,
            Windowed {
                response: self.response,
                items: self.visible.clone(),
            },
        )
    }
}

/// Marks the entries of a longest strictly increasing subsequence of
/// `values`. Survivors on that run keep their place; the others move.
fn increasing_run(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; values.len()];
    for (i, &value) in values.iter().enumerate() {
        let len = tails.partition_point(|&t| values[t] < value);
        if len > 0 {
            parent[i] = Some(tails[len - 1]);
        }
        if len == tails.len() {
            tails.push(i);
        } else {
            tails[len] = i;
        }
    }

    let mut stable = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        stable[i] = true;
        cursor = parent[i];
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::SortEngine;
    use alloc::vec;
    use rivulet_core::{ChangeReason, Comparer, PageRequest, SortOptions, VirtualRequest};

    fn sorter() -> SortEngine<u32, i64> {
        SortEngine::new(Comparer::natural(), SortOptions::default())
    }

    fn adds(items: &[(u32, i64)]) -> ChangeSet<u32, i64> {
        items.iter().map(|&(k, v)| Change::add(k, v)).collect()
    }

    fn visible_keys(window: &WindowEngine<u32, i64>) -> Vec<u32> {
        window.visible_items().iter().map(|(k, _)| *k).collect()
    }

    fn ten() -> Vec<(u32, i64)> {
        (1..=10).map(|i| (i, i as i64 * 10)).collect()
    }

    #[test]
    fn test_page_initial_slice() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(2, 3).unwrap());

        let sorted = sort.process(&adds(&ten())).unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![4, 5, 6]);
        assert_eq!(out.adds(), 3);
        assert_eq!(out.response().page, 2);
        assert_eq!(out.response().pages, 4);
        assert_eq!(out.response().total_size, 10);
        assert_eq!(out.changes()[0], Change::add_at(4, 40, 0));
    }

    #[test]
    fn test_insert_before_window_shifts_contents() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(2, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort.process(&adds(&[(11, 5)])).unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![3, 4, 5]);
        assert_eq!(out.changes(), &[Change::remove_at(6, 60, 2), Change::add_at(3, 30, 0)]);
        assert_eq!(out.response().pages, 4);
    }

    #[test]
    fn test_change_outside_window_is_silent() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![Change::update(9, 95, 90)]))
            .unwrap();
        assert!(window.on_data(&sorted).is_none());
    }

    #[test]
    fn test_update_inside_window_uses_relative_index() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(2, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![Change::update(5, 51, 50)]))
            .unwrap();
        let out = window.on_data(&sorted).unwrap();
        assert_eq!(out.changes(), &[Change::update_at(5, 51, 50, 1)]);
    }

    #[test]
    fn test_move_within_window() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 5).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![Change::update(1, 45, 10)]))
            .unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![2, 3, 4, 1, 5]);
        assert_eq!(out.changes(), &[Change::moved(1, 45, 10, 3, 0)]);
    }

    #[test]
    fn test_move_out_of_window() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![Change::update(2, 999, 20)]))
            .unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![1, 3, 4]);
        assert_eq!(out.changes(), &[Change::remove_at(2, 20, 1), Change::add_at(4, 40, 2)]);
    }

    #[test]
    fn test_request_change_pages_forward() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 4).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let out = window.on_request(PageRequest::new(3, 4).unwrap()).unwrap();
        assert_eq!(visible_keys(&window), vec![9, 10]);
        assert_eq!(out.removes(), 4);
        assert_eq!(out.adds(), 2);
        assert_eq!(out.response().page, 3);

        // Same window again: nothing to say
        assert!(window.on_request(PageRequest::new(3, 4).unwrap()).is_none());
    }

    #[test]
    fn test_page_beyond_end_clamps() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(99, 4).unwrap());
        let out = window.on_data(&sort.process(&adds(&ten())).unwrap()).unwrap();

        assert_eq!(out.response().page, 3);
        assert_eq!(visible_keys(&window), vec![9, 10]);
    }

    #[test]
    fn test_virtual_window() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(VirtualRequest::new(2, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());
        assert_eq!(visible_keys(&window), vec![3, 4, 5]);

        let out = window.on_request(VirtualRequest::new(3, 3).unwrap()).unwrap();
        assert_eq!(visible_keys(&window), vec![4, 5, 6]);
        assert_eq!(out.changes(), &[Change::remove_at(3, 30, 0), Change::add_at(6, 60, 2)]);
        assert_eq!(out.response().start_index, 3);
    }

    #[test]
    fn test_virtual_window_past_end_is_empty() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(VirtualRequest::new(50, 3).unwrap());
        assert!(window.on_data(&sort.process(&adds(&ten())).unwrap()).is_none());
        assert!(window.visible_items().is_empty());
        assert_eq!(window.response().total_size, 10);
    }

    #[test]
    fn test_reset_batch_is_diffed() {
        let mut sort = SortEngine::new(
            Comparer::natural(),
            SortOptions::default().with_reset_threshold(2),
        );
        let mut window = WindowEngine::new(PageRequest::new(1, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort.change_comparer(Comparer::natural().reverse()).unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![10, 9, 8]);
        assert!(out
            .iter()
            .all(|c| matches!(c.reason(), ChangeReason::Add | ChangeReason::Remove)));
    }

    fn replay_positioned(slice: &mut Vec<(u32, i64)>, changes: &[Change<u32, i64>]) {
        for change in changes {
            match change {
                Change::Add { key, current, index } => slice.insert(index.unwrap(), (*key, *current)),
                Change::Remove { index, .. } => {
                    slice.remove(index.unwrap());
                }
                Change::Update { key, current, index, .. } | Change::Refresh { key, current, index } => {
                    slice[index.unwrap()] = (*key, *current);
                }
                Change::Moved {
                    key,
                    current,
                    current_index,
                    previous_index,
                    ..
                } => {
                    slice.remove(*previous_index);
                    slice.insert(*current_index, (*key, *current));
                }
            }
        }
    }

    #[test]
    fn test_remove_and_move_replays_in_order() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 3).unwrap());
        window.on_data(&sort.process(&adds(&[(1, 10), (2, 20), (3, 30), (4, 40)])).unwrap());
        let mut slice = window.visible_items().to_vec();

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![
                Change::remove(1, 10),
                Change::update(3, 15, 30),
            ]))
            .unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(
            out.changes(),
            &[
                Change::remove_at(1, 10, 0),
                Change::moved(3, 15, 30, 0, 1),
                Change::add_at(4, 40, 2),
            ]
        );
        replay_positioned(&mut slice, out.changes());
        assert_eq!(slice, vec![(3, 15), (2, 20), (4, 40)]);
        assert_eq!(slice, window.visible_items());
    }

    #[test]
    fn test_reversed_comparer_emits_moves_only() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 4).unwrap());
        window.on_data(&sort.process(&adds(&[(1, 10), (2, 20), (3, 30), (4, 40)])).unwrap());
        let mut slice = window.visible_items().to_vec();

        let sorted = sort.change_comparer(Comparer::natural().reverse()).unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(out.moves(), 3);
        assert_eq!(out.updates(), 0);
        assert_eq!(out.adds() + out.removes() + out.refreshes(), 0);
        assert_eq!(
            out.changes(),
            &[
                Change::moved(4, 40, 40, 0, 3),
                Change::moved(3, 30, 30, 1, 3),
                Change::moved(2, 20, 20, 2, 3),
            ]
        );
        replay_positioned(&mut slice, out.changes());
        assert_eq!(slice, window.visible_items());
        assert_eq!(visible_keys(&window), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_readd_inside_window_is_refresh() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 3).unwrap());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let sorted = sort
            .process(&ChangeSet::from_changes(vec![Change::remove(2, 20), Change::add(2, 20)]))
            .unwrap();
        let out = window.on_data(&sorted).unwrap();

        assert_eq!(visible_keys(&window), vec![1, 2, 3]);
        assert_eq!(out.changes(), &[Change::refresh_at(2, 20, 1)]);
    }

    #[test]
    fn test_snapshot() {
        let mut sort = sorter();
        let mut window = WindowEngine::new(PageRequest::new(1, 2).unwrap());
        assert!(window.snapshot().is_none());
        window.on_data(&sort.process(&adds(&ten())).unwrap());

        let snapshot = window.snapshot().unwrap();
        assert_eq!(snapshot.changes(), &[Change::add_at(1, 10, 0), Change::add_at(2, 20, 1)]);
    }
}
