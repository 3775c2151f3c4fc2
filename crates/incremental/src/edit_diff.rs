//! Minimal diff between a keyed collection and a replacement item set.

use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashMap;
use rivulet_core::Change;

/// Computes the changes that turn `current` into `items`.
///
/// Each incoming item is classified in O(1) amortised time against a map of
/// the old keys: absent means Add, present but unequal means Update, present
/// and equal means no change. Old keys left over after the pass are removed.
/// When `items` repeats a key, the last value wins.
///
/// Adds and updates follow the order of first appearance in `items`;
/// removals follow, in the iteration order of `current`.
pub fn edit_diff<K, V, I, E>(current: &HashMap<K, V>, items: I, are_equal: E) -> Vec<Change<K, V>>
where
    K: Eq + Hash + Clone,
    V: Clone,
    I: IntoIterator<Item = (K, V)>,
    E: Fn(&V, &V) -> bool,
{
    let mut order = Vec::new();
    let mut latest: HashMap<K, V> = HashMap::new();
    for (key, value) in items {
        if latest.insert(key.clone(), value).is_none() {
            order.push(key);
        }
    }

    let mut old: HashMap<&K, &V> = current.iter().collect();
    let mut changes = Vec::new();

    for key in order {
        let Some(value) = latest.remove(&key) else {
            continue;
        };
        match old.remove(&key) {
            None => changes.push(Change::add(key, value)),
            Some(previous) if !are_equal(previous, &value) => {
                changes.push(Change::update(key, value, previous.clone()));
            }
            Some(_) => {}
        }
    }

    for (key, previous) in current {
        if old.contains_key(key) {
            changes.push(Change::remove(key.clone(), previous.clone()));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use rivulet_core::ChangeReason;

    fn current(pairs: &[(u32, i64)]) -> HashMap<u32, i64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_edit_diff_classifies() {
        let old = current(&[(1, 10), (2, 20), (3, 30)]);
        let new = vec![(1, 10), (2, 21), (4, 40)];

        let changes = edit_diff(&old, new, |a, b| a == b);

        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0], Change::update(2, 21, 20));
        assert_eq!(changes[1], Change::add(4, 40));
        assert_eq!(changes[2], Change::remove(3, 30));
    }

    #[test]
    fn test_edit_diff_identical_is_empty() {
        let old = current(&[(1, 10), (2, 20)]);
        let changes = edit_diff(&old, vec![(2, 20), (1, 10)], |a, b| a == b);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_edit_diff_from_empty() {
        let old = HashMap::new();
        let changes = edit_diff(&old, vec![(1, 10), (2, 20)], |a: &i64, b| a == b);
        assert!(changes.iter().all(|c| c.reason() == ChangeReason::Add));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_edit_diff_to_empty() {
        let old = current(&[(1, 10), (2, 20)]);
        let changes = edit_diff(&old, Vec::new(), |a, b| a == b);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.is_remove()));
    }

    #[test]
    fn test_edit_diff_duplicate_keys_last_wins() {
        let old = current(&[(1, 10)]);
        let changes = edit_diff(&old, vec![(1, 99), (2, 5), (1, 10)], |a, b| a == b);
        assert_eq!(changes, vec![Change::add(2, 5)]);
    }

    #[test]
    fn test_edit_diff_custom_equality() {
        let old = current(&[(1, 10)]);
        // Treat values within the same decade as equal
        let changes = edit_diff(&old, vec![(1, 15)], |a, b| a / 10 == b / 10);
        assert!(changes.is_empty());
    }
}
