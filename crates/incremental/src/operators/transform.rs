//! Incremental transform operator.

use alloc::vec::Vec;
use core::hash::Hash;
use core::marker::PhantomData;
use hashbrown::HashMap;
use rivulet_core::{Change, ChangeSet};

/// Maps every value of a keyed stream through a fallible function.
///
/// The engine keeps the transformed value of every key so that removals and
/// updates can report the previously transformed value without invoking the
/// function again.
pub struct TransformEngine<K, V, U, F> {
    transform: F,
    transformed: HashMap<K, U>,
    transform_on_refresh: bool,
    _source: PhantomData<fn(&V)>,
}

impl<K, V, U, F> TransformEngine<K, V, U, F>
where
    K: Eq + Hash + Clone,
    U: Clone,
{
    /// Creates a transform. Refreshes are forwarded with the cached value.
    pub fn new(transform: F) -> Self {
        Self {
            transform,
            transformed: HashMap::new(),
            transform_on_refresh: false,
            _source: PhantomData,
        }
    }

    /// Re-runs the function on refresh and emits an update instead.
    pub fn transform_on_refresh(mut self) -> Self {
        self.transform_on_refresh = true;
        self
    }

    /// Returns the cached transformed value for a key.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&U> {
        self.transformed.get(key)
    }

    /// Returns the number of transformed keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.transformed.len()
    }

    /// Returns true if no key has been transformed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transformed.is_empty()
    }

    /// Transforms a batch, stopping at the first failure.
    ///
    /// Changes before the failing one have already been applied to the
    /// cached state; callers are expected to treat the stream as faulted.
    pub fn process<C, E>(&mut self, changes: &ChangeSet<K, V, C>) -> Result<ChangeSet<K, U>, E>
    where
        F: Fn(&K, &V) -> Result<U, E>,
    {
        let mut output = Vec::with_capacity(changes.len());
        for change in changes {
            if let Some(out) = self.apply(change)? {
                output.push(out);
            }
        }
        Ok(ChangeSet::from_changes(output))
    }

    /// Transforms a batch, routing failures to `on_error` and skipping the
    /// failing change.
    pub fn process_safe<C, E, H>(&mut self, changes: &ChangeSet<K, V, C>, mut on_error: H) -> ChangeSet<K, U>
    where
        F: Fn(&K, &V) -> Result<U, E>,
        H: FnMut(&Change<K, V>, E),
    {
        let mut output = Vec::with_capacity(changes.len());
        for change in changes {
            match self.apply(change) {
                Ok(Some(out)) => output.push(out),
                Ok(None) => {}
                Err(err) => on_error(change, err),
            }
        }
        ChangeSet::from_changes(output)
    }

    fn apply<E>(&mut self, change: &Change<K, V>) -> Result<Option<Change<K, U>>, E>
    where
        F: Fn(&K, &V) -> Result<U, E>,
    {
        let out = match change {
            Change::Add { key, current, .. }
            | Change::Update { key, current, .. }
            | Change::Moved { key, current, .. } => Some(self.store(key, current)?),
            Change::Refresh { key, current, .. } => {
                if self.transform_on_refresh {
                    Some(self.store(key, current)?)
                } else {
                    self.transformed
                        .get(key)
                        .map(|value| Change::refresh(key.clone(), value.clone()))
                }
            }
            Change::Remove { key, .. } => self
                .transformed
                .remove(key)
                .map(|previous| Change::remove(key.clone(), previous)),
        };
        Ok(out)
    }

    fn store<E>(&mut self, key: &K, current: &V) -> Result<Change<K, U>, E>
    where
        F: Fn(&K, &V) -> Result<U, E>,
    {
        let value = (self.transform)(key, current)?;
        Ok(match self.transformed.insert(key.clone(), value.clone()) {
            Some(previous) => Change::update(key.clone(), value, previous),
            None => Change::add(key.clone(), value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;

    fn checked_label(_: &u32, v: &i64) -> Result<String, &'static str> {
        if *v < 0 {
            Err("negative")
        } else {
            Ok(format!("#{v}"))
        }
    }

    #[test]
    fn test_transform_add_update_remove() {
        let mut transform = TransformEngine::new(checked_label);
        let out = transform
            .process(&ChangeSet::from_changes(vec![Change::add(1, 10), Change::add(2, 20)]))
            .unwrap();
        assert_eq!(out.changes()[0], Change::add(1, String::from("#10")));

        let out = transform
            .process(&ChangeSet::from_changes(vec![
                Change::update(1, 11, 10),
                Change::remove(2, 20),
            ]))
            .unwrap();
        assert_eq!(
            out.changes(),
            &[
                Change::update(1, String::from("#11"), String::from("#10")),
                Change::remove(2, String::from("#20")),
            ]
        );
        assert_eq!(transform.len(), 1);
    }

    #[test]
    fn test_transform_refresh_uses_cache() {
        let mut transform = TransformEngine::new(checked_label);
        let _ = transform.process(&ChangeSet::from_changes(vec![Change::add(1, 10)]));

        let out = transform
            .process(&ChangeSet::from_changes(vec![Change::refresh(1, 99)]))
            .unwrap();
        assert_eq!(out.changes(), &[Change::refresh(1, String::from("#10"))]);
    }

    #[test]
    fn test_transform_on_refresh() {
        let mut transform = TransformEngine::new(checked_label).transform_on_refresh();
        let _ = transform.process(&ChangeSet::from_changes(vec![Change::add(1, 10)]));

        let out = transform
            .process(&ChangeSet::from_changes(vec![Change::refresh(1, 99)]))
            .unwrap();
        assert_eq!(out.updates(), 1);
        assert_eq!(transform.get(&1).map(String::as_str), Some("#99"));
    }

    #[test]
    fn test_transform_error_is_fatal() {
        let mut transform = TransformEngine::new(checked_label);
        let err = transform
            .process(&ChangeSet::from_changes(vec![Change::add(1, 10), Change::add(2, -1)]))
            .unwrap_err();
        assert_eq!(err, "negative");
    }

    #[test]
    fn test_transform_safe_skips_failures() {
        let mut transform = TransformEngine::new(checked_label);
        let mut failures = Vec::new();

        let out = transform.process_safe(
            &ChangeSet::from_changes(vec![Change::add(1, 10), Change::add(2, -1), Change::add(3, 30)]),
            |change, err| failures.push((*change.key(), err)),
        );

        assert_eq!(out.adds(), 2);
        assert_eq!(failures, vec![(2, "negative")]);
        assert!(transform.get(&2).is_none());
    }

    #[test]
    fn test_transform_drops_indices() {
        let mut transform = TransformEngine::new(checked_label);
        let out = transform
            .process(&ChangeSet::from_changes(vec![Change::add_at(1, 10, 4)]))
            .unwrap();
        assert_eq!(out.changes()[0].current_index(), None);
    }
}
