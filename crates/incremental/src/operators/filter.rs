//! Incremental filter operator.

use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashSet;
use rivulet_core::{Change, ChangeSet};

/// Keeps the subset of a keyed stream whose values satisfy a predicate.
///
/// The engine remembers which keys it has let through, so an update that
/// crosses the predicate boundary is re-expressed as an Add or a Remove, and
/// a refresh re-evaluates inclusion.
pub struct FilterEngine<K, V, P> {
    predicate: P,
    included: HashSet<K>,
    _value: core::marker::PhantomData<fn(&V)>,
}

impl<K, V, P> FilterEngine<K, V, P>
where
    K: Eq + Hash + Clone,
    V: Clone,
    P: Fn(&V) -> bool,
{
    /// Creates a new filter.
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            included: HashSet::new(),
            _value: core::marker::PhantomData,
        }
    }

    /// Returns the number of keys currently passing the filter.
    #[inline]
    pub fn len(&self) -> usize {
        self.included.len()
    }

    /// Returns true if no key passes the filter.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Filters one batch. Indices are dropped: a filtered stream is keyed,
    /// not positional.
    pub fn process<C>(&mut self, changes: &ChangeSet<K, V, C>) -> ChangeSet<K, V> {
        let mut output = Vec::new();
        for change in changes {
            match change {
                Change::Add { key, current, .. } | Change::Refresh { key, current, .. } => {
                    self.reevaluate(key, current, None, change.is_add(), &mut output);
                }
                Change::Update {
                    key,
                    current,
                    previous,
                    ..
                }
                | Change::Moved {
                    key,
                    current,
                    previous,
                    ..
                } => {
                    self.reevaluate(key, current, Some(previous), false, &mut output);
                }
                Change::Remove { key, previous, .. } => {
                    if self.included.remove(key) {
                        output.push(Change::remove(key.clone(), previous.clone()));
                    }
                }
            }
        }
        ChangeSet::from_changes(output)
    }

    fn reevaluate(
        &mut self,
        key: &K,
        current: &V,
        previous: Option<&V>,
        is_add: bool,
        output: &mut Vec<Change<K, V>>,
    ) {
        let passes = (self.predicate)(current);
        let was_included = self.included.contains(key);
        match (was_included, passes) {
            (false, true) => {
                self.included.insert(key.clone());
                output.push(Change::add(key.clone(), current.clone()));
            }
            (true, true) => match previous {
                Some(previous) => {
                    output.push(Change::update(key.clone(), current.clone(), previous.clone()))
                }
                None if is_add => output.push(Change::update(key.clone(), current.clone(), current.clone())),
                None => output.push(Change::refresh(key.clone(), current.clone())),
            },
            (true, false) => {
                self.included.remove(key);
                let removed = previous.unwrap_or(current);
                output.push(Change::remove(key.clone(), removed.clone()));
            }
            (false, false) => {}
        }
    }
}
