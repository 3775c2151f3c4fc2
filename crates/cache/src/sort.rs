//! Sorted view of a keyed stream.

use rivulet_core::{ChangeSet, Comparer, SortOptions, SortedChangeSet};
use rivulet_incremental::SortEngine;
use rivulet_reactive::{Callback, Deliveries, Gate, Observable, Subscription, SubscriptionManager};
use std::hash::Hash;
use std::sync::Arc;

struct SortState<K, V> {
    engine: SortEngine<K, V>,
    subscribers: SubscriptionManager<SortedChangeSet<K, V>>,
    /// Keeps the upstream subscription alive as long as this stage
    upstream: Option<Subscription>,
}

/// A live, sorted projection of a keyed stream.
///
/// Every batch published downstream carries positioned changes plus the
/// full ordered projection. Cloning yields another handle to the same stage.
pub struct SortedStream<K, V> {
    gate: Arc<Gate<SortState<K, V>>>,
}

impl<K, V> Clone for SortedStream<K, V> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<K, V> SortedStream<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Sorts `source` with `comparer`.
    pub fn new<S>(source: &S, comparer: Comparer<V>, options: SortOptions) -> Self
    where
        S: Observable<ChangeSet<K, V>>,
    {
        let gate = Arc::new(Gate::new(SortState {
            engine: SortEngine::new(comparer, options),
            subscribers: SubscriptionManager::new(),
            upstream: None,
        }));

        let weak = Arc::downgrade(&gate);
        let upstream = source.subscribe(move |changes: &ChangeSet<K, V>| {
            let Some(gate) = weak.upgrade() else {
                return;
            };
            let changes = changes.clone();
            gate.run(|_| {
                Some(move |gate: &Gate<SortState<K, V>>| {
                    let (sorted, deliveries) =
                        gate.write(|s| (s.engine.process(&changes), s.subscribers.deliveries()));
                    publish(sorted, deliveries);
                })
            });
        });
        gate.write(|s| s.upstream = Some(upstream));

        Self { gate }
    }

    /// Replaces the comparer and re-sorts everything.
    pub fn set_comparer(&self, comparer: Comparer<V>) {
        self.gate.run(|_| {
            Some(move |gate: &Gate<SortState<K, V>>| {
                let (sorted, deliveries) = gate.write(|s| {
                    (s.engine.change_comparer(comparer), s.subscribers.deliveries())
                });
                publish(sorted, deliveries);
            })
        });
    }

    /// Re-sorts with the current comparer, picking up values whose
    /// ordering fields were mutated in place.
    pub fn reorder(&self) {
        self.gate.run(|_| {
            Some(|gate: &Gate<SortState<K, V>>| {
                let (sorted, deliveries) =
                    gate.write(|s| (s.engine.reorder(), s.subscribers.deliveries()));
                publish(sorted, deliveries);
            })
        });
    }

    /// Returns the current ordered projection.
    pub fn sorted_items(&self) -> Vec<(K, V)> {
        self.gate.read(|s| s.engine.sorted_items().to_vec())
    }

    /// Returns the position of `key` in the projection.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.gate.read(|s| s.engine.index_of(key))
    }

    /// Returns the number of items in the projection.
    pub fn len(&self) -> usize {
        self.gate.read(|s| s.engine.len())
    }

    /// Returns true if the projection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sort options.
    pub fn options(&self) -> SortOptions {
        self.gate.read(|s| *s.engine.options())
    }
}

impl<K, V> Observable<SortedChangeSet<K, V>> for SortedStream<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Subscribes to sorted batches, starting with the current projection
    /// as positioned Adds.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SortedChangeSet<K, V>) + Send + Sync + 'static,
    {
        let callback: Callback<SortedChangeSet<K, V>> = Arc::new(callback);
        self.gate
            .attach(|s| &mut s.subscribers, |s| s.engine.snapshot(), callback)
    }
}

fn publish<K, V>(sorted: Option<SortedChangeSet<K, V>>, deliveries: Deliveries<SortedChangeSet<K, V>>) {
    let Some(sorted) = sorted else {
        return;
    };
    let reason = sorted.sort_reason();
    if reason.is_replacement() {
        tracing::debug!(?reason, items = sorted.sorted_items().len(), "sorted projection replaced");
    }
    deliveries.notify(&sorted);
}
