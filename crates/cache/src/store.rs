//! The keyed source of truth.
//!
//! A `Store` holds the current key → value state of one cache. Mutations go
//! through `edit`, which applies a batch of operations atomically and
//! publishes exactly one change set describing its net effect. Subscribers
//! attach through `connect` (snapshot first), `preview` (no snapshot,
//! delivered before connected subscribers) or `watch` (one key).

use crate::updater::{EditOp, Updater};
use parking_lot::Mutex;
use rivulet_core::{Change, ChangeSet, Error, Result};
use rivulet_incremental::{ChangeAwareCache, FilterEngine};
use rivulet_reactive::{Callback, Gate, Observable, Subscription, SubscriptionManager};
use std::hash::Hash;
use std::sync::Arc;

type KeySelector<K, V> = Arc<dyn Fn(&V) -> K + Send + Sync>;

pub(crate) struct StoreState<K, V> {
    cache: ChangeAwareCache<K, V>,
    /// Delivered first, never given a snapshot
    preview: SubscriptionManager<ChangeSet<K, V>>,
    connected: SubscriptionManager<ChangeSet<K, V>>,
}

/// A keyed, observable collection.
///
/// Cloning a `Store` yields another handle to the same collection.
pub struct Store<K, V> {
    gate: Arc<Gate<StoreState<K, V>>>,
    key_of: KeySelector<K, V>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            key_of: Arc::clone(&self.key_of),
        }
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty store whose keys are derived with `key_of`.
    pub fn new<F>(key_of: F) -> Self
    where
        F: Fn(&V) -> K + Send + Sync + 'static,
    {
        Self {
            gate: Arc::new(Gate::new(StoreState {
                cache: ChangeAwareCache::new(),
                preview: SubscriptionManager::new(),
                connected: SubscriptionManager::new(),
            })),
            key_of: Arc::new(key_of),
        }
    }

    /// Applies a batch of operations atomically.
    ///
    /// `f` records operations on the updater; once it returns they are
    /// applied in call order and the net effect is published as one change
    /// set. An edit with no effect publishes nothing.
    ///
    /// Called from inside a notification of this store, the edit is queued
    /// and applied after the current delivery finishes, before the outermost
    /// call returns.
    pub fn edit<F>(&self, f: F)
    where
        F: FnOnce(&mut Updater<'_, K, V>),
    {
        self.gate.run(|state| {
            let mut updater = Updater::new(&state.cache, &*self.key_of);
            f(&mut updater);
            let ops = updater.into_ops();
            if ops.is_empty() {
                return None;
            }
            Some(move |gate: &Gate<StoreState<K, V>>| commit(gate, ops))
        });
    }

    /// Subscribes to every change, starting with a snapshot of the
    /// current contents as Adds (skipped when the store is empty).
    pub fn connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
    {
        let callback: Callback<ChangeSet<K, V>> = Arc::new(callback);
        self.gate.attach(
            |s| &mut s.connected,
            |s| {
                let snapshot = s.cache.snapshot();
                (!snapshot.is_empty()).then_some(snapshot)
            },
            callback,
        )
    }

    /// Subscribes to the items matching `predicate`.
    ///
    /// Updates crossing the predicate boundary arrive as Adds or Removes,
    /// and Refreshes re-evaluate inclusion. With `suppress_initial` the
    /// snapshot is not delivered.
    pub fn connect_with<P, F>(&self, predicate: P, suppress_initial: bool, callback: F) -> Subscription
    where
        P: Fn(&V) -> bool + Send + 'static,
        F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
    {
        let filter = Arc::new(Mutex::new(FilterEngine::new(predicate)));
        let seed = Arc::clone(&filter);
        self.gate.attach(
            |s| &mut s.connected,
            move |s| {
                let snapshot = seed.lock().process(&s.cache.snapshot());
                (!suppress_initial && !snapshot.is_empty()).then_some(snapshot)
            },
            filtered(filter, callback),
        )
    }

    /// Subscribes to changes without a snapshot. Preview subscribers see
    /// each batch before connected subscribers do.
    pub fn preview<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
    {
        let callback: Callback<ChangeSet<K, V>> = Arc::new(callback);
        self.gate.attach(|s| &mut s.preview, |_| None, callback)
    }

    /// Like `preview`, restricted to items matching `predicate`.
    pub fn preview_with<P, F>(&self, predicate: P, callback: F) -> Subscription
    where
        P: Fn(&V) -> bool + Send + 'static,
        F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
    {
        let filter = Arc::new(Mutex::new(FilterEngine::new(predicate)));
        let seed = Arc::clone(&filter);
        self.gate.attach(
            |s| &mut s.preview,
            move |s| {
                // Seed inclusion without delivering anything
                let _ = seed.lock().process(&s.cache.snapshot());
                None
            },
            filtered(filter, callback),
        )
    }

    /// Subscribes to the changes of one key, starting with an Add of its
    /// current value if present.
    pub fn watch<F>(&self, key: K, callback: F) -> Subscription
    where
        F: Fn(&Change<K, V>) + Send + Sync + 'static,
    {
        let initial_key = key.clone();
        let forward: Callback<ChangeSet<K, V>> = Arc::new(move |changes: &ChangeSet<K, V>| {
            for change in changes.iter().filter(|c| c.key() == &key) {
                callback(change);
            }
        });
        self.gate.attach(
            |s| &mut s.connected,
            move |s| {
                let current = s.cache.lookup(&initial_key)?.clone();
                Some(ChangeSet::from_changes(vec![Change::add(initial_key, current)]))
            },
            forward,
        )
    }

    /// Returns the value for `key`, if present.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.gate.read(|s| s.cache.lookup(key).cloned())
    }

    /// Returns the value for `key`, or `Error::MissingKey`.
    pub fn get(&self, key: &K) -> Result<V> {
        self.lookup(key).ok_or(Error::MissingKey)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.gate.read(|s| s.cache.contains_key(key))
    }

    /// Returns the number of items.
    pub fn count(&self) -> usize {
        self.gate.read(|s| s.cache.len())
    }

    /// Returns true if the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns every key, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.gate.read(|s| s.cache.data().keys().cloned().collect())
    }

    /// Returns every value, in no particular order.
    pub fn items(&self) -> Vec<V> {
        self.gate.read(|s| s.cache.data().values().cloned().collect())
    }

    /// Returns every key/value pair, in no particular order.
    pub fn key_values(&self) -> Vec<(K, V)> {
        self.gate
            .read(|s| s.cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Returns the key the store derives for `value`.
    pub fn key_of(&self, value: &V) -> K {
        (self.key_of)(value)
    }
}

impl<K, V> Observable<ChangeSet<K, V>> for Store<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
    {
        self.connect(callback)
    }
}

fn commit<K, V>(gate: &Gate<StoreState<K, V>>, ops: Vec<EditOp<K, V>>)
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let (changes, preview, connected) = gate.write(|state| {
        for op in ops {
            op.apply(&mut state.cache);
        }
        (
            state.cache.capture_changes(),
            state.preview.deliveries(),
            state.connected.deliveries(),
        )
    });
    if changes.is_empty() {
        return;
    }

    tracing::debug!(
        adds = changes.adds(),
        updates = changes.updates(),
        removes = changes.removes(),
        refreshes = changes.refreshes(),
        "edit committed"
    );
    preview.notify(&changes);
    connected.notify(&changes);
}

fn filtered<K, V, P, F>(
    filter: Arc<Mutex<FilterEngine<K, V, P>>>,
    callback: F,
) -> Callback<ChangeSet<K, V>>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + 'static,
    P: Fn(&V) -> bool + Send + 'static,
    F: Fn(&ChangeSet<K, V>) + Send + Sync + 'static,
{
    Arc::new(move |changes: &ChangeSet<K, V>| {
        let matched = filter.lock().process(changes);
        if !matched.is_empty() {
            callback(&matched);
        }
    })
}
