//! Transformed view of a keyed stream.

use hashbrown::HashMap;
use parking_lot::Mutex;
use rivulet_core::{Change, ChangeSet, Error};
use rivulet_incremental::{replay, TransformEngine};
use rivulet_reactive::{Callback, Gate, Observable, Subscription, SubscriptionManager};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

type FaultHandler = Box<dyn FnOnce(&Error) + Send>;

struct TransformState<K, U> {
    /// Transformed values published so far
    values: HashMap<K, U>,
    subscribers: SubscriptionManager<ChangeSet<K, U>>,
    fault: Option<Error>,
    /// Notified once, when the stream faults
    on_fault: Vec<FaultHandler>,
    upstream: Option<Subscription>,
}

/// A keyed stream whose values are mapped through a fallible function.
///
/// Removals carry the previously transformed value. Cloning yields another
/// handle to the same stage.
pub struct TransformStream<K, U> {
    gate: Arc<Gate<TransformState<K, U>>>,
}

impl<K, U> Clone for TransformStream<K, U> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<K, U> TransformStream<K, U>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    /// Transforms `source`. The first failure faults the stream: it is
    /// logged, recorded in `fault`, handed to every `on_fault` handler, and
    /// nothing is forwarded afterwards. Subscribers receive no further
    /// batches; register `on_fault` to learn that the stream has ended.
    pub fn new<S, V, F, E>(source: &S, transform: F) -> Self
    where
        S: Observable<ChangeSet<K, V>>,
        V: 'static,
        F: Fn(&V) -> Result<U, E> + Send + 'static,
        E: Display,
    {
        let engine = Mutex::new(TransformEngine::new(move |_: &K, value: &V| transform(value)));
        Self::build(source, move |gate, changes| {
            if gate.read(|s| s.fault.is_some()) {
                return None;
            }
            match engine.lock().process(changes) {
                Ok(transformed) => Some(transformed),
                Err(err) => {
                    let message = err.to_string();
                    tracing::error!(error = %message, "transform failed; stream stopped");
                    let fault = Error::stream_faulted(message);
                    let handlers = gate.write(|s| {
                        s.fault = Some(fault.clone());
                        std::mem::take(&mut s.on_fault)
                    });
                    for handler in handlers {
                        handler(&fault);
                    }
                    None
                }
            }
        })
    }

    /// Transforms `source`, handing each failure to `on_error` together
    /// with the change that caused it, and carrying on with the rest.
    pub fn new_safe<S, V, F, E, H>(source: &S, transform: F, on_error: H) -> Self
    where
        S: Observable<ChangeSet<K, V>>,
        V: 'static,
        F: Fn(&V) -> Result<U, E> + Send + 'static,
        H: Fn(&Change<K, V>, E) + Send + 'static,
    {
        let engine = Mutex::new(TransformEngine::new(move |_: &K, value: &V| transform(value)));
        Self::build(source, move |_, changes| {
            Some(engine.lock().process_safe(changes, |change, err| on_error(change, err)))
        })
    }

    fn build<S, V, P>(source: &S, process: P) -> Self
    where
        S: Observable<ChangeSet<K, V>>,
        V: 'static,
        P: Fn(&Gate<TransformState<K, U>>, &ChangeSet<K, V>) -> Option<ChangeSet<K, U>> + Send + 'static,
    {
        let gate = Arc::new(Gate::new(TransformState {
            values: HashMap::new(),
            subscribers: SubscriptionManager::new(),
            fault: None,
            on_fault: Vec::new(),
            upstream: None,
        }));

        let weak = Arc::downgrade(&gate);
        let process = Mutex::new(process);
        let upstream = source.subscribe(move |changes: &ChangeSet<K, V>| {
            let Some(gate) = weak.upgrade() else {
                return;
            };
            let transformed = {
                let process = process.lock();
                (*process)(&gate, changes)
            };
            let Some(transformed) = transformed else {
                return;
            };
            if transformed.is_empty() {
                return;
            }
            gate.run(|_| {
                Some(move |gate: &Gate<TransformState<K, U>>| {
                    let deliveries = gate.write(|s| {
                        replay(&mut s.values, &transformed);
                        s.subscribers.deliveries()
                    });
                    deliveries.notify(&transformed);
                })
            });
        });
        gate.write(|s| s.upstream = Some(upstream));

        Self { gate }
    }

    /// Returns the failure that stopped this stream, if any.
    pub fn fault(&self) -> Option<Error> {
        self.gate.read(|s| s.fault.clone())
    }

    /// Calls `handler` once when the stream faults, or right away if it
    /// already has. Streams built with `new_safe` never fault.
    pub fn on_fault<H>(&self, handler: H)
    where
        H: FnOnce(&Error) + Send + 'static,
    {
        let handler: FaultHandler = Box::new(handler);
        let pending = self.gate.write(|s| match &s.fault {
            Some(fault) => Some((handler, fault.clone())),
            None => {
                s.on_fault.push(handler);
                None
            }
        });
        if let Some((handler, fault)) = pending {
            handler(&fault);
        }
    }

    /// Returns the transformed value for `key`.
    pub fn lookup(&self, key: &K) -> Option<U> {
        self.gate.read(|s| s.values.get(key).cloned())
    }

    /// Returns the number of transformed items.
    pub fn count(&self) -> usize {
        self.gate.read(|s| s.values.len())
    }
}

impl<K, U> Observable<ChangeSet<K, U>> for TransformStream<K, U>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeSet<K, U>) + Send + Sync + 'static,
    {
        let callback: Callback<ChangeSet<K, U>> = Arc::new(callback);
        self.gate.attach(
            |s| &mut s.subscribers,
            |s| {
                let snapshot: ChangeSet<K, U> = s
                    .values
                    .iter()
                    .map(|(k, u)| Change::add(k.clone(), u.clone()))
                    .collect();
                (!snapshot.is_empty()).then_some(snapshot)
            },
            callback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn numbers() -> Store<u32, (u32, i64)> {
        Store::new(|item: &(u32, i64)| item.0)
    }

    fn sqrt(item: &(u32, i64)) -> Result<f64, String> {
        if item.1 < 0 {
            Err(format!("negative input {}", item.1))
        } else {
            Ok((item.1 as f64).sqrt())
        }
    }

    #[test]
    fn test_transform_stream_maps_values() {
        let store = numbers();
        store.edit(|u| u.add_or_update_many([(1, 4), (2, 9)]));
        let roots = TransformStream::new(&store, sqrt);

        assert_eq!(roots.lookup(&2), Some(3.0));
        store.edit(|u| u.add_or_update((2, 16)));
        assert_eq!(roots.lookup(&2), Some(4.0));

        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let _sub = roots.subscribe(move |cs: &ChangeSet<u32, f64>| {
            sink.lock().extend(cs.iter().filter(|c| c.is_remove()).map(|c| *c.value()));
        });
        store.edit(|u| u.remove_key(1));
        assert_eq!(*removed.lock(), vec![2.0]);
        assert_eq!(roots.count(), 1);
        assert!(roots.fault().is_none());
    }

    #[test]
    fn test_transform_stream_fault_stops_forwarding() {
        let store = numbers();
        let roots = TransformStream::new(&store, sqrt);

        store.edit(|u| u.add_or_update((1, -1)));
        assert!(matches!(roots.fault(), Some(Error::StreamFaulted { .. })));

        store.edit(|u| u.add_or_update((2, 4)));
        assert_eq!(roots.lookup(&2), None);
    }

    #[test]
    fn test_transform_stream_fault_notifies_handlers() {
        let store = numbers();
        store.edit(|u| u.add_or_update((1, 4)));
        let roots = TransformStream::new(&store, sqrt);

        let batches = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&batches);
        let _sub = roots.subscribe(move |_: &ChangeSet<u32, f64>| *counter.lock() += 1);
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        roots.on_fault(move |err: &Error| sink.lock().push(err.to_string()));

        store.edit(|u| u.add_or_update((2, -9)));
        store.edit(|u| u.add_or_update((3, 9)));

        // Snapshot only; nothing after the failure
        assert_eq!(*batches.lock(), 1);
        assert_eq!(faults.lock().len(), 1);
        assert!(faults.lock()[0].contains("negative input -9"));

        // Late handlers learn about the fault immediately
        let late = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&late);
        roots.on_fault(move |_: &Error| *flag.lock() = true);
        assert!(*late.lock());
    }

    #[test]
    fn test_transform_stream_safe_continues() {
        let store = numbers();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let roots = TransformStream::new_safe(&store, sqrt, move |change: &Change<u32, (u32, i64)>, err: String| {
            sink.lock().push((*change.key(), err));
        });

        store.edit(|u| u.add_or_update_many([(1, -4), (2, 4)]));

        assert_eq!(roots.lookup(&2), Some(2.0));
        assert_eq!(roots.lookup(&1), None);
        assert_eq!(*failures.lock(), vec![(1, String::from("negative input -4"))]);
        assert!(roots.fault().is_none());
    }
}
