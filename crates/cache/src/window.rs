//! Paged and virtualised views of a sorted stream.

use rivulet_core::{
    PageRequest, SortedChangeSet, VirtualRequest, WindowRequest, WindowResponse, WindowedChangeSet,
};
use rivulet_incremental::WindowEngine;
use rivulet_reactive::{Callback, Deliveries, Gate, Observable, Subscription, SubscriptionManager};
use std::hash::Hash;
use std::sync::Arc;

struct WindowState<K, V> {
    engine: WindowEngine<K, V>,
    subscribers: SubscriptionManager<WindowedChangeSet<K, V>>,
    upstream: Option<Subscription>,
}

/// A bounded, live window over a sorted stream.
///
/// Subscribers only see changes to items inside the window, with indices
/// relative to the window, plus Adds and Removes as items enter and leave
/// it. Cloning yields another handle to the same stage.
pub struct WindowedStream<K, V> {
    gate: Arc<Gate<WindowState<K, V>>>,
}

impl<K, V> Clone for WindowedStream<K, V> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<K, V> WindowedStream<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Pages `source`.
    pub fn page<S>(source: &S, request: PageRequest) -> Self
    where
        S: Observable<SortedChangeSet<K, V>>,
    {
        Self::new(source, request)
    }

    /// Virtualises `source`.
    pub fn virtualise<S>(source: &S, request: VirtualRequest) -> Self
    where
        S: Observable<SortedChangeSet<K, V>>,
    {
        Self::new(source, request)
    }

    /// Windows `source` with any kind of request.
    pub fn new<S>(source: &S, request: impl Into<WindowRequest>) -> Self
    where
        S: Observable<SortedChangeSet<K, V>>,
    {
        let gate = Arc::new(Gate::new(WindowState {
            engine: WindowEngine::new(request),
            subscribers: SubscriptionManager::new(),
            upstream: None,
        }));

        let weak = Arc::downgrade(&gate);
        let upstream = source.subscribe(move |sorted: &SortedChangeSet<K, V>| {
            let Some(gate) = weak.upgrade() else {
                return;
            };
            let sorted = sorted.clone();
            gate.run(|_| {
                Some(move |gate: &Gate<WindowState<K, V>>| {
                    let (windowed, deliveries) =
                        gate.write(|s| (s.engine.on_data(&sorted), s.subscribers.deliveries()));
                    publish(windowed, deliveries);
                })
            });
        });
        gate.write(|s| s.upstream = Some(upstream));

        Self { gate }
    }

    /// Moves the window.
    pub fn set_request(&self, request: impl Into<WindowRequest>) {
        let request = request.into();
        self.gate.run(|_| {
            Some(move |gate: &Gate<WindowState<K, V>>| {
                let (windowed, deliveries) =
                    gate.write(|s| (s.engine.on_request(request), s.subscribers.deliveries()));
                publish(windowed, deliveries);
            })
        });
    }

    /// Returns the active request.
    pub fn request(&self) -> WindowRequest {
        self.gate.read(|s| s.engine.request())
    }

    /// Returns the request resolved against the current projection.
    pub fn response(&self) -> WindowResponse {
        self.gate.read(|s| s.engine.response())
    }

    /// Returns the visible items, in projection order.
    pub fn visible_items(&self) -> Vec<(K, V)> {
        self.gate.read(|s| s.engine.visible_items().to_vec())
    }
}

impl<K, V> Observable<WindowedChangeSet<K, V>> for WindowedStream<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&WindowedChangeSet<K, V>) + Send + Sync + 'static,
    {
        let callback: Callback<WindowedChangeSet<K, V>> = Arc::new(callback);
        self.gate
            .attach(|s| &mut s.subscribers, |s| s.engine.snapshot(), callback)
    }
}

fn publish<K, V>(windowed: Option<WindowedChangeSet<K, V>>, deliveries: Deliveries<WindowedChangeSet<K, V>>) {
    let Some(windowed) = windowed else {
        return;
    };
    let response = windowed.response();
    tracing::trace!(
        page = response.page,
        pages = response.pages,
        start_index = response.start_index,
        total_size = response.total_size,
        changes = windowed.len(),
        "window recomputed"
    );
    deliveries.notify(&windowed);
}
