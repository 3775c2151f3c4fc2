//! Subscription management for observable stages.
//!
//! A `SubscriptionManager` lives inside a stage's gated state and keeps the
//! registered callbacks in subscription order. Callers receive a
//! `Subscription` handle; dropping it, or calling `unsubscribe`, detaches
//! the callback.

use crate::gate::Gate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscription within one stage.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A registered callback and its liveness flag.
pub struct Subscriber<T> {
    callback: Callback<T>,
    /// Cleared on unsubscribe. Checked before every delivery, so a callback
    /// that unsubscribes a peer stops it within the same delivery.
    active: Arc<AtomicBool>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            active: Arc::clone(&self.active),
        }
    }
}

impl<T> Subscriber<T> {
    /// Creates an active subscriber.
    pub fn new(callback: Callback<T>) -> Self {
        Self {
            callback,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns whether this subscriber is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Notifies this subscriber if it is still active.
    pub fn notify(&self, value: &T) {
        if self.is_active() {
            (self.callback)(value);
        }
    }
}

/// Manages the subscribers of one stage.
pub struct SubscriptionManager<T> {
    /// Active subscribers, in subscription order
    subscribers: BTreeMap<SubscriptionId, Subscriber<T>>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<T> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriptionManager<T> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscribers: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserves the next subscription ID.
    pub fn allocate_id(&mut self) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Registers a subscriber under an allocated ID.
    pub fn insert(&mut self, id: SubscriptionId, subscriber: Subscriber<T>) {
        self.subscribers.insert(id, subscriber);
    }

    /// Registers a callback and returns its ID.
    pub fn subscribe(&mut self, callback: Callback<T>) -> SubscriptionId {
        let id = self.allocate_id();
        self.insert(id, Subscriber::new(callback));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.subscribers.remove(&id) {
            Some(subscriber) => {
                subscriber.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Copies the current subscriber list for delivery.
    ///
    /// Delivery iterates the copy, so callbacks are free to subscribe or
    /// unsubscribe while it runs.
    pub fn deliveries(&self) -> Deliveries<T> {
        Deliveries {
            subscribers: self.subscribers.values().cloned().collect(),
        }
    }

    /// Returns the number of subscribers.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns true if there are no subscribers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Returns all subscription IDs, in subscription order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscribers.keys().copied().collect()
    }

    /// Removes every subscriber.
    pub fn clear(&mut self) {
        for subscriber in self.subscribers.values() {
            subscriber.active.store(false, Ordering::Release);
        }
        self.subscribers.clear();
    }
}

/// A snapshot of a stage's subscribers, taken before delivery.
pub struct Deliveries<T> {
    subscribers: Vec<Subscriber<T>>,
}

impl<T> Default for Deliveries<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<T> Deliveries<T> {
    /// Delivers `value` to every subscriber that is still active.
    pub fn notify(&self, value: &T) {
        for subscriber in &self.subscribers {
            subscriber.notify(value);
        }
    }

    /// Returns true if there is nobody to deliver to.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Handle to a live subscription.
///
/// The callback stays registered until the handle is dropped or
/// `unsubscribe` is called. A handle also keeps its source stage alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce(SubscriptionId) + Send + Sync>>,
}

impl Subscription {
    /// Creates a handle that runs `detach` once when cancelled.
    pub fn new<D>(id: SubscriptionId, active: Arc<AtomicBool>, detach: D) -> Self
    where
        D: FnOnce(SubscriptionId) + Send + Sync + 'static,
    {
        Self {
            id,
            active,
            detach: Some(Box::new(detach)),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription still receives notifications.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops notifications and detaches the callback.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl<S: Send + 'static> Gate<S> {
    /// Registers `callback` with the subscription manager chosen by
    /// `select`, handing it `initial` first.
    ///
    /// Registration and the initial value are one queued operation, so the
    /// subscriber sees every later change set exactly once and none that
    /// the initial value already covers.
    pub fn attach<T, Sel, Init>(self: &Arc<Self>, select: Sel, initial: Init, callback: Callback<T>) -> Subscription
    where
        T: 'static,
        Sel: Fn(&mut S) -> &mut SubscriptionManager<T> + Copy + Send + Sync + 'static,
        Init: FnOnce(&S) -> Option<T> + Send + 'static,
    {
        let subscriber = Subscriber::new(callback);
        let active = Arc::clone(&subscriber.active);
        let id = self.write(|state| select(state).allocate_id());

        self.run(|_| {
            Some(move |gate: &Gate<S>| {
                if !subscriber.is_active() {
                    return;
                }
                let initial = gate.write(|state| {
                    select(state).insert(id, subscriber.clone());
                    initial(state)
                });
                tracing::trace!(id, "subscriber attached");
                if let Some(initial) = initial {
                    subscriber.notify(&initial);
                }
            })
        });

        let source = Arc::clone(self);
        Subscription::new(id, active, move |id| {
            source.write(|state| select(state).unsubscribe(id));
            tracing::trace!(id, "subscriber detached");
        })
    }
}
