//! The subscription surface shared by every stage.

use crate::subscription::Subscription;

/// A source of values that callers can subscribe to.
///
/// Stores and derived stages implement this for the change set type they
/// publish, which lets a stage be built on top of any compatible upstream.
pub trait Observable<T> {
    /// Subscribes `callback` to every value published from now on.
    ///
    /// Implementations may deliver an initial value describing the current
    /// state before returning.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static;
}
