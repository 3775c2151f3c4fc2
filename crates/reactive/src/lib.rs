//! Rivulet Reactive - Subscription and delivery plumbing for Rivulet stages.
//!
//! Every Rivulet stage keeps its state behind a `Gate`, which serialises
//! mutation and delivery and queues re-entrant calls made by subscribers.
//!
//! # Core Concepts
//!
//! - `Gate`: Re-entrant, serialised access to one stage's state
//! - `SubscriptionManager`: Ordered registry of a stage's callbacks
//! - `Subscription`: Handle that detaches its callback when dropped
//! - `Observable`: The `subscribe` surface shared by every stage
//!
//! # Example
//!
//! ```rust
//! use rivulet_reactive::{Callback, Gate, SubscriptionManager};
//! use std::sync::{Arc, Mutex};
//!
//! let gate = Arc::new(Gate::new((0i32, SubscriptionManager::<i32>::new())));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! let callback: Callback<i32> = Arc::new(move |n: &i32| sink.lock().unwrap().push(*n));
//! let subscription = gate.attach(|s| &mut s.1, |s| Some(s.0), callback);
//!
//! gate.run(|_| {
//!     Some(|g: &Gate<(i32, SubscriptionManager<i32>)>| {
//!         let deliveries = g.write(|s| {
//!             s.0 += 5;
//!             s.1.deliveries()
//!         });
//!         deliveries.notify(&5);
//!     })
//! });
//!
//! assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
//! drop(subscription);
//! ```

pub mod gate;
pub mod observable;
pub mod subscription;

pub use gate::Gate;
pub use observable::Observable;
pub use subscription::{Callback, Deliveries, Subscriber, Subscription, SubscriptionId, SubscriptionManager};
