//! Rivulet Cache - Live keyed store with sorted, paged and virtualised views.
//!
//! A `Store` is the single source of truth. Each `edit` is applied
//! atomically and published as one `ChangeSet`; downstream stages keep
//! their own projection up to date incrementally.
//!
//! # Core Concepts
//!
//! - `Store`: Keyed collection with `edit`, `connect`, `preview` and `watch`
//! - `Updater`: The operations recorded by one edit
//! - `SortedStream`: Ordered projection emitting positioned changes
//! - `WindowedStream`: A page or virtual window over a sorted projection
//! - `TransformStream`: Per-item mapping with fatal or safe error handling
//!
//! Every stage is `Observable`: subscribing yields the current contents as
//! Adds, then live batches, until the returned `Subscription` is dropped.
//!
//! # Example
//!
//! ```rust
//! use rivulet_cache::{Comparer, PageRequest, SortOptions, SortedStream, Store, WindowedStream};
//!
//! let store = Store::new(|item: &(u32, &'static str)| item.0);
//! store.edit(|u| u.add_or_update_many([(3, "c"), (1, "a"), (2, "b")]));
//!
//! let sorted = SortedStream::new(
//!     &store,
//!     Comparer::ascending_by(|item: &(u32, &'static str)| item.1),
//!     SortOptions::default(),
//! );
//! let page = WindowedStream::page(&sorted, PageRequest::new(1, 2).unwrap());
//!
//! let keys: Vec<u32> = page.visible_items().iter().map(|(k, _)| *k).collect();
//! assert_eq!(keys, vec![1, 2]);
//! ```

mod sort;
mod store;
mod transform;
mod updater;
mod window;

pub use sort::SortedStream;
pub use store::Store;
pub use transform::TransformStream;
pub use updater::{Equality, Updater};
pub use window::WindowedStream;

pub use rivulet_core::{
    Change, ChangeReason, ChangeSet, Comparer, Error, PageRequest, Result, SortOptimisations,
    SortOptions, SortReason, SortedChangeSet, VirtualRequest, WindowRequest, WindowResponse,
    WindowedChangeSet,
};
pub use rivulet_reactive::{Observable, Subscription};
