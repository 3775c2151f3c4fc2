//! Rivulet Core - Change model for Rivulet live collections.
//!
//! This crate provides the vocabulary every Rivulet stage speaks:
//!
//! - `Change`: One keyed mutation (Add, Update, Remove, Refresh, Moved)
//! - `ChangeSet`: An ordered batch of changes with an optional context payload
//! - `Sorted` / `Windowed`: Context payloads for sorted and windowed batches
//! - `Comparer`: A shareable total order driving sorted projections
//! - `PageRequest` / `VirtualRequest`: Validated window requests
//! - `Error`: Error types for Rivulet operations
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{Change, ChangeSet, PageRequest};
//!
//! let changes: ChangeSet<u32, &str> = vec![
//!     Change::add(1, "a"),
//!     Change::add(2, "b"),
//!     Change::update(1, "A", "a"),
//! ]
//! .into_iter()
//! .collect();
//!
//! assert_eq!(changes.adds(), 2);
//! assert_eq!(changes.updates(), 1);
//!
//! assert!(PageRequest::new(0, 10).is_err());
//! ```

#![no_std]

extern crate alloc;

mod change;
mod change_set;
mod comparer;
mod error;
mod sorted;
mod window;

pub use change::{Change, ChangeReason};
pub use change_set::ChangeSet;
pub use comparer::{Comparer, SortOrder};
pub use error::{Error, Result};
pub use sorted::{
    SortOptimisations, SortOptions, SortReason, Sorted, SortedChangeSet, DEFAULT_RESET_THRESHOLD,
};
pub use window::{
    page_count, PageRequest, VirtualRequest, WindowRequest, WindowResponse, Windowed,
    WindowedChangeSet,
};
