//! Rivulet Incremental - Pure change-propagation engines for Rivulet.
//!
//! This crate holds the state machines behind every Rivulet stage. None of
//! them lock or notify: each consumes a change set and returns the change
//! set its downstream should observe, so they can be tested and benchmarked
//! without any threading.
//!
//! # Core Concepts
//!
//! - `ChangeAwareCache`: A keyed map that records each mutation as a `Change`
//! - `edit_diff`: Minimal diff between a keyed map and a replacement item set
//! - `replay`: Applies a change set to a plain map
//!
//! # Operators
//!
//! - `FilterEngine`: Keeps the keys whose value satisfies a predicate
//! - `TransformEngine`: Maps values through a fallible function
//! - `SortEngine`: Maintains a sorted projection with positioned changes
//! - `WindowEngine`: Pages or virtualises a sorted projection
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{Comparer, PageRequest, SortOptions};
//! use rivulet_incremental::{ChangeAwareCache, SortEngine, WindowEngine};
//!
//! let mut cache = ChangeAwareCache::new();
//! for (id, score) in [(1u32, 30i64), (2, 10), (3, 20)] {
//!     cache.add_or_update(id, score);
//! }
//!
//! let mut sort = SortEngine::new(Comparer::natural(), SortOptions::default());
//! let mut page = WindowEngine::new(PageRequest::new(1, 2).unwrap());
//!
//! let sorted = sort.process(&cache.capture_changes()).unwrap();
//! let window = page.on_data(&sorted).unwrap();
//!
//! assert_eq!(window.visible_items(), &[(2, 10), (3, 20)]);
//! assert_eq!(window.response().pages, 2);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod edit_diff;
pub mod operators;

pub use cache::{replay, ChangeAwareCache};
pub use edit_diff::edit_diff;
pub use operators::{FilterEngine, SortEngine, TransformEngine, WindowEngine};
