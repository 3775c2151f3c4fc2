//! Incremental operators over keyed change streams.
//!
//! Every operator is a pure state machine: it consumes one change set and
//! returns the change set its downstream should see. Locking and delivery
//! live in the stages that wrap these engines.
//!
//! - Filter: keeps keys whose value satisfies a predicate
//! - Transform: maps values through a fallible function
//! - Sort: maintains an ordered projection with positioned changes
//! - Window: pages or virtualises a sorted projection

mod filter;
mod sort;
mod transform;
mod window;

pub use filter::FilterEngine;
pub use sort::SortEngine;
pub use transform::TransformEngine;
pub use window::WindowEngine;
