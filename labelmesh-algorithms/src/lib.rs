//! # labelmesh Algorithms
//!
//! Algorithms over the labelmesh geometry model. Currently this is the
//! discrete color mapping that turns a per-point class label array into
//! per-point colors.

pub mod coloring;

// Re-export commonly used items
pub use coloring::*;
