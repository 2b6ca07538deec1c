//! Core data structures for labelmesh
//!
//! This crate provides the unified in-memory geometry model shared by the
//! loaders, the color mapper and the renderer: meshes, named point-attribute
//! arrays and discrete color tables.

pub mod point;
pub mod mesh;
pub mod attribute;
pub mod color_table;
pub mod traits;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use attribute::*;
pub use color_table::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4};
