//! Error types for labelmesh

use thiserror::Error;

/// Main error type for labelmesh operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    FaceIndexOutOfBounds {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    #[error("Attribute '{name}' has {actual} tuples, expected {expected}")]
    AttributeLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Visualization error: {0}")]
    Visualization(String),
}

/// Result type alias for labelmesh operations
pub type Result<T> = std::result::Result<T, Error>;
