//! Error types for I/O operations

use crate::format::Format;
use thiserror::Error;

/// Errors that can occur while loading a mesh
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file format: {extension:?}")]
    UnsupportedFormat { extension: String },

    #[error("Parse error in {format} data: {message}")]
    Parse { format: Format, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Load task failed: {0}")]
    Task(String),
}

impl LoadError {
    pub(crate) fn parse(format: Format, message: impl Into<String>) -> Self {
        LoadError::Parse {
            format,
            message: message.into(),
        }
    }
}
