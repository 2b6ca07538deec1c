//! Error types for scenes and render sessions

use crate::session::SessionState;
use labelmesh_algorithms::MappingError;
use labelmesh_io::LoadError;
use thiserror::Error;

/// Errors raised by a [`Scene`](crate::Scene)
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Scene handle {0} does not refer to the attached mesh")]
    StaleHandle(u64),

    #[error("Scene has been disposed")]
    Disposed,

    #[error("Mesh has no point attribute named '{0}'")]
    UnknownAttribute(String),

    #[error("Coloring covers {actual} points but the mesh has {expected}")]
    ColoringMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Core(#[from] labelmesh_core::Error),
}

/// Errors raised by a [`RenderSession`](crate::RenderSession)
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A load finished after a newer one was started; its result was dropped
    #[error("Result of load #{ticket} was superseded")]
    StaleResult { ticket: u64 },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] labelmesh_core::Error),
}

impl SessionError {
    /// Whether the error only reports a discarded, superseded result
    pub fn is_stale(&self) -> bool {
        matches!(self, SessionError::StaleResult { .. })
    }
}
