//! Mesh loading and prediction service access
//!
//! This crate turns OBJ, STL, glTF/GLB and VTK PolyData bytes into a
//! [`Mesh`], and talks to the remote segmentation service that produces
//! per-point class labels.

pub mod error;
pub mod format;
pub mod obj;
pub mod stl;
pub mod gltf;
pub mod vtp;
pub mod loader;
pub mod remote;
pub mod download;

pub use error::*;
pub use format::Format;
pub use loader::{load, load_async, load_file};
pub use remote::{PredictionClient, RemoteConfig, NetworkError};
pub use download::{ResultFile, RESULT_FILE_NAME};

use labelmesh_core::Mesh;

/// Trait for decoding a mesh from an in-memory file
pub trait MeshReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError>;
}
