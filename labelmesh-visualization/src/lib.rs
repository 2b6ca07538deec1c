//! Scene management and rendering sessions for labelled meshes
//!
//! - [`Scene`]: one attached mesh, camera, lighting and render target
//! - [`RenderSession`]: load lifecycle on top of a scene
//! - [`InteractiveViewer`]: winit window driving a session

pub mod camera;
pub mod error;
pub mod scene;
pub mod session;
pub mod viewer;

pub use camera::Camera;
pub use error::{SceneError, SessionError};
pub use scene::{Scene, SceneHandle};
pub use session::{LoadTicket, RenderSession, SessionState};
pub use viewer::{CameraMode, InteractiveViewer, SourceFile, ViewerConfig, ViewerEvent};

use labelmesh_core::Result;
use std::path::Path;

/// Open a mesh file in an interactive viewer with default settings
pub fn show_file<P: AsRef<Path>>(path: P) -> Result<()> {
    InteractiveViewer::new(ViewerConfig::default()).run(Some(path.as_ref().to_path_buf()))
}
