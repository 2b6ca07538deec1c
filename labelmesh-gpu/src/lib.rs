//! # labelmesh GPU
//!
//! Mesh rendering with wgpu.
//!
//! Everything draws through the [`RenderTarget`] trait: [`SurfaceRenderer`]
//! presents into a window, [`RecordingTarget`] records frames without
//! touching a GPU.
//!
//! ```rust,no_run
//! use labelmesh_gpu::{FrameState, GpuMesh, RecordingTarget, RenderTarget};
//! use labelmesh_core::{Mesh, Point3f};
//!
//! fn example() -> labelmesh_core::Result<()> {
//!     let mesh = Mesh::point_cloud(vec![Point3f::origin()]);
//!     let mut target = RecordingTarget::new(800, 600);
//!     target.draw(&FrameState::default(), Some(&GpuMesh::from_mesh(&mesh, 0)))?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod mesh;
pub mod renderer;
pub mod recording;

pub use device::GpuContext;
pub use mesh::{GpuMesh, MeshVertex, Topology, DEFAULT_SURFACE_COLOR};
pub use renderer::{
    CameraUniform, FrameState, HemisphereLight, LightUniform, RenderConfig, RenderTarget,
    SurfaceRenderer, DEFAULT_BACKGROUND,
};
pub use recording::{RecordedFrame, RecordingTarget};
