//! Headless render target that records what it was asked to draw

use crate::mesh::{GpuMesh, Topology};
use crate::renderer::{FrameState, RenderTarget};
use labelmesh_core::{Error, Result};

/// Snapshot of one recorded frame
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub frame: FrameState,
    /// `None` when only the background was drawn
    pub mesh_revision: Option<u64>,
    pub vertex_count: usize,
    pub element_count: u32,
    pub topology: Option<Topology>,
    pub colors: Vec<[f32; 3]>,
}

/// Render target for tests, batch runs and machines without a GPU.
///
/// Mirrors the upload behaviour of the windowed renderer: buffers are
/// re-created only when the mesh revision changes.
#[derive(Debug, Clone)]
pub struct RecordingTarget {
    width: u32,
    height: u32,
    frames: Vec<RecordedFrame>,
    uploaded_revision: Option<u64>,
    uploads: usize,
    released: bool,
}

impl RecordingTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frames: Vec::new(),
            uploaded_revision: None,
            uploads: 0,
            released: false,
        }
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Number of times mesh buffers were (re-)created
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    /// Whether buffers for some mesh are currently held
    pub fn holds_mesh(&self) -> bool {
        self.uploaded_revision.is_some()
    }
}

impl Default for RecordingTarget {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl RenderTarget for RecordingTarget {
    fn draw(&mut self, frame: &FrameState, mesh: Option<&GpuMesh>) -> Result<()> {
        if self.released {
            return Err(Error::Gpu("Renderer has been released".to_string()));
        }

        let recorded = match mesh {
            Some(mesh) if !mesh.vertices.is_empty() => {
                if self.uploaded_revision != Some(mesh.revision) {
                    self.uploaded_revision = Some(mesh.revision);
                    self.uploads += 1;
                }
                RecordedFrame {
                    frame: frame.clone(),
                    mesh_revision: Some(mesh.revision),
                    vertex_count: mesh.vertices.len(),
                    element_count: mesh.element_count(),
                    topology: Some(mesh.topology),
                    colors: mesh.vertices.iter().map(|v| v.color).collect(),
                }
            }
            _ => {
                self.uploaded_revision = None;
                RecordedFrame {
                    frame: frame.clone(),
                    mesh_revision: None,
                    vertex_count: 0,
                    element_count: 0,
                    topology: None,
                    colors: Vec::new(),
                }
            }
        };
        self.frames.push(recorded);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        self.uploaded_revision = None;
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}
