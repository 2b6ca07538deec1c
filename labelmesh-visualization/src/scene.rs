//! Scene management: one camera, one light, at most one mesh

use crate::camera::Camera;
use crate::error::SceneError;
use labelmesh_algorithms::LabelColoring;
use labelmesh_core::{AttributeArray, Drawable, Mesh};
use labelmesh_gpu::{FrameState, GpuMesh, HemisphereLight, RenderTarget, DEFAULT_BACKGROUND};
use log::{debug, info};
use std::fmt;

/// Identifies one attached mesh. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(u64);

impl SceneHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SceneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The attached mesh together with its GPU-side copy
struct Actor {
    handle: SceneHandle,
    mesh: Mesh,
    gpu_mesh: GpuMesh,
    coloring: Option<LabelColoring>,
}

/// Owns the camera, light and the render target, and draws the attached
/// mesh on request
pub struct Scene<T: RenderTarget> {
    target: T,
    camera: Camera,
    light: HemisphereLight,
    background: [f64; 4],
    actor: Option<Actor>,
    next_handle: u64,
    revision: u64,
    disposed: bool,
}

impl<T: RenderTarget> Scene<T> {
    pub fn new(target: T) -> Self {
        let mut camera = Camera::default();
        let (width, height) = target.size();
        camera.set_viewport(width, height);
        Self {
            target,
            camera,
            light: HemisphereLight::default(),
            background: DEFAULT_BACKGROUND,
            actor: None,
            next_handle: 1,
            revision: 0,
            disposed: false,
        }
    }

    fn ensure_live(&self) -> Result<(), SceneError> {
        if self.disposed {
            Err(SceneError::Disposed)
        } else {
            Ok(())
        }
    }

    fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn actor(&self, handle: &SceneHandle) -> Result<&Actor, SceneError> {
        self.ensure_live()?;
        self.actor
            .as_ref()
            .filter(|actor| actor.handle == *handle)
            .ok_or(SceneError::StaleHandle(handle.0))
    }

    fn actor_mut(&mut self, handle: &SceneHandle) -> Result<&mut Actor, SceneError> {
        self.ensure_live()?;
        self.actor
            .as_mut()
            .filter(|actor| actor.handle == *handle)
            .ok_or(SceneError::StaleHandle(handle.0))
    }

    /// Attach `mesh`, replacing whatever was attached before.
    ///
    /// The camera keeps its pose.
    pub fn attach(&mut self, mesh: Mesh) -> Result<SceneHandle, SceneError> {
        self.ensure_live()?;
        mesh.validate()?;

        let handle = SceneHandle(self.next_handle);
        self.next_handle += 1;
        let revision = self.bump_revision();
        let gpu_mesh = GpuMesh::from_mesh(&mesh, revision);

        info!(
            "Attached mesh {} ({} vertices, {} faces)",
            handle,
            mesh.vertex_count(),
            mesh.face_count()
        );
        if let Some(previous) = self.actor.replace(Actor {
            handle,
            mesh,
            gpu_mesh,
            coloring: None,
        }) {
            debug!("Mesh {} replaced by {}", previous.handle, handle);
        }
        Ok(handle)
    }

    /// Remove the attached mesh, if any, and hand it back
    pub fn detach(&mut self) -> Option<Mesh> {
        let actor = self.actor.take()?;
        self.bump_revision();
        debug!("Detached mesh {}", actor.handle);
        Some(actor.mesh)
    }

    /// Handle of the attached mesh
    pub fn handle(&self) -> Option<SceneHandle> {
        self.actor.as_ref().map(|actor| actor.handle)
    }

    pub fn frame_state(&self) -> FrameState {
        FrameState {
            view_proj: self.camera.view_projection(),
            eye: self.camera.position,
            light: self.light,
            background: self.background,
        }
    }

    /// Draw the mesh behind `handle`. Repeatable; with no state change in
    /// between, consecutive calls produce identical frames.
    pub fn render(&mut self, handle: &SceneHandle) -> Result<(), SceneError> {
        self.actor(handle)?;
        self.render_frame()
    }

    /// Draw whatever is attached, or just the background
    pub fn render_frame(&mut self) -> Result<(), SceneError> {
        self.ensure_live()?;
        let frame = self.frame_state();
        let mesh = self.actor.as_ref().map(|actor| &actor.gpu_mesh);
        self.target.draw(&frame, mesh)?;
        Ok(())
    }

    pub fn mesh(&self, handle: &SceneHandle) -> Result<&Mesh, SceneError> {
        Ok(&self.actor(handle)?.mesh)
    }

    /// Coloring currently bound to the attached mesh
    pub fn coloring(&self) -> Option<&LabelColoring> {
        self.actor.as_ref().and_then(|actor| actor.coloring.as_ref())
    }

    /// Make `coloring` the color source of the mesh behind `handle`.
    ///
    /// Colors and the active scalar name are replaced together.
    pub fn bind_coloring(&mut self, handle: &SceneHandle, coloring: LabelColoring) -> Result<(), SceneError> {
        let mesh = &self.actor(handle)?.mesh;
        if mesh.attribute(coloring.attribute()).is_none() {
            return Err(SceneError::UnknownAttribute(coloring.attribute().to_string()));
        }
        let expected = mesh.vertex_count();
        if coloring.point_count() != expected {
            return Err(SceneError::ColoringMismatch {
                expected,
                actual: coloring.point_count(),
            });
        }

        let revision = self.bump_revision();
        let actor = self.actor_mut(handle)?;
        actor.mesh.set_colors(coloring.colors().to_vec())?;
        actor.mesh.active_scalars = Some(coloring.attribute().to_string());
        actor.gpu_mesh.set_colors(coloring.colors(), revision);
        debug!("Bound coloring '{}' to mesh {}", coloring.attribute(), handle);
        actor.coloring = Some(coloring);
        Ok(())
    }

    /// Go back to the plain surface color
    pub fn clear_coloring(&mut self, handle: &SceneHandle) -> Result<(), SceneError> {
        let revision = self.bump_revision();
        let actor = self.actor_mut(handle)?;
        actor.mesh.clear_colors();
        actor.gpu_mesh.clear_colors(revision);
        actor.coloring = None;
        Ok(())
    }

    /// Add or replace a point attribute of the attached mesh.
    ///
    /// Replacing the array that drives the current coloring drops that
    /// coloring.
    pub fn insert_attribute(&mut self, handle: &SceneHandle, array: AttributeArray) -> Result<(), SceneError> {
        let bound_to_replaced = self
            .actor(handle)?
            .coloring
            .as_ref()
            .is_some_and(|coloring| coloring.attribute() == array.name());

        self.actor_mut(handle)?.mesh.insert_attribute(array)?;
        if bound_to_replaced {
            self.clear_coloring(handle)?;
        }
        Ok(())
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn light(&self) -> &HemisphereLight {
        &self.light
    }

    pub fn background(&self) -> [f64; 4] {
        self.background
    }

    /// Put the camera back into its home pose
    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    /// Point the camera at the attached mesh so all of it is visible
    pub fn frame_mesh(&mut self) {
        if let Some(actor) = &self.actor {
            let (min, max) = actor.mesh.bounding_box();
            self.camera.frame_bounds(min, max);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.disposed {
            return;
        }
        self.target.resize(width, height);
        self.camera.set_viewport(width, height);
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Dispose of the scene that `handle` was attached to.
    ///
    /// Every GPU resource is released; the handle and the scene are unusable
    /// afterwards.
    pub fn dispose(&mut self, handle: SceneHandle) -> Result<(), SceneError> {
        self.actor(&handle)?;
        self.shutdown();
        Ok(())
    }

    /// Release everything regardless of what is attached. Idempotent.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.actor = None;
        self.target.release();
        self.disposed = true;
        info!("Scene disposed");
    }
}

impl<T: RenderTarget> Drop for Scene<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
