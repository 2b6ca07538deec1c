//! Render session lifecycle
//!
//! A [`RenderSession`] ties one [`Scene`] to the sequence of meshes loaded
//! into it:
//!
//! ```text
//! Empty -> Loading -> Ready -> (Recoloring -> Ready)* -> Disposed
//! ```
//!
//! Loads are identified by [`LoadTicket`]s. Only the most recently issued
//! ticket may complete a load, so a slow load that finishes after a newer
//! one was started is dropped instead of overwriting it.

use crate::error::SessionError;
use crate::scene::{Scene, SceneHandle};
use labelmesh_algorithms::{label_coloring, LabelColoring};
use labelmesh_core::{AttributeArray, ColorTable, Mesh, LABEL_ATTRIBUTE};
use labelmesh_gpu::RenderTarget;
use labelmesh_io::LoadError;
use log::{debug, info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loading,
    Ready,
    Recoloring,
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Empty => "empty",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Recoloring => "recoloring",
            SessionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Generation number of one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct RenderSession<T: RenderTarget> {
    scene: Scene<T>,
    state: SessionState,
    handle: Option<SceneHandle>,
    generation: u64,
    /// Ticket allowed to complete the current load
    pending: Option<LoadTicket>,
    /// Ticket whose mesh is attached
    loaded: Option<LoadTicket>,
}

impl<T: RenderTarget> RenderSession<T> {
    pub fn new(target: T) -> Self {
        Self {
            scene: Scene::new(target),
            state: SessionState::Empty,
            handle: None,
            generation: 0,
            pending: None,
            loaded: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<SceneHandle> {
        self.handle
    }

    pub fn scene(&self) -> &Scene<T> {
        &self.scene
    }

    /// Ticket of the load whose mesh is currently attached
    pub fn loaded_ticket(&self) -> Option<LoadTicket> {
        self.loaded
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        let handle = self.handle?;
        self.scene.mesh(&handle).ok()
    }

    pub fn coloring(&self) -> Option<&LabelColoring> {
        self.scene.coloring()
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Start a load. Any load still in flight is superseded.
    ///
    /// The attached mesh, if any, stays on screen until the load finishes.
    pub fn begin_load(&mut self) -> Result<LoadTicket, SessionError> {
        if self.state == SessionState::Disposed {
            return Err(self.invalid("begin a load"));
        }
        self.generation += 1;
        let ticket = LoadTicket(self.generation);
        if let Some(previous) = self.pending.replace(ticket) {
            debug!("Load {} superseded by {}", previous, ticket);
        }
        self.state = SessionState::Loading;
        Ok(ticket)
    }

    /// Complete the load identified by `ticket`.
    ///
    /// Results for superseded tickets are dropped with
    /// [`SessionError::StaleResult`] and leave the session untouched. A failed
    /// load tears down the previous mesh and returns the session to `Empty`.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Mesh, LoadError>,
    ) -> Result<SceneHandle, SessionError> {
        if self.state == SessionState::Disposed || self.pending != Some(ticket) {
            debug!("Discarding result of superseded load {}", ticket);
            return Err(SessionError::StaleResult { ticket: ticket.0 });
        }
        self.pending = None;

        let attached = result
            .map_err(SessionError::from)
            .and_then(|mesh| self.scene.attach(mesh).map_err(SessionError::from));

        match attached {
            Ok(handle) => {
                info!("Load {} ready as mesh {}", ticket, handle);
                self.handle = Some(handle);
                self.loaded = Some(ticket);
                self.state = SessionState::Ready;
                Ok(handle)
            }
            Err(e) => {
                warn!("Load {} failed: {}", ticket, e);
                self.scene.detach();
                self.handle = None;
                self.loaded = None;
                self.state = SessionState::Empty;
                Err(e)
            }
        }
    }

    fn ready_handle(&self, operation: &'static str) -> Result<SceneHandle, SessionError> {
        match (self.state, self.handle) {
            (SessionState::Ready, Some(handle)) => Ok(handle),
            _ => Err(self.invalid(operation)),
        }
    }

    /// Draw the loaded mesh. Only valid when `Ready`.
    pub fn render(&mut self) -> Result<(), SessionError> {
        let handle = self.ready_handle("render")?;
        self.scene.render(&handle)?;
        Ok(())
    }

    /// Draw one frame of the render loop in any live state: the background
    /// when empty, the last good mesh while a load is running
    pub fn present(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Disposed {
            return Err(self.invalid("present"));
        }
        self.scene.render_frame()?;
        Ok(())
    }

    /// Color the mesh by the label array `attribute`.
    ///
    /// On error the previous coloring stays bound.
    pub fn recolor(&mut self, attribute: &str, table: &ColorTable) -> Result<(), SessionError> {
        let handle = self.ready_handle("recolor")?;
        self.state = SessionState::Recoloring;
        let result = self.bind_labels(&handle, attribute, table);
        self.state = SessionState::Ready;
        if let Err(e) = &result {
            warn!("Recolor by '{}' failed: {}", attribute, e);
        }
        result
    }

    fn bind_labels(&mut self, handle: &SceneHandle, attribute: &str, table: &ColorTable) -> Result<(), SessionError> {
        let coloring = label_coloring(self.scene.mesh(handle)?, attribute, table)?;
        self.scene.bind_coloring(handle, coloring)?;
        Ok(())
    }

    /// Check that a result computed for the mesh of `ticket` still applies:
    /// that mesh is attached and no newer load is in flight
    pub fn ensure_current(&self, ticket: LoadTicket) -> Result<(), SessionError> {
        if self.state == SessionState::Ready && self.loaded == Some(ticket) {
            return Ok(());
        }
        debug!("Discarding result computed for load {}", ticket);
        Err(SessionError::StaleResult { ticket: ticket.0 })
    }

    /// Attach predicted labels as the `Label` attribute of the mesh that was
    /// loaded under `ticket`
    pub fn attach_labels(&mut self, ticket: LoadTicket, labels: &[u32]) -> Result<(), SessionError> {
        self.ensure_current(ticket)?;
        let handle = self.ready_handle("attach labels")?;
        self.scene
            .insert_attribute(&handle, AttributeArray::labels(LABEL_ATTRIBUTE, labels))?;
        info!("Attached {} predicted labels to mesh {}", labels.len(), handle);
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
    }

    pub fn camera_mut(&mut self) -> &mut crate::camera::Camera {
        self.scene.camera_mut()
    }

    pub fn reset_camera(&mut self) {
        self.scene.reset_camera();
    }

    pub fn frame_mesh(&mut self) {
        self.scene.frame_mesh();
    }

    /// Release the scene and every GPU resource. Terminal.
    pub fn dispose(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Disposed {
            return Err(self.invalid("dispose"));
        }
        match self.handle.take() {
            Some(handle) => self.scene.dispose(handle)?,
            None => self.scene.shutdown(),
        }
        self.pending = None;
        self.loaded = None;
        self.state = SessionState::Disposed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelmesh_core::Point3f;
    use labelmesh_gpu::RecordingTarget;

    fn triangle() -> Mesh {
        Mesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_lifecycle() {
        let mut session = RenderSession::new(RecordingTarget::default());
        assert_eq!(session.state(), SessionState::Empty);
        assert!(matches!(session.render(), Err(SessionError::InvalidState { .. })));

        let ticket = session.begin_load().unwrap();
        assert_eq!(session.state(), SessionState::Loading);
        session.finish_load(ticket, Ok(triangle())).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.render().unwrap();

        session.dispose().unwrap();
        assert_eq!(session.state(), SessionState::Disposed);
        assert!(session.scene().target().is_released());
        assert!(matches!(session.dispose(), Err(SessionError::InvalidState { .. })));
        assert!(matches!(session.begin_load(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn test_failed_load_returns_to_empty() {
        let mut session = RenderSession::new(RecordingTarget::default());
        let ticket = session.begin_load().unwrap();
        session.finish_load(ticket, Ok(triangle())).unwrap();

        let ticket = session.begin_load().unwrap();
        // Previous mesh stays visible while loading
        session.present().unwrap();
        assert!(session.scene().target().last_frame().unwrap().mesh_revision.is_some());

        let error = LoadError::UnsupportedFormat {
            extension: "ply".to_string(),
        };
        assert!(matches!(session.finish_load(ticket, Err(error)), Err(SessionError::Load(_))));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.mesh().is_none());

        session.present().unwrap();
        assert!(session.scene().target().last_frame().unwrap().mesh_revision.is_none());
    }

    #[test]
    fn test_recolor_requires_ready() {
        let mut session = RenderSession::new(RecordingTarget::default());
        let result = session.recolor(LABEL_ATTRIBUTE, &ColorTable::segmentation());
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn test_labels_for_replaced_mesh_are_stale() {
        let mut session = RenderSession::new(RecordingTarget::default());
        let first = session.begin_load().unwrap();
        session.finish_load(first, Ok(triangle())).unwrap();
        let second = session.begin_load().unwrap();
        session.finish_load(second, Ok(triangle())).unwrap();

        let result = session.attach_labels(first, &[0, 1, 2]);
        assert!(result.as_ref().is_err_and(SessionError::is_stale));
        session.attach_labels(second, &[0, 1, 2]).unwrap();
        session.recolor(LABEL_ATTRIBUTE, &ColorTable::segmentation()).unwrap();
        assert_eq!(session.coloring().unwrap().labels(), &[0, 1, 2]);
    }

    #[test]
    fn test_labels_arriving_during_newer_load_are_stale() {
        let mut session = RenderSession::new(RecordingTarget::default());
        let first = session.begin_load().unwrap();
        session.finish_load(first, Ok(triangle())).unwrap();
        session.begin_load().unwrap();

        let result = session.attach_labels(first, &[0, 1, 2]);
        assert!(result.as_ref().is_err_and(SessionError::is_stale));
        assert!(session.mesh().unwrap().attribute(LABEL_ATTRIBUTE).is_none());
    }
}
