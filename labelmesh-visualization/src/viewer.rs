//! Interactive windowed viewer
//!
//! Drives a [`RenderSession`] from a winit event loop. File parsing and
//! prediction service calls run on a tokio runtime and report back through
//! the event loop proxy, so the render thread never blocks on them.
//!
//! Keys: `O` open, `R` reset camera, `F` frame mesh, `C` color by labels,
//! `P` predict labels, `S` segment on the service, `D` save the last result,
//! `M` toggle orbit/pan, `Esc` quit.

use crate::session::{LoadTicket, RenderSession, SessionState};
use labelmesh_core::{ColorTable, Error, Mesh, Result, LABEL_ATTRIBUTE};
use labelmesh_gpu::{RenderConfig, SurfaceRenderer};
use labelmesh_io::{
    load_async, Format, LoadError, NetworkError, PredictionClient, RemoteConfig, ResultFile,
    RESULT_FILE_NAME,
};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

/// Radians of orbit per pixel of mouse travel
const ORBIT_SPEED: f32 = 0.01;
/// Fraction of the eye distance panned per pixel
const PAN_SPEED: f32 = 0.002;
const ZOOM_SPEED: f32 = 0.1;

/// Interactive viewer settings
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub render: RenderConfig,
    pub remote: RemoteConfig,
    /// Attribute used for label coloring
    pub color_attribute: String,
    pub color_table: ColorTable,
    /// Color as soon as a mesh with the label attribute arrives
    pub auto_color: bool,
    /// Where `D` saves the segmentation result
    pub download_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "labelmesh".to_string(),
            width: 1200,
            height: 800,
            render: RenderConfig::default(),
            remote: RemoteConfig::default(),
            color_attribute: LABEL_ATTRIBUTE.to_string(),
            color_table: ColorTable::segmentation(),
            auto_color: true,
            download_dir: PathBuf::from("."),
        }
    }
}

/// Completions delivered to the event loop by background tasks
#[derive(Debug)]
pub enum ViewerEvent {
    Loaded {
        ticket: LoadTicket,
        source: SourceFile,
        result: std::result::Result<Mesh, LoadError>,
    },
    Predicted {
        ticket: LoadTicket,
        result: std::result::Result<Vec<u32>, NetworkError>,
    },
    Segmented {
        ticket: LoadTicket,
        result: std::result::Result<ResultFile, NetworkError>,
    },
}

/// Bytes of the file a mesh was loaded from, kept for service uploads
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Camera control modes for left-button drags
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMode {
    Orbit,
    Pan,
}

/// Windowed viewer for labelled meshes
pub struct InteractiveViewer {
    config: ViewerConfig,
}

impl InteractiveViewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    /// Open the window and run until it is closed, optionally loading
    /// `initial` right away
    pub fn run(self, initial: Option<PathBuf>) -> Result<()> {
        let event_loop = EventLoopBuilder::<ViewerEvent>::with_user_event()
            .build()
            .map_err(|e| Error::Visualization(format!("Failed to create event loop: {}", e)))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(&self.config.title)
                .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height))
                .build(&event_loop)
                .map_err(|e| Error::Visualization(format!("Failed to create window: {}", e)))?,
        );

        let renderer = pollster::block_on(SurfaceRenderer::new(window.clone(), self.config.render.clone()))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let client = match PredictionClient::new(self.config.remote.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Prediction service disabled: {}", e);
                None
            }
        };

        let mut app = ViewerApp {
            session: RenderSession::new(renderer),
            config: self.config,
            window,
            runtime,
            client,
            proxy: event_loop.create_proxy(),
            source: None,
            last_result: None,
            camera_mode: CameraMode::Orbit,
            last_mouse_pos: None,
            left_pressed: false,
            right_pressed: false,
        };
        app.set_status("drop in a mesh with O");
        if let Some(path) = initial {
            app.open_path(&path);
        }

        event_loop
            .run(move |event, elwt| {
                elwt.set_control_flow(ControlFlow::Poll);
                match event {
                    Event::WindowEvent { event, .. } => app.handle_window_event(event, elwt),
                    Event::UserEvent(event) => app.handle_user_event(event),
                    Event::LoopExiting => app.shutdown(),
                    _ => {}
                }
            })
            .map_err(|e| Error::Visualization(format!("Event loop error: {}", e)))?;

        Ok(())
    }
}

struct ViewerApp {
    config: ViewerConfig,
    window: Arc<Window>,
    session: RenderSession<SurfaceRenderer>,
    runtime: tokio::runtime::Runtime,
    client: Option<Arc<PredictionClient>>,
    proxy: EventLoopProxy<ViewerEvent>,
    /// File behind the attached mesh
    source: Option<SourceFile>,
    last_result: Option<ResultFile>,
    camera_mode: CameraMode,
    last_mouse_pos: Option<PhysicalPosition<f64>>,
    left_pressed: bool,
    right_pressed: bool,
}

impl ViewerApp {
    fn set_status(&self, status: &str) {
        info!("{}", status);
        self.window.set_title(&format!("{} - {}", self.config.title, status));
    }

    fn report(&self, context: &str, e: &dyn std::fmt::Display) {
        error!("{}: {}", context, e);
        self.window.set_title(&format!("{} - {}: {}", self.config.title, context, e));
    }

    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<ViewerEvent>) {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => self.session.resize(size.width, size.height),
            WindowEvent::MouseInput { state, button, .. } => match button {
                MouseButton::Left => self.left_pressed = state == ElementState::Pressed,
                MouseButton::Right => self.right_pressed = state == ElementState::Pressed,
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(last) = self.last_mouse_pos {
                    let dx = (position.x - last.x) as f32;
                    let dy = (position.y - last.y) as f32;
                    let mode = if self.right_pressed {
                        Some(CameraMode::Pan)
                    } else if self.left_pressed {
                        Some(self.camera_mode)
                    } else {
                        None
                    };
                    match mode {
                        Some(CameraMode::Orbit) => self.session.camera_mut().orbit(dx * ORBIT_SPEED, dy * ORBIT_SPEED),
                        Some(CameraMode::Pan) => self.session.camera_mut().pan(dx * PAN_SPEED, dy * PAN_SPEED),
                        None => {}
                    }
                }
                self.last_mouse_pos = Some(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.session.camera_mut().zoom(scroll * ZOOM_SPEED);
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match &event.logical_key {
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    Key::Character(c) => self.handle_key(c.as_str()),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.session.present() {
                    error!("Render error: {}", e);
                }
                self.window.request_redraw();
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: &str) {
        match key.to_ascii_lowercase().as_str() {
            "o" => self.open_dialog(),
            "r" => self.session.reset_camera(),
            "f" => self.session.frame_mesh(),
            "c" => self.recolor(),
            "p" => self.request_prediction(),
            "s" => self.request_segmentation(),
            "d" => self.save_result(),
            "m" => {
                self.camera_mode = match self.camera_mode {
                    CameraMode::Orbit => CameraMode::Pan,
                    CameraMode::Pan => CameraMode::Orbit,
                };
                info!("Switched to {:?} mode", self.camera_mode);
            }
            _ => {}
        }
    }

    fn open_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Meshes", Format::accepted_extensions().as_slice())
            .pick_file();
        if let Some(path) = picked {
            self.open_path(&path);
        }
    }

    fn open_path(&mut self, path: &Path) {
        // Unknown extensions never reach the loader
        let format = match Format::from_path(path) {
            Ok(format) => format,
            Err(e) => return self.report("Cannot open file", &e),
        };
        let ticket = match self.session.begin_load() {
            Ok(ticket) => ticket,
            Err(e) => return self.report("Cannot open file", &e),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.set_status(&format!("loading {}", name));

        let path = path.to_path_buf();
        let proxy = self.proxy.clone();
        self.runtime.spawn(async move {
            let (bytes, result) = match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let result = load_async(bytes.clone(), format).await;
                    (bytes, result)
                }
                Err(e) => (Vec::new(), Err(LoadError::Io(e))),
            };
            let source = SourceFile {
                name,
                bytes: Arc::new(bytes),
            };
            let _ = proxy.send_event(ViewerEvent::Loaded { ticket, source, result });
        });
    }

    fn load_bytes(&mut self, name: &str, bytes: Vec<u8>, format: Format) {
        let ticket = match self.session.begin_load() {
            Ok(ticket) => ticket,
            Err(e) => return self.report("Cannot load result", &e),
        };
        self.set_status(&format!("loading {}", name));

        let name = name.to_string();
        let proxy = self.proxy.clone();
        self.runtime.spawn(async move {
            let result = load_async(bytes.clone(), format).await;
            let source = SourceFile {
                name,
                bytes: Arc::new(bytes),
            };
            let _ = proxy.send_event(ViewerEvent::Loaded { ticket, source, result });
        });
    }

    fn handle_user_event(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Loaded { ticket, source, result } => match self.session.finish_load(ticket, result) {
                Ok(_) => {
                    let name = source.name.clone();
                    self.source = Some(source);
                    self.session.frame_mesh();
                    self.set_status(&format!("showing {}", name));
                    if self.config.auto_color && self.has_color_attribute() {
                        self.recolor();
                    }
                }
                Err(e) if e.is_stale() => {}
                Err(e) => {
                    self.source = None;
                    self.report("Load failed", &e);
                }
            },
            // Service answers for a mesh that has since been replaced are dropped
            ViewerEvent::Predicted { ticket, .. } | ViewerEvent::Segmented { ticket, .. }
                if self.session.ensure_current(ticket).is_err() => {}
            ViewerEvent::Predicted { ticket, result } => match result {
                Ok(labels) => match self.session.attach_labels(ticket, &labels) {
                    Ok(()) => {
                        self.set_status(&format!("received {} labels", labels.len()));
                        if self.config.auto_color {
                            self.recolor();
                        }
                    }
                    Err(e) if e.is_stale() => {}
                    Err(e) => self.report("Cannot use predicted labels", &e),
                },
                Err(e) => self.report("Prediction failed", &e),
            },
            ViewerEvent::Segmented { result, .. } => match result {
                Ok(result_file) => {
                    let bytes = result_file.bytes().to_vec();
                    self.last_result = Some(result_file);
                    self.load_bytes(RESULT_FILE_NAME, bytes, Format::Vtp);
                }
                Err(e) => self.report("Segmentation failed", &e),
            },
        }
    }

    fn has_color_attribute(&self) -> bool {
        self.session
            .mesh()
            .is_some_and(|mesh| mesh.attribute(&self.config.color_attribute).is_some())
    }

    fn recolor(&mut self) {
        let attribute = self.config.color_attribute.clone();
        match self.session.recolor(&attribute, &self.config.color_table) {
            Ok(()) => {
                let legend = self
                    .session
                    .coloring()
                    .map(|coloring| coloring.legend())
                    .unwrap_or_default();
                for entry in &legend {
                    info!("  {:<12} {:>8} points", entry.name, entry.point_count);
                }
                self.set_status(&format!("colored by '{}'", attribute));
            }
            Err(e) => self.report("Cannot color mesh", &e),
        }
    }

    /// Service upload input: the client and the file behind the current mesh
    fn upload_input(&self, what: &str) -> Option<(Arc<PredictionClient>, SourceFile, LoadTicket)> {
        let ticket = match (self.session.state(), self.session.loaded_ticket()) {
            (SessionState::Ready, Some(ticket)) => ticket,
            _ => {
                self.set_status(&format!("load a mesh before requesting {}", what));
                return None;
            }
        };
        let Some(client) = self.client.clone() else {
            self.set_status("prediction service is not configured");
            return None;
        };
        let source = self.source.clone()?;
        Some((client, source, ticket))
    }

    fn request_prediction(&mut self) {
        let Some((client, source, ticket)) = self.upload_input("a prediction") else {
            return;
        };
        self.set_status(&format!("predicting labels for {}", source.name));
        let proxy = self.proxy.clone();
        self.runtime.spawn(async move {
            let result = client.predict_labels(&source.name, source.bytes.to_vec()).await;
            let _ = proxy.send_event(ViewerEvent::Predicted { ticket, result });
        });
    }

    fn request_segmentation(&mut self) {
        let Some((client, source, ticket)) = self.upload_input("a segmentation") else {
            return;
        };
        self.set_status(&format!("segmenting {}", source.name));
        let proxy = self.proxy.clone();
        self.runtime.spawn(async move {
            let result = client.segment_and_fetch(&source.name, source.bytes.to_vec()).await;
            let _ = proxy.send_event(ViewerEvent::Segmented { ticket, result });
        });
    }

    fn save_result(&self) {
        let Some(result) = &self.last_result else {
            self.set_status("no segmentation result to save yet");
            return;
        };
        match result.save_to_dir(&self.config.download_dir) {
            Ok(path) => self.set_status(&format!("saved {}", path.display())),
            Err(e) => self.report("Cannot save result", &e),
        }
    }

    fn shutdown(&mut self) {
        if self.session.state() != SessionState::Disposed {
            if let Err(e) = self.session.dispose() {
                error!("Dispose failed: {}", e);
            }
        }
    }
}
