//! Render targets and the windowed wgpu renderer

use crate::device::GpuContext;
use crate::mesh::{GpuMesh, MeshVertex, Topology};
use bytemuck::{Pod, Zeroable};
use labelmesh_core::{Error, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Background every view is cleared to
pub const DEFAULT_BACKGROUND: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

/// Sky/ground light: surfaces facing `up` get the sky color, surfaces facing
/// away get the ground color, with a smooth blend in between
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub intensity: f32,
    pub up: Vector3<f32>,
}

impl Default for HemisphereLight {
    fn default() -> Self {
        Self {
            sky_color: [1.0, 1.0, 1.0],
            ground_color: [0.0, 0.0, 0.0],
            intensity: 1.0,
            up: Vector3::y(),
        }
    }
}

impl HemisphereLight {
    pub fn to_uniform(&self) -> LightUniform {
        let up = self.up.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y);
        LightUniform {
            sky: [self.sky_color[0], self.sky_color[1], self.sky_color[2], self.intensity],
            ground: [self.ground_color[0], self.ground_color[1], self.ground_color[2], 0.0],
            up: [up.x, up.y, up.z, 0.0],
        }
    }
}

/// Light uniform layout shared with `mesh.wgsl`
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightUniform {
    pub sky: [f32; 4],
    pub ground: [f32; 4],
    pub up: [f32; 4],
}

/// Camera uniform data
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

/// Everything a target needs to draw one frame besides the geometry
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub view_proj: Matrix4<f32>,
    pub eye: Point3<f32>,
    pub light: HemisphereLight,
    pub background: [f64; 4],
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            view_proj: Matrix4::identity(),
            eye: Point3::origin(),
            light: HemisphereLight::default(),
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl FrameState {
    pub fn camera_uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.view_proj.into(),
            eye: [self.eye.x, self.eye.y, self.eye.z, 1.0],
        }
    }
}

/// A surface frames are drawn into.
///
/// Targets own all GPU resources they create. After [`release`] every
/// resource is gone and further draws fail.
///
/// [`release`]: RenderTarget::release
pub trait RenderTarget {
    /// Clear to the frame background and draw `mesh` if there is one
    fn draw(&mut self, frame: &FrameState, mesh: Option<&GpuMesh>) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);

    /// Current size in physical pixels
    fn size(&self) -> (u32, u32);

    /// Free every GPU resource held by the target
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub enable_depth_test: bool,
    pub enable_backface_culling: bool,
    pub enable_multisampling: bool,
    pub vsync: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enable_depth_test: true,
            enable_backface_culling: true,
            enable_multisampling: true,
            vsync: true,
        }
    }
}

impl RenderConfig {
    fn sample_count(&self) -> u32 {
        if self.enable_multisampling {
            4
        } else {
            1
        }
    }
}

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Buffers for the mesh currently on the GPU
struct UploadedMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    element_count: u32,
    topology: Topology,
    double_sided: bool,
    revision: u64,
}

impl UploadedMesh {
    fn destroy(self) {
        self.vertex_buffer.destroy();
        if let Some(index_buffer) = self.index_buffer {
            index_buffer.destroy();
        }
    }
}

struct Attachments {
    depth: Option<wgpu::Texture>,
    msaa: Option<wgpu::Texture>,
}

impl Attachments {
    fn destroy(self) {
        if let Some(depth) = self.depth {
            depth.destroy();
        }
        if let Some(msaa) = self.msaa {
            msaa.destroy();
        }
    }
}

struct Pipelines {
    culled: wgpu::RenderPipeline,
    double_sided: wgpu::RenderPipeline,
    points: wgpu::RenderPipeline,
}

/// wgpu renderer presenting into a window surface
pub struct SurfaceRenderer {
    context: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    config: RenderConfig,
    pipelines: Pipelines,
    camera_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    attachments: Option<Attachments>,
    uploaded: Option<UploadedMesh>,
    released: bool,
}

impl SurfaceRenderer {
    pub async fn new(window: Arc<Window>, config: RenderConfig) -> Result<Self> {
        let size = window.inner_size();
        let (context, surface) = GpuContext::for_window(window).await?;

        let surface_caps = surface.get_capabilities(&context.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface reports no supported formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if config.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &surface_config);

        let camera_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::bytes_of(&FrameState::default().camera_uniform()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_buffer = context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::bytes_of(&HemisphereLight::default().to_uniform()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = context.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh_bind_group_layout"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
            ],
        });

        let shader = context.create_shader_module("Mesh Shader", include_str!("shaders/mesh.wgsl"));
        let layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let culled_face = if config.enable_backface_culling {
            Some(wgpu::Face::Back)
        } else {
            None
        };
        let pipelines = Pipelines {
            culled: Self::create_pipeline(
                &context.device,
                &layout,
                &shader,
                surface_format,
                &config,
                wgpu::PrimitiveTopology::TriangleList,
                culled_face,
                "Culled",
            ),
            double_sided: Self::create_pipeline(
                &context.device,
                &layout,
                &shader,
                surface_format,
                &config,
                wgpu::PrimitiveTopology::TriangleList,
                None,
                "Double-sided",
            ),
            points: Self::create_pipeline(
                &context.device,
                &layout,
                &shader,
                surface_format,
                &config,
                wgpu::PrimitiveTopology::PointList,
                None,
                "Points",
            ),
        };

        let mut renderer = Self {
            context,
            surface,
            surface_config,
            config,
            pipelines,
            camera_buffer,
            light_buffer,
            bind_group,
            attachments: None,
            uploaded: None,
            released: false,
        };
        renderer.recreate_attachments();
        Ok(renderer)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        config: &RenderConfig,
        topology: wgpu::PrimitiveTopology,
        cull_mode: Option<wgpu::Face>,
        label: &str,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Mesh Render Pipeline", label)),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[MeshVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: if config.enable_depth_test {
                Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                })
            } else {
                None
            },
            multisample: wgpu::MultisampleState {
                count: config.sample_count(),
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    fn recreate_attachments(&mut self) {
        if let Some(old) = self.attachments.take() {
            old.destroy();
        }
        let (width, height) = (self.surface_config.width, self.surface_config.height);
        let sample_count = self.config.sample_count();
        let depth = self.config.enable_depth_test.then(|| {
            self.context
                .create_attachment("Depth Texture", width, height, DEPTH_FORMAT, sample_count)
        });
        let msaa = self.config.enable_multisampling.then(|| {
            self.context.create_attachment(
                "MSAA Texture",
                width,
                height,
                self.surface_config.format,
                sample_count,
            )
        });
        self.attachments = Some(Attachments { depth, msaa });
    }

    /// Make sure the GPU holds `mesh` at its current revision
    fn upload(&mut self, mesh: &GpuMesh) {
        if let Some(uploaded) = &self.uploaded {
            if uploaded.revision == mesh.revision {
                return;
            }
        }
        if let Some(old) = self.uploaded.take() {
            old.destroy();
        }

        let vertex_buffer = self.context.create_buffer_init(
            "Mesh Vertex Buffer",
            &mesh.vertices,
            wgpu::BufferUsages::VERTEX,
        );
        let index_buffer = match mesh.topology {
            Topology::Triangles if !mesh.indices.is_empty() => Some(self.context.create_buffer_init(
                "Mesh Index Buffer",
                &mesh.indices,
                wgpu::BufferUsages::INDEX,
            )),
            _ => None,
        };
        log::debug!(
            "Uploaded mesh revision {}: {} vertices, {} indices",
            mesh.revision,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        self.uploaded = Some(UploadedMesh {
            vertex_buffer,
            index_buffer,
            element_count: mesh.element_count(),
            topology: mesh.topology,
            double_sided: mesh.double_sided,
            revision: mesh.revision,
        });
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.context.device, &self.surface_config);
        self.recreate_attachments();
    }
}

impl RenderTarget for SurfaceRenderer {
    fn draw(&mut self, frame: &FrameState, mesh: Option<&GpuMesh>) -> Result<()> {
        if self.released {
            return Err(Error::Gpu("Renderer has been released".to_string()));
        }

        match mesh {
            Some(mesh) if !mesh.vertices.is_empty() => self.upload(mesh),
            _ => {
                if let Some(old) = self.uploaded.take() {
                    old.destroy();
                }
            }
        }

        self.context
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&frame.camera_uniform()));
        self.context
            .queue
            .write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&frame.light.to_uniform()));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                // Skip this frame; the next one draws into the fresh surface
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface texture timed out, dropping frame");
                return Ok(());
            }
            Err(e) => return Err(Error::Gpu(format!("Failed to get surface texture: {}", e))),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let attachments = self.attachments.as_ref();
        let depth_view = attachments
            .and_then(|a| a.depth.as_ref())
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
        let msaa_view = attachments
            .and_then(|a| a.msaa.as_ref())
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

        let (color_view, resolve_target) = match &msaa_view {
            Some(msaa_view) => (msaa_view, Some(&view)),
            None => (&view, None),
        };

        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Mesh Render Encoder"),
        });

        {
            let [r, g, b, a] = frame.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mesh Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(uploaded) = &self.uploaded {
                let pipeline = match (uploaded.topology, uploaded.double_sided) {
                    (Topology::Points, _) => &self.pipelines.points,
                    (Topology::Triangles, true) => &self.pipelines.double_sided,
                    (Topology::Triangles, false) => &self.pipelines.culled,
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, uploaded.vertex_buffer.slice(..));
                match &uploaded.index_buffer {
                    Some(index_buffer) => {
                        render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..uploaded.element_count, 0, 0..1);
                    }
                    None => render_pass.draw(0..uploaded.element_count, 0..1),
                }
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.released || width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.reconfigure();
    }

    fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(uploaded) = self.uploaded.take() {
            uploaded.destroy();
        }
        if let Some(attachments) = self.attachments.take() {
            attachments.destroy();
        }
        self.camera_buffer.destroy();
        self.light_buffer.destroy();
        self.released = true;
        log::debug!("Surface renderer released");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for SurfaceRenderer {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layouts() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
    }

    #[test]
    fn test_default_light_and_background() {
        let uniform = HemisphereLight::default().to_uniform();
        assert_eq!(uniform.sky, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform.ground, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.up, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(FrameState::default().background, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_light_up_is_normalized() {
        let light = HemisphereLight {
            up: Vector3::new(0.0, 0.0, 4.0),
            ..HemisphereLight::default()
        };
        assert_eq!(light.to_uniform().up, [0.0, 0.0, 1.0, 0.0]);
    }
}
