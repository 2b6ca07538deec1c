//! CPU-side vertex data ready for upload

use bytemuck::{Pod, Zeroable};
use labelmesh_core::Mesh;

/// Surface color used when a mesh carries no per-point colors
pub const DEFAULT_SURFACE_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Vertex data for mesh rendering
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    /// Vertex buffer layout descriptor
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// How the vertices of a [`GpuMesh`] are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Points,
}

/// Mesh data structure for GPU rendering
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
    /// Render both faces of every triangle
    pub double_sided: bool,
    /// Bumped by the owner whenever vertices or colors change; targets
    /// re-upload their buffers when it differs from what they hold
    pub revision: u64,
}

impl GpuMesh {
    /// Convert a mesh, falling back to computed normals and a white surface
    pub fn from_mesh(mesh: &Mesh, revision: u64) -> Self {
        let normals = match &mesh.normals {
            Some(normals) => normals.clone(),
            None if mesh.is_point_cloud() => Vec::new(),
            None => mesh.calculate_vertex_normals(),
        };

        let vertices = mesh
            .vertices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let normal = normals.get(i).map(|n| [n.x, n.y, n.z]).unwrap_or([0.0, 0.0, 0.0]);
                let color = mesh
                    .colors
                    .as_ref()
                    .and_then(|colors| colors.get(i))
                    .map(|c| [c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0])
                    .unwrap_or(DEFAULT_SURFACE_COLOR);
                MeshVertex::new([p.x, p.y, p.z], normal, color)
            })
            .collect();

        let (indices, topology) = if mesh.is_point_cloud() {
            (Vec::new(), Topology::Points)
        } else {
            let indices = mesh
                .faces
                .iter()
                .flat_map(|f| f.iter().map(|&i| i as u32))
                .collect();
            (indices, Topology::Triangles)
        };

        Self {
            vertices,
            indices,
            topology,
            double_sided: mesh.double_sided,
            revision,
        }
    }

    /// Overwrite vertex colors in place, e.g. after a recolor
    pub fn set_colors(&mut self, colors: &[[u8; 3]], revision: u64) {
        for (vertex, c) in self.vertices.iter_mut().zip(colors) {
            vertex.color = [c[0] as f32 / 255.0, c[1] as f32 / 255.0, c[2] as f32 / 255.0];
        }
        self.revision = revision;
    }

    /// Restore the uncolored surface
    pub fn clear_colors(&mut self, revision: u64) {
        for vertex in &mut self.vertices {
            vertex.color = DEFAULT_SURFACE_COLOR;
        }
        self.revision = revision;
    }

    /// Number of vertices submitted per draw
    pub fn element_count(&self) -> u32 {
        match self.topology {
            Topology::Triangles => self.indices.len() as u32,
            Topology::Points => self.vertices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use labelmesh_core::Point3f;

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
    fn test_vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 36);
        assert_eq!(MeshVertex::desc().array_stride, 36);
    }

    #[test]
    fn test_from_mesh_defaults() {
        let gpu_mesh = GpuMesh::from_mesh(&triangle(), 7);
        assert_eq!(gpu_mesh.topology, Topology::Triangles);
        assert_eq!(gpu_mesh.indices, vec![0, 1, 2]);
        assert_eq!(gpu_mesh.element_count(), 3);
        assert_eq!(gpu_mesh.revision, 7);
        for vertex in &gpu_mesh.vertices {
            assert_eq!(vertex.color, DEFAULT_SURFACE_COLOR);
            assert_relative_eq!(vertex.normal[2], 1.0);
        }
    }

    #[test]
    fn test_mesh_colors_are_normalized() {
        let mut mesh = triangle();
        mesh.set_colors(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]).unwrap();

        let mut gpu_mesh = GpuMesh::from_mesh(&mesh, 0);
        assert_eq!(gpu_mesh.vertices[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(gpu_mesh.vertices[2].color, [0.0, 0.0, 1.0]);

        gpu_mesh.clear_colors(1);
        assert_eq!(gpu_mesh.vertices[1].color, DEFAULT_SURFACE_COLOR);
        assert_eq!(gpu_mesh.revision, 1);
    }

    #[test]
    fn test_point_cloud_draws_points() {
        let mesh = Mesh::point_cloud(vec![Point3f::origin(), Point3f::new(1.0, 1.0, 1.0)]);
        let gpu_mesh = GpuMesh::from_mesh(&mesh, 0);
        assert_eq!(gpu_mesh.topology, Topology::Points);
        assert!(gpu_mesh.indices.is_empty());
        assert_eq!(gpu_mesh.element_count(), 2);
    }
}
