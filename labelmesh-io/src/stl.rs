//! STL format support

use crate::{Format, LoadError, MeshReader};
use labelmesh_core::{Mesh, Point3f};
use log::debug;
use std::io::Cursor;

pub struct StlReader;

impl MeshReader for StlReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError> {
        let mut cursor = Cursor::new(bytes);
        // stl_io de-duplicates the triangle soup into an indexed mesh
        let stl = stl_io::read_stl(&mut cursor)
            .map_err(|e| LoadError::parse(Format::Stl, e.to_string()))?;

        let vertices = stl
            .vertices
            .iter()
            .map(|v| Point3f::new(v.0[0], v.0[1], v.0[2]))
            .collect();
        let mut mesh = Mesh::point_cloud(vertices);

        let mut degenerate = 0usize;
        for face in &stl.faces {
            let [a, b, c] = face.vertices;
            if a == b || b == c || a == c {
                degenerate += 1;
                continue;
            }
            mesh.add_face([a, b, c]);
        }

        // STL winding is unreliable in the wild
        mesh.double_sided = true;

        debug!(
            "STL parsed: {} triangles -> {} vertices, {} faces ({} degenerate skipped)",
            stl.faces.len(),
            mesh.vertex_count(),
            mesh.face_count(),
            degenerate
        );

        Ok(mesh)
    }
}
