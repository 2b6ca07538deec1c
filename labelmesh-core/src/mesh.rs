//! Mesh data structures and functionality

use crate::attribute::{AttributeArray, PointAttributes};
use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// Unified in-memory surface: points, triangles and per-point data.
///
/// A mesh without faces is a point cloud. Polygons are fan-triangulated by
/// the loaders, so faces are always index triples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub attributes: PointAttributes,
    /// Attribute array currently used as the coloring channel
    pub active_scalars: Option<String>,
    /// Render both faces of every triangle (for files with unreliable winding)
    pub double_sided: bool,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            ..Self::default()
        }
    }

    /// Create a point cloud (a mesh without faces)
    pub fn point_cloud(vertices: Vec<Point3f>) -> Self {
        Self::from_vertices_and_faces(vertices, Vec::new())
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no points
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn is_point_cloud(&self) -> bool {
        self.faces.is_empty()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Add a polygon as a triangle fan around its first vertex.
    ///
    /// Returns the number of triangles added; polygons with fewer than three
    /// corners add none.
    pub fn add_polygon(&mut self, polygon: &[usize]) -> usize {
        if polygon.len() < 3 {
            return 0;
        }
        for i in 1..polygon.len() - 1 {
            self.faces.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
        polygon.len() - 2
    }

    /// Calculate face normals
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1.cross(&edge2).try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Area-weighted vertex normals.
    ///
    /// Vertices that belong to no (non-degenerate) face get +Y.
    pub fn calculate_vertex_normals(&self) -> Vec<Vector3f> {
        let mut normals = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            let v0 = self.vertices[face[0]];
            let v1 = self.vertices[face[1]];
            let v2 = self.vertices[face[2]];
            // Unnormalized cross product weighs by twice the triangle area
            let weighted = (v1 - v0).cross(&(v2 - v0));
            for &index in face {
                normals[index] += weighted;
            }
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::y))
            .collect()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) -> Result<()> {
        self.check_per_point("normals", normals.len())?;
        self.normals = Some(normals);
        Ok(())
    }

    /// Set vertex colors
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) -> Result<()> {
        self.check_per_point("colors", colors.len())?;
        self.colors = Some(colors);
        Ok(())
    }

    /// Drop derived colors and the active coloring channel
    pub fn clear_colors(&mut self) {
        self.colors = None;
        self.active_scalars = None;
    }

    /// Look up a point-attribute array by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeArray> {
        self.attributes.get(name)
    }

    /// Add or replace a point-attribute array.
    ///
    /// The array must carry exactly one tuple per point. Replacing the array
    /// that currently drives the coloring clears the derived colors, since
    /// they no longer describe the data.
    pub fn insert_attribute(&mut self, array: AttributeArray) -> Result<Option<AttributeArray>> {
        self.check_per_point(array.name(), array.tuple_count())?;
        if self.active_scalars.as_deref() == Some(array.name()) {
            self.clear_colors();
        }
        Ok(self.attributes.insert(array))
    }

    /// Remove a point-attribute array by name
    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeArray> {
        if self.active_scalars.as_deref() == Some(name) {
            self.clear_colors();
        }
        self.attributes.remove(name)
    }

    /// Check the mesh invariants: face indices in bounds and one entry per
    /// point in every per-point array.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i >= vertex_count) {
                return Err(Error::FaceIndexOutOfBounds {
                    face: face_index,
                    index,
                    vertex_count,
                });
            }
        }
        if let Some(normals) = &self.normals {
            self.check_per_point("normals", normals.len())?;
        }
        if let Some(colors) = &self.colors {
            self.check_per_point("colors", colors.len())?;
        }
        for array in self.attributes.iter() {
            self.check_per_point(array.name(), array.tuple_count())?;
        }
        if let Some(active) = &self.active_scalars {
            if !self.attributes.contains(active) {
                return Err(Error::InvalidData(format!(
                    "active scalars '{}' is not an attribute of the mesh",
                    active
                )));
            }
        }
        Ok(())
    }

    fn check_per_point(&self, name: &str, actual: usize) -> Result<()> {
        if actual != self.vertices.len() {
            return Err(Error::AttributeLength {
                name: name.to_string(),
                expected: self.vertices.len(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::LABEL_ATTRIBUTE;
    use approx::assert_relative_eq;

    fn quad() -> Mesh {
        let mut mesh = Mesh::point_cloud(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ]);
        mesh.add_polygon(&[0, 1, 2, 3]);
        mesh
    }

    #[test]
    fn test_polygon_fan_triangulation() {
        let mesh = quad();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(!mesh.is_point_cloud());

        let mut mesh = Mesh::new();
        assert_eq!(mesh.add_polygon(&[0, 1]), 0);
        assert!(mesh.is_point_cloud());
    }

    #[test]
    fn test_vertex_normals_of_flat_quad() {
        let normals = quad().calculate_vertex_normals();
        assert_eq!(normals.len(), 4);
        for normal in normals {
            assert_relative_eq!(normal.z, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_isolated_vertex_normal_defaults_up() {
        let mut mesh = quad();
        mesh.add_vertex(Point3f::new(5.0, 5.0, 5.0));
        let normals = mesh.calculate_vertex_normals();
        assert_eq!(normals[4], Vector3f::y());
    }

    #[test]
    fn test_validate_face_bounds() {
        let mut mesh = quad();
        assert!(mesh.validate().is_ok());

        mesh.add_face([0, 2, 9]);
        match mesh.validate() {
            Err(Error::FaceIndexOutOfBounds { face, index, vertex_count }) => {
                assert_eq!(face, 2);
                assert_eq!(index, 9);
                assert_eq!(vertex_count, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_attribute_length_must_match_points() {
        let mut mesh = quad();
        let result = mesh.insert_attribute(AttributeArray::labels(LABEL_ATTRIBUTE, &[1, 2, 3]));
        assert!(matches!(result, Err(Error::AttributeLength { expected: 4, actual: 3, .. })));
        assert!(mesh.attribute(LABEL_ATTRIBUTE).is_none());

        mesh.insert_attribute(AttributeArray::labels(LABEL_ATTRIBUTE, &[1, 2, 3, 4]))
            .unwrap();
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_replacing_active_attribute_clears_colors() {
        let mut mesh = quad();
        mesh.insert_attribute(AttributeArray::labels(LABEL_ATTRIBUTE, &[0, 1, 1, 0]))
            .unwrap();
        mesh.set_colors(vec![[255, 255, 255]; 4]).unwrap();
        mesh.active_scalars = Some(LABEL_ATTRIBUTE.to_string());

        mesh.insert_attribute(AttributeArray::labels(LABEL_ATTRIBUTE, &[2, 2, 2, 2]))
            .unwrap();
        assert!(mesh.colors.is_none());
        assert!(mesh.active_scalars.is_none());
    }

    #[test]
    fn test_set_colors_rejects_wrong_length() {
        let mut mesh = quad();
        assert!(mesh.set_colors(vec![[0, 0, 0]; 3]).is_err());
        assert!(mesh.colors.is_none());
    }
}
