//! OBJ format support

use crate::{Format, LoadError, MeshReader};
use labelmesh_core::{Mesh, Point3f, Vector3f};
use log::{debug, warn};
use obj::{LoadConfig, ObjData};

pub struct ObjReader;

impl MeshReader for ObjReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError> {
        // Unknown statements (points, curves, smoothing groups) are skipped
        let data = ObjData::load_buf_with_config(bytes, LoadConfig { strict: false })
            .map_err(|e| LoadError::parse(Format::Obj, e.to_string()))?;

        let vertices: Vec<Point3f> = data
            .position
            .iter()
            .map(|&[x, y, z]| Point3f::new(x, y, z))
            .collect();
        let mut mesh = Mesh::point_cloud(vertices);

        // Normals survive only if every face corner agrees on one per position
        let mut normals_consistent = !data.normal.is_empty();
        let mut normal_slots: Vec<Option<usize>> = vec![None; mesh.vertex_count()];

        let polygons = data
            .objects
            .iter()
            .flat_map(|object| &object.groups)
            .flat_map(|group| &group.polys);

        let mut polygon_count = 0usize;
        let mut skipped = 0usize;
        for polygon in polygons {
            polygon_count += 1;
            let positions: Vec<usize> = polygon.0.iter().map(|corner| corner.0).collect();

            if mesh.add_polygon(&positions) == 0 {
                skipped += 1;
                continue;
            }
            if !normals_consistent {
                continue;
            }

            for corner in &polygon.0 {
                let Some(normal) = corner.2 else {
                    normals_consistent = false;
                    break;
                };
                match normal_slots.get_mut(corner.0) {
                    Some(Some(existing)) if *existing != normal => {
                        debug!("OBJ normals are not per-vertex, dropping them");
                        normals_consistent = false;
                        break;
                    }
                    Some(slot) => *slot = Some(normal),
                    // Out-of-range positions are reported by validation
                    None => {}
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} OBJ faces with fewer than three corners", skipped);
        }

        if normals_consistent {
            let normals: Option<Vec<Vector3f>> = normal_slots
                .into_iter()
                .map(|slot| {
                    slot.and_then(|n| data.normal.get(n))
                        .map(|&[x, y, z]| Vector3f::new(x, y, z))
                })
                .collect();
            if let Some(normals) = normals {
                mesh.set_normals(normals)
                    .map_err(|e| LoadError::parse(Format::Obj, e.to_string()))?;
            }
        }

        debug!(
            "OBJ parsed: {} vertices, {} polygons -> {} triangles",
            mesh.vertex_count(),
            polygon_count,
            mesh.face_count()
        );

        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quads_are_triangulated() {
        let source = b"\
# unit square split in two quads
v 0 0 0
v 1 0 0
v 2 0 0
v 0 1 0
v 1 1 0
v 2 1 0
f 1 2 5 4
f 2 3 6 5
";
        let mesh = ObjReader::read_mesh(source).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.faces[0], [0, 1, 4]);
        assert_eq!(mesh.faces[1], [0, 4, 3]);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_consistent_normals_are_kept() {
        let source = b"\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
";
        let mesh = ObjReader::read_mesh(source).unwrap();
        let normals = mesh.normals.expect("normals");
        assert_eq!(normals, vec![Vector3f::z(); 3]);
    }

    #[test]
    fn test_conflicting_normals_are_dropped() {
        let source = b"\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
vn 0 0 1
vn 0 0 -1
f 1//1 2//1 3//1
f 2//2 4//2 3//2
";
        let mesh = ObjReader::read_mesh(source).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_vertices_without_faces_form_a_point_cloud() {
        let mesh = ObjReader::read_mesh(b"v 0 0 0\nv 1 2 3\n").unwrap();
        assert!(mesh.is_point_cloud());
        assert_eq!(mesh.vertices[1], Point3f::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_relative_indices_and_texture_corners() {
        let source = b"\
o patch
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f -3/1 -2/2 -1/3
p 1
";
        let mesh = ObjReader::read_mesh(source).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_malformed_vertex_is_a_parse_error() {
        let result = ObjReader::read_mesh(b"v 0 zero 0\n");
        assert!(matches!(result, Err(LoadError::Parse { format: Format::Obj, .. })));
    }
}
