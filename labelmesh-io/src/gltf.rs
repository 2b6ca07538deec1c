//! glTF 2.0 support (`.gltf` with embedded buffers and packed `.glb`)
//!
//! The scene graph is flattened: every mesh primitive reachable from the
//! default scene is appended to one [`Mesh`] with its node's world transform
//! baked into the positions. Materials, textures and animations are ignored.

use crate::{Format, LoadError, MeshReader};
use gltf::mesh::Mode;
use labelmesh_core::{Mesh, Point3f, Vector3f};
use log::{debug, warn};
use nalgebra::{Matrix3, Matrix4};

pub struct GltfReader;

impl MeshReader for GltfReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError> {
        read_gltf(bytes, Format::Gltf)
    }
}

pub struct GlbReader;

impl MeshReader for GlbReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError> {
        read_gltf(bytes, Format::Glb)
    }
}

/// Geometry accumulated while walking the node tree
struct SceneGeometry {
    mesh: Mesh,
    normals: Vec<Vector3f>,
    complete_normals: bool,
    primitives: usize,
}

fn read_gltf(bytes: &[u8], format: Format) -> Result<Mesh, LoadError> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|e| LoadError::parse(format, e.to_string()))?;
    // Buffers only: images are never decoded since materials are discarded
    let buffers = gltf::import_buffers(&document, None, blob)
        .map_err(|e| LoadError::parse(format, e.to_string()))?;

    let mut geometry = SceneGeometry {
        mesh: Mesh::new(),
        normals: Vec::new(),
        complete_normals: true,
        primitives: 0,
    };

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit_node(&node, &Matrix4::identity(), &buffers, format, &mut geometry)?;
            }
        }
        None => {
            // No scene graph: take every mesh untransformed
            for mesh in document.meshes() {
                append_mesh(&mesh, &Matrix4::identity(), &buffers, format, &mut geometry)?;
            }
        }
    }

    let SceneGeometry {
        mut mesh,
        normals,
        complete_normals,
        primitives,
    } = geometry;

    if complete_normals && !normals.is_empty() {
        mesh.set_normals(normals)
            .map_err(|e| LoadError::parse(format, e.to_string()))?;
    }

    debug!(
        "{} parsed: {} primitives -> {} vertices, {} faces",
        format,
        primitives,
        mesh.vertex_count(),
        mesh.face_count()
    );

    Ok(mesh)
}

fn visit_node(
    node: &gltf::Node<'_>,
    parent: &Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
    format: Format,
    geometry: &mut SceneGeometry,
) -> Result<(), LoadError> {
    let local = Matrix4::from(node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        append_mesh(&mesh, &world, buffers, format, geometry)?;
    }
    for child in node.children() {
        visit_node(&child, &world, buffers, format, geometry)?;
    }
    Ok(())
}

fn append_mesh(
    mesh: &gltf::Mesh<'_>,
    world: &Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
    format: Format,
    geometry: &mut SceneGeometry,
) -> Result<(), LoadError> {
    let normal_matrix = world
        .fixed_view::<3, 3>(0, 0)
        .into_owned()
        .try_inverse()
        .map(|m: Matrix3<f32>| m.transpose());

    for primitive in mesh.primitives() {
        let mode = primitive.mode();
        if matches!(mode, Mode::Lines | Mode::LineLoop | Mode::LineStrip) {
            warn!("Skipping glTF line primitive in mesh {:?}", mesh.name());
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
        let positions: Vec<[f32; 3]> = match reader.read_positions() {
            Some(positions) => positions.collect(),
            None => {
                warn!("Skipping glTF primitive without positions in mesh {:?}", mesh.name());
                continue;
            }
        };

        let base = geometry.mesh.vertex_count();
        for p in &positions {
            let world_point = world.transform_point(&Point3f::new(p[0], p[1], p[2]));
            geometry.mesh.add_vertex(world_point);
        }

        match (reader.read_normals(), normal_matrix) {
            (Some(normals), Some(normal_matrix)) => {
                geometry.normals.extend(normals.map(|n| {
                    (normal_matrix * Vector3f::new(n[0], n[1], n[2]))
                        .try_normalize(f32::EPSILON)
                        .unwrap_or_else(Vector3f::y)
                }));
            }
            _ => geometry.complete_normals = false,
        }

        if mode == Mode::Points {
            geometry.primitives += 1;
            continue;
        }

        let indices: Vec<usize> = match reader.read_indices() {
            Some(indices) => indices.into_u32().map(|i| i as usize).collect(),
            None => (0..positions.len()).collect(),
        };
        if let Some(&bad) = indices.iter().find(|&&i| i >= positions.len()) {
            return Err(LoadError::parse(
                format,
                format!(
                    "primitive index {} out of range for {} positions",
                    bad,
                    positions.len()
                ),
            ));
        }

        for [a, b, c] in triangles(mode, &indices) {
            geometry.mesh.add_face([base + a, base + b, base + c]);
        }
        geometry.primitives += 1;
    }
    Ok(())
}

/// Expand a primitive's index stream into triangle-list order
fn triangles(mode: Mode, indices: &[usize]) -> Vec<[usize; 3]> {
    match mode {
        Mode::Triangles => indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, t)| {
                // Every other strip triangle flips winding
                if i % 2 == 0 {
                    [t[0], t[1], t[2]]
                } else {
                    [t[1], t[0], t[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => {
            if indices.len() < 3 {
                return Vec::new();
            }
            indices[1..]
                .windows(2)
                .map(|t| [indices[0], t[0], t[1]])
                .collect()
        }
        _ => Vec::new(),
    }
}
