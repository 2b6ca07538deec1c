//! Format dispatch and async loading

use crate::gltf::{GlbReader, GltfReader};
use crate::obj::ObjReader;
use crate::stl::StlReader;
use crate::vtp::VtpReader;
use crate::{Format, LoadError, MeshReader};
use labelmesh_core::Mesh;
use log::info;
use std::path::Path;

/// Decode `bytes` as `format`.
///
/// The result is all-or-nothing: either a validated, non-empty mesh or an
/// error.
pub fn load(bytes: &[u8], format: Format) -> Result<Mesh, LoadError> {
    let mesh = match format {
        Format::Obj => ObjReader::read_mesh(bytes)?,
        Format::Stl => StlReader::read_mesh(bytes)?,
        Format::Gltf => GltfReader::read_mesh(bytes)?,
        Format::Glb => GlbReader::read_mesh(bytes)?,
        Format::Vtp => VtpReader::read_mesh(bytes)?,
    };

    if mesh.vertex_count() == 0 {
        return Err(LoadError::parse(format, "file contains no geometry"));
    }
    mesh.validate()
        .map_err(|e| LoadError::parse(format, e.to_string()))?;

    info!(
        "Loaded {} mesh: {} vertices, {} faces, {} point arrays",
        format,
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.attributes.len()
    );
    Ok(mesh)
}

/// Decode on tokio's blocking pool so the caller's thread stays responsive
pub async fn load_async(bytes: Vec<u8>, format: Format) -> Result<Mesh, LoadError> {
    tokio::task::spawn_blocking(move || load(&bytes, format))
        .await
        .map_err(|e| LoadError::Task(e.to_string()))?
}

/// Read a file from disk, resolving its format from the extension first.
///
/// Unknown extensions are rejected before the file is opened.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Mesh, LoadError> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let bytes = std::fs::read(path)?;
    load(&bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_geometry_is_rejected() {
        let result = load(b"# nothing here\n", Format::Obj);
        assert!(matches!(result, Err(LoadError::Parse { format: Format::Obj, .. })));
    }

    #[test]
    fn test_out_of_range_face_is_rejected() {
        let result = load(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n", Format::Obj);
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_extension_fails_before_reading() {
        let result = load_file("/definitely/not/here/mesh.ply");
        assert!(matches!(result, Err(LoadError::UnsupportedFormat { .. })));
    }

    #[tokio::test]
    async fn test_load_async_matches_load() {
        let source = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_vec();
        let mesh = load_async(source.clone(), Format::Obj).await.unwrap();
        assert_eq!(mesh, load(&source, Format::Obj).unwrap());
    }
}
