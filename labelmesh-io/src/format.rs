//! Supported mesh file formats

use crate::error::LoadError;
use std::fmt;
use std::path::Path;

/// A mesh encoding the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Wavefront OBJ text
    Obj,
    /// STL surface triangles, binary or ASCII
    Stl,
    /// glTF 2.0 JSON with embedded buffers
    Gltf,
    /// glTF 2.0 packed binary
    Glb,
    /// VTK XML PolyData
    Vtp,
}

impl Format {
    pub const ALL: [Format; 5] = [Format::Obj, Format::Stl, Format::Gltf, Format::Glb, Format::Vtp];

    /// Resolve a file extension, case-insensitively and with or without the
    /// leading dot
    pub fn from_extension(extension: &str) -> Result<Self, LoadError> {
        let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "obj" => Ok(Format::Obj),
            "stl" => Ok(Format::Stl),
            "gltf" => Ok(Format::Gltf),
            "glb" => Ok(Format::Glb),
            "vtp" => Ok(Format::Vtp),
            _ => Err(LoadError::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    /// Resolve the format from a path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| LoadError::UnsupportedFormat {
                extension: path.display().to_string(),
            })?;
        Self::from_extension(extension)
    }

    /// Canonical file extension
    pub fn extension(self) -> &'static str {
        match self {
            Format::Obj => "obj",
            Format::Stl => "stl",
            Format::Gltf => "gltf",
            Format::Glb => "glb",
            Format::Vtp => "vtp",
        }
    }

    /// Extensions accepted by the file input surface
    pub fn accepted_extensions() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.extension()).collect()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Obj => "OBJ",
            Format::Stl => "STL",
            Format::Gltf => "glTF",
            Format::Glb => "GLB",
            Format::Vtp => "VTP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_resolution() {
        assert_eq!(Format::from_extension("obj").unwrap(), Format::Obj);
        assert_eq!(Format::from_extension(".STL").unwrap(), Format::Stl);
        assert_eq!(Format::from_extension("Glb").unwrap(), Format::Glb);
        assert_eq!(Format::from_path("scans/jaw.vtp").unwrap(), Format::Vtp);
        assert_eq!(Format::from_path("model.gltf").unwrap(), Format::Gltf);
    }

    #[test]
    fn test_unknown_extensions_are_rejected() {
        for name in ["cloud.ply", "notes.txt", "archive.tar.gz", "no_extension"] {
            match Format::from_path(name) {
                Err(LoadError::UnsupportedFormat { .. }) => {}
                other => panic!("{} resolved to {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_accepted_extensions_round_trip() {
        for extension in Format::accepted_extensions() {
            assert_eq!(Format::from_extension(extension).unwrap().extension(), extension);
        }
    }
}
