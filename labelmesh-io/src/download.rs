//! Segmentation result blobs

use crate::{load, Format, LoadError};
use labelmesh_core::Mesh;
use log::info;
use std::path::{Path, PathBuf};

/// File name a saved segmentation result always gets
pub const RESULT_FILE_NAME: &str = "out_downsampled_refined.vtp";

/// A VTP result as retrieved from the prediction service
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFile {
    bytes: Vec<u8>,
}

impl ResultFile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Decode the result exactly like a local `.vtp` file
    pub fn load(&self) -> Result<Mesh, LoadError> {
        load(&self.bytes, Format::Vtp)
    }

    /// Write the result into `dir` under [`RESULT_FILE_NAME`]
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(RESULT_FILE_NAME);
        std::fs::write(&path, &self.bytes)?;
        info!("Saved segmentation result to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_uses_fixed_name() {
        let dir = std::env::temp_dir().join(format!("labelmesh-download-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let result = ResultFile::new(b"<VTKFile/>".to_vec());
        let path = result.save_to_dir(&dir).unwrap();
        assert_eq!(path.file_name().unwrap(), RESULT_FILE_NAME);
        assert_eq!(std::fs::read(&path).unwrap(), result.bytes());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_garbage_result_does_not_load() {
        let result = ResultFile::new(b"<html>502 Bad Gateway</html>".to_vec());
        assert!(matches!(result.load(), Err(LoadError::Parse { format: Format::Vtp, .. })));
    }
}
