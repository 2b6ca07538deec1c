//! Discrete color tables mapping class indices to colors

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered mapping from class index `0..len()` to an RGB color in `[0, 1]`.
///
/// Class 0 is the background/unlabeled class. Optional annotations name each
/// class for legends; they have no effect on rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTable {
    colors: Vec<[f32; 3]>,
    annotations: Vec<String>,
}

/// Palette of the segmentation model's 15 classes
const SEGMENTATION_PALETTE: [[f32; 3]; 15] = [
    [1.0, 1.0, 1.0], // background
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 1.0],
    [0.5, 0.0, 0.5],
    [0.0, 0.5, 0.5],
    [0.5, 0.5, 0.0],
    [1.0, 0.0, 0.0],
    [0.5, 0.5, 0.5],
    [0.0, 1.0, 1.0],
    [0.5, 0.0, 0.0],
    [0.5, 1.0, 0.0],
    [0.5, 0.5, 1.0],
    [0.5, 0.0, 1.0],
];

impl ColorTable {
    /// Create a table from one color per class
    pub fn new(colors: Vec<[f32; 3]>) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::InvalidData("color table needs at least one class".to_string()));
        }
        if let Some(index) = colors
            .iter()
            .position(|c| c.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0))
        {
            return Err(Error::InvalidData(format!(
                "color table entry {} has a component outside [0, 1]",
                index
            )));
        }
        Ok(Self {
            colors,
            annotations: Vec::new(),
        })
    }

    /// Attach one human-readable name per class
    pub fn with_annotations(mut self, annotations: Vec<String>) -> Result<Self> {
        if annotations.len() != self.colors.len() {
            return Err(Error::InvalidData(format!(
                "{} annotations given for {} classes",
                annotations.len(),
                self.colors.len()
            )));
        }
        self.annotations = annotations;
        Ok(self)
    }

    /// The 15-class palette used for segmentation results, class 0 white
    pub fn segmentation() -> Self {
        let annotations = std::iter::once("Background".to_string())
            .chain((1..SEGMENTATION_PALETTE.len()).map(|i| format!("Class {}", i)))
            .collect();
        Self {
            colors: SEGMENTATION_PALETTE.to_vec(),
            annotations,
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false: tables hold at least one class
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, class: usize) -> Option<[f32; 3]> {
        self.colors.get(class).copied()
    }

    /// Color of a class quantized to 8 bits per channel
    pub fn color_u8(&self, class: usize) -> Option<[u8; 3]> {
        self.color(class).map(|c| c.map(|v| (v * 255.0).round() as u8))
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn annotation(&self, class: usize) -> Option<&str> {
        self.annotations.get(class).map(String::as_str)
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::segmentation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_palette() {
        let table = ColorTable::segmentation();
        assert_eq!(table.len(), 15);
        assert_eq!(table.color(0), Some([1.0, 1.0, 1.0]));
        assert_eq!(table.color_u8(1), Some([0, 0, 255]));
        assert_eq!(table.color_u8(5), Some([128, 0, 128]));
        assert_eq!(table.color(15), None);
        assert_eq!(table.annotation(0), Some("Background"));
        assert_eq!(table.annotation(14), Some("Class 14"));
    }

    #[test]
    fn test_table_validation() {
        assert!(ColorTable::new(Vec::new()).is_err());
        assert!(ColorTable::new(vec![[1.5, 0.0, 0.0]]).is_err());
        assert!(ColorTable::new(vec![[f32::NAN, 0.0, 0.0]]).is_err());

        let table = ColorTable::new(vec![[1.0, 1.0, 1.0], [1.0, 0.0, 0.0]]).unwrap();
        assert!(table.annotations().is_empty());
        assert!(table.clone().with_annotations(vec!["only one".to_string()]).is_err());

        let table = table
            .with_annotations(vec!["Gum".to_string(), "Tooth".to_string()])
            .unwrap();
        assert_eq!(table.annotation(1), Some("Tooth"));
    }
}
