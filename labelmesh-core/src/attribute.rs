//! Named per-point attribute arrays

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-point class label array produced by the prediction service
pub const LABEL_ATTRIBUTE: &str = "Label";

/// Element type an attribute array was stored with in its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl DataType {
    /// Parse a type name such as `Int32` or `Float64`.
    ///
    /// The legacy VTK spellings (`Char`, `UnsignedInt`, `Double`, ...) are
    /// accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Int8" | "Char" => Some(DataType::Int8),
            "UInt8" | "UnsignedChar" => Some(DataType::UInt8),
            "Int16" | "Short" => Some(DataType::Int16),
            "UInt16" | "UnsignedShort" => Some(DataType::UInt16),
            "Int32" | "Int" => Some(DataType::Int32),
            "UInt32" | "UnsignedInt" => Some(DataType::UInt32),
            "Int64" | "Long" | "LongLong" | "IdType" => Some(DataType::Int64),
            "UInt64" | "UnsignedLong" | "UnsignedLongLong" => Some(DataType::UInt64),
            "Float32" | "Float" => Some(DataType::Float32),
            "Float64" | "Double" => Some(DataType::Float64),
            _ => None,
        }
    }

    /// Size of one element in bytes
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }

    /// Whether the type stores integers
    pub fn is_integer(self) -> bool {
        !matches!(self, DataType::Float32 | DataType::Float64)
    }
}

/// A named array holding one tuple of `components` values per mesh point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeArray {
    name: String,
    data_type: DataType,
    components: usize,
    values: Vec<f64>,
}

impl AttributeArray {
    /// Create an attribute array from flat tuple data
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        components: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidData("attribute arrays must be named".to_string()));
        }
        if components == 0 {
            return Err(Error::InvalidData(format!(
                "attribute '{}' must have at least one component",
                name
            )));
        }
        if values.len() % components != 0 {
            return Err(Error::InvalidData(format!(
                "attribute '{}' has {} values, not a multiple of {} components",
                name,
                values.len(),
                components
            )));
        }
        Ok(Self {
            name,
            data_type,
            components,
            values,
        })
    }

    /// Create a single-component integer label array
    pub fn labels(name: impl Into<String>, labels: &[u32]) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::UInt32,
            components: 1,
            values: labels.iter().map(|&l| l as f64).collect(),
        }
    }

    /// Create a single-component floating point array
    pub fn scalars(name: impl Into<String>, values: &[f32]) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Float32,
            components: 1,
            values: values.iter().map(|&v| v as f64).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Flat values, `components` consecutive entries per point
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of tuples, which must equal the owning mesh's point count
    pub fn tuple_count(&self) -> usize {
        self.values.len() / self.components
    }

    /// Values of the tuple belonging to point `index`
    pub fn tuple(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.components)?;
        self.values.get(start..start + self.components)
    }

    /// Minimum and maximum over all values
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }
}

/// The attribute arrays of one mesh, with names unique within the set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointAttributes {
    arrays: Vec<AttributeArray>,
}

impl PointAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an array by name
    pub fn get(&self, name: &str) -> Option<&AttributeArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert an array, returning the array it replaced if the name was taken
    pub fn insert(&mut self, array: AttributeArray) -> Option<AttributeArray> {
        match self.arrays.iter_mut().find(|a| a.name == array.name) {
            Some(slot) => Some(std::mem::replace(slot, array)),
            None => {
                self.arrays.push(array);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeArray> {
        let index = self.arrays.iter().position(|a| a.name == name)?;
        Some(self.arrays.remove(index))
    }

    /// Array names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeArray> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_tuples() {
        let array = AttributeArray::new(
            "Normals",
            DataType::Float32,
            3,
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        )
        .unwrap();

        assert_eq!(array.tuple_count(), 2);
        assert_eq!(array.tuple(1), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(array.tuple(2), None);
    }

    #[test]
    fn test_attribute_rejects_ragged_values() {
        let result = AttributeArray::new("Normals", DataType::Float32, 3, vec![0.0, 1.0]);
        assert!(matches!(result, Err(Error::InvalidData(_))));

        let result = AttributeArray::new("", DataType::Float32, 1, vec![0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_label_range() {
        let labels = AttributeArray::labels(LABEL_ATTRIBUTE, &[3, 0, 7, 2]);
        assert_eq!(labels.data_type(), DataType::UInt32);
        assert_eq!(labels.range(), Some((0.0, 7.0)));

        let empty = AttributeArray::labels(LABEL_ATTRIBUTE, &[]);
        assert_eq!(empty.range(), None);
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut attributes = PointAttributes::new();
        assert!(attributes.insert(AttributeArray::labels("Label", &[1, 2])).is_none());
        assert!(attributes.insert(AttributeArray::scalars("Curvature", &[0.5, 0.25])).is_none());

        let previous = attributes.insert(AttributeArray::labels("Label", &[4, 5]));
        assert_eq!(previous.unwrap().values(), &[1.0, 2.0]);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes.names().collect::<Vec<_>>(), vec!["Label", "Curvature"]);
        assert_eq!(attributes.get("Label").unwrap().values(), &[4.0, 5.0]);

        assert!(attributes.remove("Curvature").is_some());
        assert!(!attributes.contains("Curvature"));
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::from_name("Int32"), Some(DataType::Int32));
        assert_eq!(DataType::from_name("Double"), Some(DataType::Float64));
        assert_eq!(DataType::from_name("Quaternion"), None);
        assert_eq!(DataType::UInt16.size_in_bytes(), 2);
        assert!(DataType::Int64.is_integer());
        assert!(!DataType::Float32.is_integer());
    }
}
