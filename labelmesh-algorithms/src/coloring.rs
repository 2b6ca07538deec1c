//! Discrete label coloring
//!
//! Maps an integer class label per point onto a fixed [`ColorTable`]. Class
//! `i` always takes table entry `i`; there is no interpolation, so running the
//! mapping twice on the same input yields bit-identical colors.

use labelmesh_core::{ColorTable, Mesh};
use log::debug;
use thiserror::Error;

/// Reasons a recolor request is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("mesh has no point attribute named '{name}'")]
    MissingAttribute { name: String },

    #[error("attribute '{name}' has {components} components, label coloring needs a scalar array")]
    NotScalar { name: String, components: usize },

    #[error("label {value} at point {point} of '{name}' is outside the color table's {table_size} classes")]
    LabelOutOfRange {
        name: String,
        point: usize,
        value: f64,
        table_size: usize,
    },
}

/// One class in a coloring legend
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub class: usize,
    pub name: String,
    pub color: [u8; 3],
    pub point_count: usize,
}

/// Per-point colors derived from one label array and one color table
#[derive(Debug, Clone, PartialEq)]
pub struct LabelColoring {
    attribute: String,
    labels: Vec<usize>,
    colors: Vec<[u8; 3]>,
    table: ColorTable,
}

impl LabelColoring {
    /// Name of the attribute array the colors were derived from
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Class of every point
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Color of every point
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn table(&self) -> &ColorTable {
        &self.table
    }

    pub fn point_count(&self) -> usize {
        self.labels.len()
    }

    /// Number of points in each class, indexed by class
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.table.len()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Legend rows for the classes that occur at least once
    pub fn legend(&self) -> Vec<LegendEntry> {
        self.histogram()
            .into_iter()
            .enumerate()
            .filter(|(_, count)| *count > 0)
            .map(|(class, point_count)| LegendEntry {
                class,
                name: self
                    .table
                    .annotation(class)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Class {}", class)),
                color: self.colors_for_class(class),
                point_count,
            })
            .collect()
    }

    /// Move the derived colors out, e.g. to write them into a mesh
    pub fn into_colors(self) -> Vec<[u8; 3]> {
        self.colors
    }

    fn colors_for_class(&self, class: usize) -> [u8; 3] {
        self.table.color_u8(class).unwrap_or([0, 0, 0])
    }
}

/// Derive per-point colors from the label array `attribute` of `mesh`.
///
/// The mesh is not modified. Every value must be a non-negative integer
/// below `table.len()`; anything else is [`MappingError::LabelOutOfRange`].
pub fn label_coloring(
    mesh: &Mesh,
    attribute: &str,
    table: &ColorTable,
) -> Result<LabelColoring, MappingError> {
    let array = mesh
        .attribute(attribute)
        .ok_or_else(|| MappingError::MissingAttribute {
            name: attribute.to_string(),
        })?;

    if array.components() != 1 {
        return Err(MappingError::NotScalar {
            name: attribute.to_string(),
            components: array.components(),
        });
    }

    let table_size = table.len();
    let mut labels = Vec::with_capacity(array.tuple_count());
    let mut colors = Vec::with_capacity(array.tuple_count());

    for (point, &value) in array.values().iter().enumerate() {
        let class = class_index(value, table_size).ok_or_else(|| MappingError::LabelOutOfRange {
            name: attribute.to_string(),
            point,
            value,
            table_size,
        })?;
        labels.push(class);
        // class < table_size, so the lookup cannot miss
        colors.push(table.color_u8(class).unwrap_or([0, 0, 0]));
    }

    debug!(
        "Mapped {} labels of '{}' onto a {}-class table",
        labels.len(),
        attribute,
        table_size
    );

    Ok(LabelColoring {
        attribute: attribute.to_string(),
        labels,
        colors,
        table: table.clone(),
    })
}

/// Color `mesh` by its label array `attribute`, writing the colors back into
/// the mesh and selecting `attribute` as the active coloring channel.
///
/// On error the mesh keeps whatever coloring it had before.
pub fn apply_label_coloring(
    mesh: &mut Mesh,
    attribute: &str,
    table: &ColorTable,
) -> Result<LabelColoring, MappingError> {
    let coloring = label_coloring(mesh, attribute, table)?;
    mesh.colors = Some(coloring.colors.clone());
    mesh.active_scalars = Some(coloring.attribute.clone());
    Ok(coloring)
}

fn class_index(value: f64, table_size: usize) -> Option<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= table_size as f64 {
        return None;
    }
    Some(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelmesh_core::{AttributeArray, DataType, Point3f, LABEL_ATTRIBUTE};

    fn labeled_mesh(labels: &[u32]) -> Mesh {
        let vertices = (0..labels.len())
            .map(|i| Point3f::new(i as f32, 0.0, 0.0))
            .collect();
        let mut mesh = Mesh::point_cloud(vertices);
        mesh.insert_attribute(AttributeArray::labels(LABEL_ATTRIBUTE, labels))
            .unwrap();
        mesh
    }

    #[test]
    fn test_class_maps_to_table_entry() {
        let mesh = labeled_mesh(&[0, 1, 8, 1]);
        let coloring = label_coloring(&mesh, LABEL_ATTRIBUTE, &ColorTable::segmentation()).unwrap();

        assert_eq!(coloring.labels(), &[0, 1, 8, 1]);
        assert_eq!(
            coloring.colors(),
            &[[255, 255, 255], [0, 0, 255], [255, 0, 0], [0, 0, 255]]
        );
        // Pure: nothing written back
        assert!(mesh.colors.is_none());
        assert!(mesh.active_scalars.is_none());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut mesh = labeled_mesh(&[3, 2, 14, 0, 7]);
        let table = ColorTable::segmentation();

        apply_label_coloring(&mut mesh, LABEL_ATTRIBUTE, &table).unwrap();
        let first = mesh.clone();
        apply_label_coloring(&mut mesh, LABEL_ATTRIBUTE, &table).unwrap();

        assert_eq!(mesh, first);
        assert_eq!(mesh.active_scalars.as_deref(), Some(LABEL_ATTRIBUTE));
    }

    #[test]
    fn test_label_equal_to_table_size_is_rejected() {
        let mesh = labeled_mesh(&[0, 15, 2]);
        let result = label_coloring(&mesh, LABEL_ATTRIBUTE, &ColorTable::segmentation());

        match result {
            Err(MappingError::LabelOutOfRange { point, value, table_size, .. }) => {
                assert_eq!(point, 1);
                assert_eq!(value, 15.0);
                assert_eq!(table_size, 15);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_negative_and_fractional_labels_are_rejected() {
        let table = ColorTable::segmentation();
        for bad in [-1.0, 2.5, f64::NAN] {
            let mut mesh = Mesh::point_cloud(vec![Point3f::origin()]);
            mesh.insert_attribute(
                AttributeArray::new(LABEL_ATTRIBUTE, DataType::Float32, 1, vec![bad]).unwrap(),
            )
            .unwrap();
            assert!(matches!(
                label_coloring(&mesh, LABEL_ATTRIBUTE, &table),
                Err(MappingError::LabelOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_missing_and_vector_attributes() {
        let mut mesh = labeled_mesh(&[0, 1]);
        let table = ColorTable::segmentation();

        assert_eq!(
            label_coloring(&mesh, "Curvature", &table),
            Err(MappingError::MissingAttribute { name: "Curvature".to_string() })
        );

        mesh.insert_attribute(
            AttributeArray::new("Normals", DataType::Float32, 3, vec![0.0; 6]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            label_coloring(&mesh, "Normals", &table),
            Err(MappingError::NotScalar { components: 3, .. })
        ));
    }

    #[test]
    fn test_failed_apply_keeps_previous_coloring() {
        let mut mesh = labeled_mesh(&[1, 2]);
        let table = ColorTable::segmentation();
        apply_label_coloring(&mut mesh, LABEL_ATTRIBUTE, &table).unwrap();
        let before = mesh.clone();

        mesh.attributes.insert(AttributeArray::labels("Refined", &[1, 40]));
        assert!(apply_label_coloring(&mut mesh, "Refined", &table).is_err());

        assert_eq!(mesh.colors, before.colors);
        assert_eq!(mesh.active_scalars, before.active_scalars);
    }

    #[test]
    fn test_switching_attribute_rederives_colors() {
        let mut mesh = labeled_mesh(&[1, 1, 1]);
        mesh.insert_attribute(AttributeArray::labels("Refined", &[2, 0, 3]))
            .unwrap();
        let table = ColorTable::segmentation();

        apply_label_coloring(&mut mesh, LABEL_ATTRIBUTE, &table).unwrap();
        apply_label_coloring(&mut mesh, "Refined", &table).unwrap();

        assert_eq!(mesh.active_scalars.as_deref(), Some("Refined"));
        assert_eq!(
            mesh.colors.as_deref(),
            Some(&[[0, 255, 0], [255, 255, 255], [255, 255, 0]][..])
        );
    }

    #[test]
    fn test_legend_counts_present_classes() {
        let mesh = labeled_mesh(&[0, 4, 4, 9, 0, 4]);
        let coloring = label_coloring(&mesh, LABEL_ATTRIBUTE, &ColorTable::segmentation()).unwrap();

        let histogram = coloring.histogram();
        assert_eq!(histogram.len(), 15);
        assert_eq!(histogram[4], 3);

        let legend = coloring.legend();
        assert_eq!(legend.len(), 3);
        assert_eq!(legend[0].name, "Background");
        assert_eq!(legend[1].class, 4);
        assert_eq!(legend[1].point_count, 3);
        assert_eq!(legend[2].color, [128, 128, 128]);
    }
}
