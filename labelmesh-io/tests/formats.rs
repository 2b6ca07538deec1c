//! End-to-end loading of every supported format through the public API

use approx::assert_relative_eq;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use labelmesh_core::{Point3f, LABEL_ATTRIBUTE};
use labelmesh_io::{load, load_async, load_file, Format, LoadError};

fn triangle_buffer() -> Vec<u8> {
    let mut buffer = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in p {
            buffer.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        buffer.extend_from_slice(&i.to_le_bytes());
    }
    buffer.extend_from_slice(&[0, 0]);
    buffer
}

fn gltf_json(buffer_entry: &str) -> String {
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "mesh": 0, "translation": [1.0, 0.0, 0.0] }} ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }} ] }} ],
  "buffers": [ {} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        buffer_entry
    )
}

fn assert_translated_triangle(format: Format, bytes: &[u8]) {
    let mesh = load(bytes, format).unwrap();
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    // Node translation is baked into the positions
    assert_relative_eq!(mesh.vertices[0], Point3f::new(1.0, 0.0, 0.0));
    assert_relative_eq!(mesh.vertices[2], Point3f::new(1.0, 1.0, 0.0));
}

#[test]
fn test_gltf_with_embedded_buffer() {
    let buffer = triangle_buffer();
    let entry = format!(
        r#"{{ "byteLength": {}, "uri": "data:application/octet-stream;base64,{}" }}"#,
        buffer.len(),
        STANDARD.encode(&buffer)
    );
    assert_translated_triangle(Format::Gltf, gltf_json(&entry).as_bytes());
}

#[test]
fn test_glb_container() {
    let buffer = triangle_buffer();
    let mut json = gltf_json(&format!(r#"{{ "byteLength": {} }}"#, buffer.len())).into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + buffer.len();
    let mut glb = Vec::new();
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(buffer.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&buffer);

    assert_translated_triangle(Format::Glb, &glb);
}

#[test]
fn test_binary_stl() {
    let mut stl = vec![0u8; 80];
    stl.extend_from_slice(&2u32.to_le_bytes());
    let triangles = [
        [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
        [[0.0f32, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    ];
    for triangle in triangles {
        for c in [0.0f32, 0.0, 1.0] {
            stl.extend_from_slice(&c.to_le_bytes());
        }
        for vertex in triangle {
            for c in vertex {
                stl.extend_from_slice(&c.to_le_bytes());
            }
        }
        stl.extend_from_slice(&[0, 0]);
    }

    let mesh = load(&stl, Format::Stl).unwrap();
    // Shared corners are merged
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.face_count(), 2);
    assert!(mesh.double_sided);
}

fn binary_array(data: &[u8]) -> String {
    let mut payload = (data.len() as u32).to_le_bytes().to_vec();
    payload.extend_from_slice(data);
    STANDARD.encode(payload)
}

#[test]
fn test_binary_vtp_with_labels() {
    let points: Vec<u8> = [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let labels: Vec<u8> = [0i32, 4, 14].iter().flat_map(|v| v.to_le_bytes()).collect();
    let connectivity: Vec<u8> = [0i64, 1, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
    let offsets: Vec<u8> = 3i64.to_le_bytes().to_vec();

    let source = format!(
        r#"<?xml version="1.0"?>
<VTKFile type="PolyData" version="0.1" byte_order="LittleEndian">
  <PolyData>
    <Piece NumberOfPoints="3" NumberOfPolys="1">
      <PointData Scalars="Label">
        <DataArray type="Int32" Name="Label" format="binary">{}</DataArray>
      </PointData>
      <Points>
        <DataArray type="Float32" NumberOfComponents="3" format="binary">{}</DataArray>
      </Points>
      <Polys>
        <DataArray type="Int64" Name="connectivity" format="binary">{}</DataArray>
        <DataArray type="Int64" Name="offsets" format="binary">{}</DataArray>
      </Polys>
    </Piece>
  </PolyData>
</VTKFile>"#,
        binary_array(&labels),
        binary_array(&points),
        binary_array(&connectivity),
        binary_array(&offsets)
    );

    let mesh = load(source.as_bytes(), Format::Vtp).unwrap();
    assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    assert_eq!(mesh.active_scalars.as_deref(), Some(LABEL_ATTRIBUTE));
    assert_eq!(mesh.attribute(LABEL_ATTRIBUTE).unwrap().values(), &[0.0, 4.0, 14.0]);
    assert_relative_eq!(mesh.vertices[2], Point3f::new(0.0, 1.0, 0.0));
}

#[test]
fn test_malformed_input_produces_no_mesh() {
    for format in Format::ALL {
        let result = load(b"\x00\x01 definitely not a mesh", format);
        assert!(
            matches!(result, Err(LoadError::Parse { format: f, .. }) if f == format),
            "{} accepted garbage",
            format
        );
    }
}

#[test]
fn test_unsupported_extension_with_valid_content() {
    let path = std::env::temp_dir().join(format!("labelmesh-formats-{}.txt", std::process::id()));
    std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

    let result = load_file(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(LoadError::UnsupportedFormat { .. })));
}

#[tokio::test]
async fn test_async_obj_load() {
    let mesh = load_async(b"v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n".to_vec(), Format::Obj)
        .await
        .unwrap();
    assert_eq!(mesh.face_count(), 2);
}
