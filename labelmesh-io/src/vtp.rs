//! VTK XML PolyData (`.vtp`) support
//!
//! Only inline data is understood: `format="ascii"` and uncompressed
//! `format="binary"` (base64). Files that use a `compressor` or raw
//! `AppendedData` are rejected.

use crate::{Format, LoadError, MeshReader};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use labelmesh_core::{AttributeArray, DataType, Mesh, Point3f};
use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub struct VtpReader;

impl MeshReader for VtpReader {
    fn read_mesh(bytes: &[u8]) -> Result<Mesh, LoadError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LoadError::parse(Format::Vtp, format!("not UTF-8 XML: {}", e)))?;
        let piece = parse_document(text).map_err(|message| LoadError::parse(Format::Vtp, message))?;
        piece.into_mesh().map_err(|message| LoadError::parse(Format::Vtp, message))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderType {
    UInt32,
    UInt64,
}

impl HeaderType {
    fn size(self) -> usize {
        match self {
            HeaderType::UInt32 => 4,
            HeaderType::UInt64 => 8,
        }
    }
}

/// Document-level settings from the `VTKFile` element
#[derive(Debug, Clone, Copy)]
struct Encoding {
    byte_order: ByteOrder,
    header_type: HeaderType,
}

/// Element of a `Piece` that owns `DataArray` children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    PointData,
    CellData,
    Points,
    Verts,
    Lines,
    Strips,
    Polys,
}

impl Section {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"PointData" => Some(Section::PointData),
            b"CellData" => Some(Section::CellData),
            b"Points" => Some(Section::Points),
            b"Verts" => Some(Section::Verts),
            b"Lines" => Some(Section::Lines),
            b"Strips" => Some(Section::Strips),
            b"Polys" => Some(Section::Polys),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct DataArray {
    name: Option<String>,
    data_type: DataType,
    components: usize,
    binary: bool,
    values: Vec<f64>,
}

/// Cell arrays of one topology section
#[derive(Debug, Default)]
struct CellArrays {
    connectivity: Vec<f64>,
    offsets: Vec<f64>,
}

#[derive(Debug, Default)]
struct Piece {
    declared_points: Option<usize>,
    declared_polys: Option<usize>,
    declared_strips: Option<usize>,
    points: Option<DataArray>,
    point_data: Vec<DataArray>,
    active_scalars: Option<String>,
    polys: CellArrays,
    strips: CellArrays,
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn count_attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<usize>, String> {
    attribute(element, key)?
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("{} is not a count: {:?}", key, value))
        })
        .transpose()
}

fn read_encoding(element: &BytesStart<'_>) -> Result<Encoding, String> {
    match attribute(element, "type")?.as_deref() {
        Some("PolyData") => {}
        Some(other) => return Err(format!("expected PolyData, found {} dataset", other)),
        None => return Err("VTKFile element has no type".to_string()),
    }
    if let Some(compressor) = attribute(element, "compressor")? {
        return Err(format!("compressed data ({}) is not supported", compressor));
    }
    let byte_order = match attribute(element, "byte_order")?.as_deref() {
        None | Some("LittleEndian") => ByteOrder::Little,
        Some("BigEndian") => ByteOrder::Big,
        Some(other) => return Err(format!("unknown byte order {:?}", other)),
    };
    let header_type = match attribute(element, "header_type")?.as_deref() {
        None | Some("UInt32") => HeaderType::UInt32,
        Some("UInt64") => HeaderType::UInt64,
        Some(other) => return Err(format!("unknown header type {:?}", other)),
    };
    Ok(Encoding {
        byte_order,
        header_type,
    })
}

fn start_data_array(element: &BytesStart<'_>) -> Result<DataArray, String> {
    let type_name = attribute(element, "type")?.ok_or("DataArray without a type")?;
    let data_type =
        DataType::from_name(&type_name).ok_or_else(|| format!("unknown DataArray type {:?}", type_name))?;
    let binary = match attribute(element, "format")?.as_deref() {
        None | Some("ascii") => false,
        Some("binary") => true,
        Some("appended") => return Err("appended data is not supported".to_string()),
        Some(other) => return Err(format!("unknown DataArray format {:?}", other)),
    };
    let components = count_attribute(element, "NumberOfComponents")?.unwrap_or(1);
    if components == 0 {
        return Err("DataArray with zero components".to_string());
    }
    Ok(DataArray {
        name: attribute(element, "Name")?,
        data_type,
        components,
        binary,
        values: Vec::new(),
    })
}

fn parse_document(text: &str) -> Result<Piece, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut encoding: Option<Encoding> = None;
    let mut piece: Option<Piece> = None;
    let mut pieces = 0usize;
    let mut in_first_piece = false;
    let mut section: Option<Section> = None;
    let mut array: Option<DataArray> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let empty = matches!(event, Event::Empty(_));
                match element.name().as_ref() {
                    b"VTKFile" => encoding = Some(read_encoding(element)?),
                    b"AppendedData" => return Err("appended data is not supported".to_string()),
                    b"Piece" => {
                        pieces += 1;
                        if pieces == 1 {
                            piece = Some(Piece {
                                declared_points: count_attribute(element, "NumberOfPoints")?,
                                declared_polys: count_attribute(element, "NumberOfPolys")?,
                                declared_strips: count_attribute(element, "NumberOfStrips")?,
                                ..Piece::default()
                            });
                            in_first_piece = !empty;
                        }
                    }
                    b"DataArray" if in_first_piece => {
                        let parsed = start_data_array(element)?;
                        if empty {
                            store_array(piece.as_mut(), section, parsed)?;
                        } else {
                            array = Some(parsed);
                        }
                    }
                    tag if in_first_piece => {
                        if let Some(found) = Section::from_tag(tag) {
                            if found == Section::PointData {
                                if let Some(p) = piece.as_mut() {
                                    p.active_scalars = attribute(element, "Scalars")?;
                                }
                            }
                            if !empty {
                                section = Some(found);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref content) => {
                if let Some(current) = array.as_mut() {
                    let content = content.unescape().map_err(|e| e.to_string())?;
                    let encoding = encoding.ok_or("DataArray outside of a VTKFile")?;
                    let values = decode_values(current, &content, encoding)?;
                    current.values.extend(values);
                }
            }
            Event::End(ref element) => match element.name().as_ref() {
                b"DataArray" => {
                    if let Some(finished) = array.take() {
                        store_array(piece.as_mut(), section, finished)?;
                    }
                }
                b"Piece" => {
                    in_first_piece = false;
                    section = None;
                }
                tag => {
                    if Section::from_tag(tag).is_some() {
                        section = None;
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if encoding.is_none() {
        return Err("missing VTKFile root element".to_string());
    }
    if pieces > 1 {
        warn!("VTP file has {} pieces, only the first is loaded", pieces);
    }
    piece.ok_or_else(|| "PolyData has no Piece".to_string())
}

fn store_array(piece: Option<&mut Piece>, section: Option<Section>, array: DataArray) -> Result<(), String> {
    let piece = piece.ok_or("DataArray outside of a Piece")?;
    match section {
        Some(Section::Points) => piece.points = Some(array),
        Some(Section::PointData) => piece.point_data.push(array),
        Some(Section::Polys) => assign_cell_array(&mut piece.polys, array)?,
        Some(Section::Strips) => assign_cell_array(&mut piece.strips, array)?,
        Some(Section::Verts) | Some(Section::Lines) | Some(Section::CellData) | None => {}
    }
    Ok(())
}

fn assign_cell_array(cells: &mut CellArrays, array: DataArray) -> Result<(), String> {
    match array.name.as_deref() {
        Some("connectivity") => cells.connectivity = array.values,
        Some("offsets") => cells.offsets = array.values,
        other => debug!("Ignoring cell array {:?}", other),
    }
    Ok(())
}

fn decode_values(array: &DataArray, text: &str, encoding: Encoding) -> Result<Vec<f64>, String> {
    if !array.binary {
        return text
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number {:?} in DataArray {:?}", token, array.name))
            })
            .collect();
    }

    let payload = decode_binary(text, encoding)?;
    let size = array.data_type.size_in_bytes();
    if payload.len() % size != 0 {
        return Err(format!(
            "binary DataArray {:?} holds {} bytes, not a multiple of {}",
            array.name,
            payload.len(),
            size
        ));
    }
    Ok(payload
        .chunks_exact(size)
        .map(|chunk| decode_element(chunk, array.data_type, encoding.byte_order))
        .collect())
}

/// Base64 payload of an inline binary array, with the byte-count header removed
fn decode_binary(text: &str, encoding: Encoding) -> Result<Vec<u8>, String> {
    let compact: String = text.split_whitespace().collect();
    let header = encoding.header_type;

    // Header and data are either one base64 stream or two concatenated ones
    if let Ok(bytes) = STANDARD.decode(&compact) {
        if let Some(payload) = strip_header(&bytes, encoding) {
            return Ok(payload);
        }
    }

    let header_chars = header.size().div_ceil(3) * 4;
    if compact.len() < header_chars {
        return Err("binary DataArray is shorter than its header".to_string());
    }
    let (head, body) = compact.split_at(header_chars);
    let mut bytes = STANDARD.decode(head).map_err(|e| format!("invalid base64 header: {}", e))?;
    bytes.truncate(header.size());
    bytes.extend(STANDARD.decode(body).map_err(|e| format!("invalid base64 data: {}", e))?);
    strip_header(&bytes, encoding).ok_or_else(|| "binary DataArray is truncated".to_string())
}

fn strip_header(bytes: &[u8], encoding: Encoding) -> Option<Vec<u8>> {
    let size = encoding.header_type.size();
    let head = bytes.get(..size)?;
    // The byte count is written in the file's byte order
    let declared = match (encoding.header_type, encoding.byte_order) {
        (HeaderType::UInt32, ByteOrder::Little) => u32::from_le_bytes(head.try_into().ok()?) as usize,
        (HeaderType::UInt32, ByteOrder::Big) => u32::from_be_bytes(head.try_into().ok()?) as usize,
        (HeaderType::UInt64, ByteOrder::Little) => usize::try_from(u64::from_le_bytes(head.try_into().ok()?)).ok()?,
        (HeaderType::UInt64, ByteOrder::Big) => usize::try_from(u64::from_be_bytes(head.try_into().ok()?)).ok()?,
    };
    bytes.get(size..size.checked_add(declared)?).map(<[u8]>::to_vec)
}

fn decode_element(chunk: &[u8], data_type: DataType, order: ByteOrder) -> f64 {
    macro_rules! read {
        ($ty:ty) => {{
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(chunk);
            match order {
                ByteOrder::Little => <$ty>::from_le_bytes(raw) as f64,
                ByteOrder::Big => <$ty>::from_be_bytes(raw) as f64,
            }
        }};
    }
    match data_type {
        DataType::Int8 => read!(i8),
        DataType::UInt8 => read!(u8),
        DataType::Int16 => read!(i16),
        DataType::UInt16 => read!(u16),
        DataType::Int32 => read!(i32),
        DataType::UInt32 => read!(u32),
        DataType::Int64 => read!(i64),
        DataType::UInt64 => read!(u64),
        DataType::Float32 => read!(f32),
        DataType::Float64 => read!(f64),
    }
}

fn to_index(value: f64, what: &str) -> Result<usize, String> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(format!("invalid {} value {}", what, value))
    }
}

/// Split connectivity into cells using end offsets
fn cells(arrays: &CellArrays, section: &str) -> Result<Vec<Vec<usize>>, String> {
    let connectivity = arrays
        .connectivity
        .iter()
        .map(|&v| to_index(v, "connectivity"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut result = Vec::with_capacity(arrays.offsets.len());
    let mut start = 0usize;
    for &offset in &arrays.offsets {
        let end = to_index(offset, "offset")?;
        if end < start || end > connectivity.len() {
            return Err(format!(
                "{} offset {} out of range for {} connectivity entries",
                section,
                end,
                connectivity.len()
            ));
        }
        result.push(connectivity[start..end].to_vec());
        start = end;
    }
    Ok(result)
}

impl Piece {
    fn into_mesh(self) -> Result<Mesh, String> {
        let points = self.points.ok_or("Piece has no Points array")?;
        if points.components != 3 {
            return Err(format!("Points must have 3 components, found {}", points.components));
        }
        if points.values.len() % 3 != 0 {
            return Err("Points array is not a whole number of tuples".to_string());
        }
        let vertices: Vec<Point3f> = points
            .values
            .chunks_exact(3)
            .map(|p| Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32))
            .collect();
        if let Some(declared) = self.declared_points {
            if declared != vertices.len() {
                return Err(format!(
                    "Piece declares {} points but holds {}",
                    declared,
                    vertices.len()
                ));
            }
        }

        let mut mesh = Mesh::point_cloud(vertices);

        let polys = cells(&self.polys, "Polys")?;
        if let Some(declared) = self.declared_polys {
            if declared != polys.len() {
                return Err(format!("Piece declares {} polys but holds {}", declared, polys.len()));
            }
        }
        for polygon in &polys {
            mesh.add_polygon(polygon);
        }

        let strips = cells(&self.strips, "Strips")?;
        if let Some(declared) = self.declared_strips {
            if declared != strips.len() {
                return Err(format!("Piece declares {} strips but holds {}", declared, strips.len()));
            }
        }
        for strip in &strips {
            for (i, t) in strip.windows(3).enumerate() {
                if i % 2 == 0 {
                    mesh.add_face([t[0], t[1], t[2]]);
                } else {
                    mesh.add_face([t[1], t[0], t[2]]);
                }
            }
        }

        for array in self.point_data {
            let Some(name) = array.name else {
                warn!("Skipping unnamed PointData array");
                continue;
            };
            let attribute = AttributeArray::new(name, array.data_type, array.components, array.values)
                .map_err(|e| e.to_string())?;
            mesh.insert_attribute(attribute).map_err(|e| e.to_string())?;
        }

        if let Some(active) = self.active_scalars {
            if mesh.attribute(&active).is_some() {
                mesh.active_scalars = Some(active);
            } else {
                warn!("PointData names missing scalars array {:?}", active);
            }
        }

        debug!(
            "VTP parsed: {} points, {} polys, {} strips -> {} faces, {} point arrays",
            mesh.vertex_count(),
            polys.len(),
            strips.len(),
            mesh.face_count(),
            mesh.attributes.len()
        );

        Ok(mesh)
    }
}
