//! PLY (Polygon File Format) support.
//!
//! Scanner software commonly exports head and torso scans as PLY.
//!
//! # Supported Properties
//!
//! - Vertex positions (`x`, `y`, `z`, float or double) - required
//! - Face vertex indices (`vertex_indices` or `vertex_index`) - polygons are
//!   fan-triangulated
//!
//! Other elements and properties (colors, normals, texture coordinates) are
//! skipped.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_ply, save_ply};
//!
//! let mesh = load_ply("head.ply").unwrap();
//! save_ply(&mesh, "graded.ply", true).unwrap(); // Binary
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;

use crate::error::{IoError, IoResult};

/// Load a mesh from a PLY file.
///
/// Supports ASCII, binary little-endian, and binary big-endian encodings.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file is not valid PLY
/// - A vertex lacks one of `x`, `y`, `z`
/// - A face references a missing vertex
pub fn load_ply<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let mut reader = BufReader::new(crate::open(path.as_ref())?);
    let parser = Parser::<DefaultElement>::new();

    let header = parser
        .read_header(&mut reader)
        .map_err(|e| IoError::invalid_content(format!("failed to parse PLY header: {e}")))?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| IoError::invalid_content(format!("failed to read PLY payload: {e}")))?;

    let mut mesh = IndexedMesh::new();

    if let Some(vertex_elements) = payload.get("vertex") {
        mesh.vertices.reserve(vertex_elements.len());
        for (i, element) in vertex_elements.iter().enumerate() {
            let coord = |key: &str| {
                scalar_property(element, key).ok_or_else(|| {
                    IoError::invalid_content(format!("vertex {i} has no numeric '{key}' property"))
                })
            };
            mesh.vertices
                .push(Vertex::from_coords(coord("x")?, coord("y")?, coord("z")?));
        }
    }

    if let Some(face_elements) = payload.get("face") {
        mesh.faces.reserve(face_elements.len());
        for (face, element) in face_elements.iter().enumerate() {
            let indices = index_list(element);
            if let Some(&bad) = indices
                .iter()
                .find(|&&i| i < 0 || i >= mesh.vertices.len() as i64)
            {
                return Err(IoError::IndexOutOfRange {
                    face,
                    index: bad,
                    vertex_count: mesh.vertices.len(),
                });
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above
            let indices: Vec<u32> = indices.into_iter().map(|i| i as u32).collect();
            for pair in indices.windows(2).skip(1) {
                mesh.faces.push([indices[0], pair[0], pair[1]]);
            }
        }
    }

    Ok(mesh)
}

fn scalar_property(element: &DefaultElement, key: &str) -> Option<f64> {
    match element.get(key)? {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(f64::from(*v)),
        Property::Short(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn index_list(element: &DefaultElement) -> Vec<i64> {
    for key in ["vertex_indices", "vertex_index"] {
        let Some(prop) = element.get(key) else {
            continue;
        };
        return match prop {
            Property::ListInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
            Property::ListUInt(v) => v.iter().map(|&i| i64::from(i)).collect(),
            Property::ListShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
            Property::ListUShort(v) => v.iter().map(|&i| i64::from(i)).collect(),
            Property::ListChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
            Property::ListUChar(v) => v.iter().map(|&i| i64::from(i)).collect(),
            _ => continue,
        };
    }
    Vec::new()
}

/// Save a mesh to a PLY file with double-precision coordinates.
///
/// `binary` selects little-endian binary output; otherwise ASCII.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a face references a
/// missing vertex.
pub fn save_ply<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    crate::check_indices(mesh)?;
    let mut writer = BufWriter::new(File::create(path)?);

    if binary {
        write_ply_binary(mesh, &mut writer)?;
    } else {
        write_ply_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Binary little-endian PLY, written by hand: ply-rs writes the element
/// count instead of the list length for binary list properties.
fn write_ply_binary<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "comment written by hrtf mesh-io")?;
    writeln!(writer, "element vertex {}", mesh.vertices.len())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    writeln!(writer, "element face {}", mesh.faces.len())?;
    writeln!(writer, "property list uchar uint vertex_indices")?;
    writeln!(writer, "end_header")?;

    for v in &mesh.vertices {
        for value in v.position.coords.iter() {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    for face in &mesh.faces {
        writer.write_all(&[3u8])?;
        for index in face {
            writer.write_all(&index.to_le_bytes())?;
        }
    }

    Ok(())
}

fn write_ply_ascii<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    ply.header
        .comments
        .push("written by hrtf mesh-io".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    face_def.count = mesh.faces.len();
    ply.header.elements.add(face_def);

    let vertex_elements = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(v.position.x));
            element.insert("y".to_string(), Property::Double(v.position.y));
            element.insert("z".to_string(), Property::Double(v.position.z));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertex_elements);

    let face_elements = mesh
        .faces
        .iter()
        .map(|face| {
            let mut element = DefaultElement::new();
            element.insert("vertex_indices".to_string(), Property::ListUInt(face.to_vec()));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), face_elements);

    Writer::new()
        .write_ply(writer, &mut ply)
        .map_err(|e| IoError::invalid_content(format!("failed to write PLY: {e}")))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{MeshTopology, primitives};

    #[test]
    fn roundtrip_binary_is_exact() {
        let original = primitives::icosphere(87.5, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sphere.ply");
        save_ply(&original, &path, true).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn roundtrip_ascii() {
        let original = primitives::tube(3.0, 10.0, 2, 6);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tube.ply");
        save_ply(&original, &path, false).unwrap();

        let loaded = load_ply(&path).unwrap();
        assert_eq!(loaded.face_count(), original.face_count());
        assert_eq!(loaded.faces, original.faces);
        for (a, b) in original.vertices.iter().zip(&loaded.vertices) {
            assert_relative_eq!(a.position, b.position, epsilon = 1e-9);
        }
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\n\
             property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n",
        )
        .unwrap();

        let mesh = load_ply(&path).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
             property float z\nelement face 1\nproperty list uchar int vertex_indices\n\
             end_header\n0 0 0\n1 0 0\n1 1 0\n3 0 1 5\n",
        )
        .unwrap();

        let err = load_ply(&path).unwrap_err();
        assert!(matches!(err, IoError::IndexOutOfRange { face: 0, index: 5, .. }));
    }

    #[test]
    fn load_nonexistent_file() {
        let result = load_ply("nonexistent_file_12345.ply");
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }
}
