//! STL (Stereolithography) file format support.
//!
//! Supports both ASCII and binary STL formats. STL has no shared vertices,
//! so loaded meshes are welded (see [`weld_vertices`](crate::weld_vertices))
//! before being returned.
//!
//! # Format Detection
//!
//! - ASCII files start with "solid" (after optional whitespace) and have a
//!   text header
//! - Binary files have an 80-byte header followed by the face count
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ignored)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector (ignored on load)
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (usually 0)
//! end
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Point3, Vector3, Vertex};

use crate::error::{IoError, IoResult};
use crate::weld::weld_vertices;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Load a mesh from an STL file, welding coincident corners.
///
/// Automatically detects ASCII vs binary format.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file content is not valid STL
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("head.stl").unwrap();
/// println!("Loaded {} faces", mesh.faces.len());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let mut reader = BufReader::new(crate::open(path)?);

    let mut header = [0u8; HEADER_SIZE + 4];
    let bytes_read = read_up_to(&mut reader, &mut header)?;
    if bytes_read < 6 {
        return Err(IoError::invalid_content("file too small to be valid STL"));
    }

    let header_str = String::from_utf8_lossy(&header[..bytes_read.min(HEADER_SIZE)]);
    let mut mesh = if header_str.trim_start().starts_with("solid")
        && !is_binary_stl_header(&header[..bytes_read])
    {
        let reader = BufReader::new(crate::open(path)?);
        read_stl_ascii(reader)?
    } else {
        read_stl_binary(&header[..bytes_read], reader)?
    };

    weld_vertices(&mut mesh);
    Ok(mesh)
}

/// Fill `buf` as far as the reader allows; returns the byte count.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> IoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Some binary STLs start with "solid" too; their headers usually
/// contain NUL bytes, which ASCII files never do.
fn is_binary_stl_header(header: &[u8]) -> bool {
    header.len() >= HEADER_SIZE + 4 && header[..HEADER_SIZE].contains(&0)
}

/// Read a binary STL given the already-read header.
fn read_stl_binary<R: Read>(header: &[u8], mut reader: R) -> IoResult<IndexedMesh> {
    if header.len() < HEADER_SIZE + 4 {
        return Err(IoError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: header.len(),
        });
    }

    let face_count = u32::from_le_bytes([
        header[HEADER_SIZE],
        header[HEADER_SIZE + 1],
        header[HEADER_SIZE + 2],
        header[HEADER_SIZE + 3],
    ]);

    let mut mesh = IndexedMesh::with_capacity((face_count as usize) * 3, face_count as usize);
    let mut triangle_buf = [0u8; TRIANGLE_SIZE];
    for i in 0..face_count {
        if read_up_to(&mut reader, &mut triangle_buf)? < TRIANGLE_SIZE {
            return Err(IoError::InvalidFaceCount {
                expected: face_count,
                got: i,
            });
        }
        push_soup_triangle(
            &mut mesh,
            [
                read_point(&triangle_buf[12..24]),
                read_point(&triangle_buf[24..36]),
                read_point(&triangle_buf[36..48]),
            ],
        );
    }

    Ok(mesh)
}

fn read_point(buf: &[u8]) -> Point3<f64> {
    let coord = |i: usize| f64::from(f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]));
    Point3::new(coord(0), coord(4), coord(8))
}

#[allow(clippy::cast_possible_truncation)] // mesh indices are u32
fn push_soup_triangle(mesh: &mut IndexedMesh, corners: [Point3<f64>; 3]) {
    let base = mesh.vertices.len() as u32;
    mesh.vertices.extend(corners.into_iter().map(Vertex::new));
    mesh.faces.push([base, base + 1, base + 2]);
}

/// Read an ASCII STL.
fn read_stl_ascii<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);
    let mut in_loop = false;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" if in_loop => {
                let mut coord = || -> IoResult<f64> {
                    let token = parts.next().ok_or_else(|| {
                        IoError::invalid_content(format!(
                            "line {}: vertex needs three coordinates",
                            line_number + 1
                        ))
                    })?;
                    Ok(token.parse::<f64>()?)
                };
                let p = Point3::new(coord()?, coord()?, coord()?);
                corners.push(p);
            }
            "endloop" => in_loop = false,
            "endfacet" => match corners.as_slice() {
                &[a, b, c] => push_soup_triangle(&mut mesh, [a, b, c]),
                other => {
                    return Err(IoError::invalid_content(format!(
                        "line {}: facet has {} vertices, expected 3",
                        line_number + 1,
                        other.len()
                    )));
                }
            },
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(mesh)
}

/// Save a mesh to an STL file.
///
/// Facet normals are recomputed from the winding.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a face references a
/// missing vertex.
pub fn save_stl<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    crate::check_indices(mesh)?;
    let mut writer = BufWriter::new(File::create(path)?);

    if binary {
        write_stl_binary(mesh, &mut writer)?;
    } else {
        write_stl_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn facet_normal(corners: &[Point3<f64>; 3]) -> Vector3<f64> {
    let n = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
    let len = n.norm();
    if len > f64::EPSILON { n / len } else { Vector3::zeros() }
}

fn corners(mesh: &IndexedMesh, face: [u32; 3]) -> [Point3<f64>; 3] {
    face.map(|i| mesh.vertices[i as usize].position)
}

#[allow(clippy::cast_possible_truncation)] // STL stores f32 and a u32 face count
fn write_stl_binary<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL written by hrtf mesh-io";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;
    writer.write_all(&(mesh.faces.len() as u32).to_le_bytes())?;

    for &face in &mesh.faces {
        let corners = corners(mesh, face);
        let normal = facet_normal(&corners);
        for value in normal.iter().chain(corners.iter().flat_map(|p| p.coords.iter())) {
            writer.write_all(&(*value as f32).to_le_bytes())?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

fn write_stl_ascii<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "solid mesh")?;

    for &face in &mesh.faces {
        let corners = corners(mesh, face);
        let n = facet_normal(&corners);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for p in &corners {
            writeln!(writer, "      vertex {:.9e} {:.9e} {:.9e}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid mesh")?;
    Ok(())
}
