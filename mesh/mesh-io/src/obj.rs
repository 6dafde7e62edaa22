//! Wavefront OBJ support.
//!
//! Parsing goes through `tobj`. Only positions and faces are kept; polygons
//! are triangulated and every model in the file is merged into one mesh.
//! Face indices refer to positions, so corners that differ only in their
//! texture or normal reference still share a vertex.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Load a mesh from an OBJ file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a record cannot be parsed,
/// or a face references a missing vertex.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_obj;
///
/// let mesh = load_obj("head.obj").unwrap();
/// println!("{} faces", mesh.faces.len());
/// ```
pub fn load_obj<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let mut reader = BufReader::new(crate::open(path.as_ref())?);
    read_obj(&mut reader)
}

fn read_obj<R: BufRead>(reader: &mut R) -> IoResult<IndexedMesh> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    };
    // Materials are irrelevant for grading
    let (models, _materials) = tobj::load_obj_buf(reader, &options, |_| Ok(Default::default()))
        .map_err(|e| IoError::invalid_content(format!("OBJ: {e}")))?;

    let mut mesh = IndexedMesh::new();
    for model in &models {
        let offset = u32::try_from(mesh.vertices.len())
            .map_err(|_| IoError::invalid_content("OBJ has more than u32::MAX vertices"))?;
        let obj_mesh = &model.mesh;
        debug!(
            "OBJ model '{}': {} positions, {} triangles",
            model.name,
            obj_mesh.positions.len() / 3,
            obj_mesh.indices.len() / 3
        );

        for chunk in obj_mesh.positions.chunks_exact(3) {
            mesh.vertices
                .push(Vertex::from_coords(chunk[0], chunk[1], chunk[2]));
        }
        for tri in obj_mesh.indices.chunks_exact(3) {
            mesh.faces
                .push([tri[0] + offset, tri[1] + offset, tri[2] + offset]);
        }
    }

    crate::check_indices(&mesh)?;
    Ok(mesh)
}

/// Save a mesh to an OBJ file.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a face references a
/// missing vertex.
pub fn save_obj<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> IoResult<()> {
    crate::check_indices(mesh)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_obj(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn write_obj<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "# written by hrtf mesh-io")?;
    writeln!(
        writer,
        "# {} vertices, {} faces",
        mesh.vertices.len(),
        mesh.faces.len()
    )?;
    for v in &mesh.vertices {
        let p = v.position;
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}
