//! Mesh file I/O for the HRTF mesh grading tools.
//!
//! This crate loads and saves triangle meshes in the formats head and torso
//! scans usually come in:
//!
//! - **STL** (Stereolithography) - Binary and ASCII, welded on load
//! - **PLY** (Polygon File Format) - Binary and ASCII
//! - **OBJ** (Wavefront) - ASCII only
//!
//! Polygonal faces in PLY and OBJ input are fan-triangulated, so every
//! loaded mesh is a pure triangle mesh.
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_stl, save_stl};
//!
//! // Load a mesh
//! let mesh = load_stl("head.stl").unwrap();
//!
//! // Save it back
//! save_stl(&mesh, "output.stl", false).unwrap();
//! ```
//!
//! # Format Detection
//!
//! The format is detected from the file extension:
//!
//! ```no_run
//! use mesh_io::{load_mesh, save_mesh};
//!
//! let mesh = load_mesh("head.stl").unwrap();
//! save_mesh(&mesh, "head.ply").unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod obj;
mod ply;
mod stl;
mod weld;

pub use error::{IoError, IoResult};
pub use obj::{load_obj, save_obj};
pub use ply::{load_ply, save_ply};
pub use stl::{load_stl, save_stl};
pub use weld::weld_vertices;

use std::fs::File;
use std::path::Path;

use mesh_types::IndexedMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// STL (Stereolithography) format.
    /// Supports binary and ASCII variants.
    Stl,
    /// OBJ (Wavefront) format.
    /// ASCII only, supports vertices and faces.
    Obj,
    /// PLY (Polygon File Format).
    /// Supports binary and ASCII variants.
    Ply,
}

impl MeshFormat {
    /// Detect format from file extension (case-insensitive).
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            "ply" => Some(Self::Ply),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Ply => "ply",
        }
    }

    fn require<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        Self::from_path(path).ok_or_else(|| IoError::UnknownFormat {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("(none)")
                .to_string(),
        })
    }
}

/// Load a mesh from a file, detecting format from extension.
///
/// # Errors
///
/// Returns an error if:
/// - The file format cannot be determined from the extension
/// - The file cannot be read
/// - The file content is invalid for the detected format
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_mesh;
///
/// let mesh = load_mesh("head.ply").unwrap();
/// ```
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    match MeshFormat::require(path)? {
        MeshFormat::Stl => load_stl(path),
        MeshFormat::Obj => load_obj(path),
        MeshFormat::Ply => load_ply(path),
    }
}

/// Save a mesh to a file, detecting format from extension.
///
/// Binary encodings are used where the format has one.
///
/// # Errors
///
/// Returns an error if the format cannot be determined from the extension
/// or the file cannot be written.
pub fn save_mesh<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> IoResult<()> {
    save_mesh_with(mesh, path, true)
}

/// Save a mesh, choosing between binary and ASCII encodings.
///
/// `binary` is ignored for OBJ, which is always ASCII.
///
/// # Errors
///
/// Returns an error if the format cannot be determined from the extension
/// or the file cannot be written.
pub fn save_mesh_with<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    let path = path.as_ref();
    match MeshFormat::require(path)? {
        MeshFormat::Stl => save_stl(mesh, path, binary),
        MeshFormat::Obj => save_obj(mesh, path),
        MeshFormat::Ply => save_ply(mesh, path, binary),
    }
}

/// Open a file for reading, mapping a missing file to `FileNotFound`.
pub(crate) fn open(path: &Path) -> IoResult<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })
}

/// Check every face index against the vertex count.
pub(crate) fn check_indices(mesh: &IndexedMesh) -> IoResult<()> {
    let vertex_count = mesh.vertices.len();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(IoError::IndexOutOfRange {
                face,
                index: i64::from(bad),
                vertex_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path() {
        assert_eq!(MeshFormat::from_path("head.stl"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("head.STL"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("/scans/head.ply"), Some(MeshFormat::Ply));
        assert_eq!(MeshFormat::from_path("head.Obj"), Some(MeshFormat::Obj));
    }

    #[test]
    fn format_from_path_unknown() {
        assert_eq!(MeshFormat::from_path("head.3mf"), None);
        assert_eq!(MeshFormat::from_path("head"), None);
        assert_eq!(MeshFormat::from_path(""), None);
    }

    #[test]
    fn format_extension() {
        assert_eq!(MeshFormat::Stl.extension(), "stl");
        assert_eq!(MeshFormat::Obj.extension(), "obj");
        assert_eq!(MeshFormat::Ply.extension(), "ply");
    }

    #[test]
    fn load_unknown_extension() {
        let err = load_mesh("head.xyz").unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { ref extension } if extension == "xyz"));
        let err = save_mesh(&IndexedMesh::new(), "head").unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { ref extension } if extension == "(none)"));
    }

    #[test]
    fn check_indices_reports_face() {
        let mut mesh = mesh_types::primitives::disc(1.0, 1, 4);
        assert!(check_indices(&mesh).is_ok());
        mesh.faces.push([0, 1, 99]);
        let err = check_indices(&mesh).unwrap_err();
        assert!(matches!(err, IoError::IndexOutOfRange { face: 4, index: 99, .. }));
    }
}
