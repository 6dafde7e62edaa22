//! Merging of coincident vertices.
//!
//! STL stores every triangle with its own three corners, so a loaded STL is
//! a triangle soup. Welding restores shared vertices so that connectivity
//! (and therefore manifoldness) can be recovered downstream.

use hashbrown::HashMap;
use mesh_types::IndexedMesh;
use tracing::debug;

/// Merge vertices with bit-identical coordinates and drop faces that become
/// degenerate (two corners on the same vertex).
///
/// `-0.0` and `0.0` are treated as the same coordinate. Vertex order follows
/// first occurrence, so welding an already welded mesh is a no-op.
///
/// Returns the number of vertices removed.
///
/// # Example
///
/// ```
/// use mesh_io::weld_vertices;
/// use mesh_types::{IndexedMesh, Point3};
///
/// let mut mesh = IndexedMesh::from_positions(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2], [3, 4, 5]],
/// );
/// assert_eq!(weld_vertices(&mut mesh), 2);
/// assert_eq!(mesh.vertices.len(), 4);
/// assert_eq!(mesh.faces[1], [1, 3, 2]);
/// ```
#[allow(clippy::cast_possible_truncation)] // vertex counts are bounded by u32 face indices
pub fn weld_vertices(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.vertices.len();
    let mut lookup: HashMap<[u64; 3], u32> = HashMap::with_capacity(before);
    let mut remap = Vec::with_capacity(before);
    let mut vertices = Vec::with_capacity(before);

    for vertex in mesh.vertices.drain(..) {
        let p = vertex.position;
        let key = [canonical_bits(p.x), canonical_bits(p.y), canonical_bits(p.z)];
        let index = *lookup.entry(key).or_insert_with(|| {
            vertices.push(vertex);
            (vertices.len() - 1) as u32
        });
        remap.push(index);
    }
    mesh.vertices = vertices;

    let face_count = mesh.faces.len();
    mesh.faces.retain_mut(|face| {
        for index in face.iter_mut() {
            if let Some(&mapped) = remap.get(*index as usize) {
                *index = mapped;
            }
        }
        face[0] != face[1] && face[1] != face[2] && face[2] != face[0]
    });

    let removed = before - mesh.vertices.len();
    let dropped = face_count - mesh.faces.len();
    debug!(
        merged = removed,
        degenerate_faces = dropped,
        vertices = mesh.vertices.len(),
        "Welded coincident vertices"
    );
    removed
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}
