//! Procedural surfaces used by tests, benchmarks and examples.
//!
//! All primitives are manifold, consistently wound (CCW seen from the side
//! the normal points to) and centered at the origin.

use std::f64::consts::{PI, TAU};

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::IndexedMesh;

/// Closed icosphere of the given radius.
///
/// Starts from an icosahedron and applies `subdivisions` rounds of 1-to-4
/// midpoint subdivision, pushing new vertices onto the sphere.
///
/// # Example
///
/// ```
/// use mesh_types::{primitives, MeshTopology};
///
/// let sphere = primitives::icosphere(1.0, 2);
/// assert_eq!(sphere.face_count(), 20 * 16);
/// assert_eq!(sphere.vertex_count(), 162);
/// ```
#[must_use]
pub fn icosphere(radius: f64, subdivisions: u32) -> IndexedMesh {
    let t = (1.0 + 5.0f64.sqrt()) / 2.0;
    let mut positions: Vec<Point3<f64>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .iter()
    .map(|&[x, y, z]| Point3::from(Point3::new(x, y, z).coords.normalize()))
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut next_faces = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint_index(&mut positions, &mut midpoints, a, b);
            let bc = midpoint_index(&mut positions, &mut midpoints, b, c);
            let ca = midpoint_index(&mut positions, &mut midpoints, c, a);
            next_faces.push([a, ab, ca]);
            next_faces.push([b, bc, ab]);
            next_faces.push([c, ca, bc]);
            next_faces.push([ab, bc, ca]);
        }
        faces = next_faces;
    }

    let positions = positions
        .into_iter()
        .map(|p| Point3::from(p.coords * radius))
        .collect();
    IndexedMesh::from_positions(positions, faces)
}

#[allow(clippy::cast_possible_truncation)] // vertex counts stay far below u32::MAX
fn midpoint_index(
    positions: &mut Vec<Point3<f64>>,
    cache: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    *cache.entry(key).or_insert_with(|| {
        let mid = nalgebra::center(&positions[a as usize], &positions[b as usize]);
        positions.push(Point3::from(mid.coords.normalize()));
        (positions.len() - 1) as u32
    })
}

/// Flat disc in the XY plane with normals along +Z.
///
/// The disc has a center vertex and `rings` concentric rings of
/// `segments` vertices each; its single boundary loop is the outer ring.
///
/// # Example
///
/// ```
/// use mesh_types::{primitives, MeshTopology};
///
/// let disc = primitives::disc(10.0, 4, 16);
/// assert_eq!(disc.vertex_count(), 1 + 4 * 16);
/// assert_eq!(disc.face_count(), 16 + 2 * 3 * 16);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
pub fn disc(radius: f64, rings: u32, segments: u32) -> IndexedMesh {
    let rings = rings.max(1);
    let segments = segments.max(3);
    let mut positions = vec![Point3::origin()];
    for ring in 1..=rings {
        let r = radius * f64::from(ring) / f64::from(rings);
        for s in 0..segments {
            let angle = TAU * f64::from(s) / f64::from(segments);
            positions.push(Point3::new(r * angle.cos(), r * angle.sin(), 0.0));
        }
    }

    let index = |ring: u32, s: u32| 1 + (ring - 1) * segments + (s % segments);
    let mut faces = Vec::new();
    for s in 0..segments {
        faces.push([0, index(1, s), index(1, s + 1)]);
    }
    for ring in 1..rings {
        for s in 0..segments {
            let a = index(ring, s);
            let b = index(ring, s + 1);
            let c = index(ring + 1, s + 1);
            let d = index(ring + 1, s);
            faces.push([a, d, c]);
            faces.push([a, c, b]);
        }
    }
    IndexedMesh::from_positions(positions, faces)
}

/// Open cylinder (tube) around the Z axis, from `z = -height/2` to
/// `z = height/2`, with normals pointing away from the axis.
///
/// It has two boundary loops, one at each end.
#[must_use]
pub fn tube(radius: f64, height: f64, rings: u32, segments: u32) -> IndexedMesh {
    let rings = rings.max(1);
    let segments = segments.max(3);
    let mut positions = Vec::new();
    for ring in 0..=rings {
        let z = height * (f64::from(ring) / f64::from(rings) - 0.5);
        for s in 0..segments {
            let angle = TAU * f64::from(s) / f64::from(segments);
            positions.push(Point3::new(radius * angle.cos(), radius * angle.sin(), z));
        }
    }

    let index = |ring: u32, s: u32| ring * segments + (s % segments);
    let mut faces = Vec::new();
    for ring in 0..rings {
        for s in 0..segments {
            let a = index(ring, s);
            let b = index(ring, s + 1);
            let c = index(ring + 1, s + 1);
            let d = index(ring + 1, s);
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        }
    }
    IndexedMesh::from_positions(positions, faces)
}

/// Surface area of a sphere, for comparisons against tessellations.
#[must_use]
pub fn sphere_area(radius: f64) -> f64 {
    4.0 * PI * radius * radius
}
