//! Discrete curvature estimation on the halfedge store.
//!
//! Mean curvature comes from the cotangent Laplacian, Gaussian curvature
//! from the angle deficit, both normalized by the barycentric vertex area.
//! The sizing field uses the largest absolute principal curvature.

#![allow(clippy::cast_precision_loss)]

use std::f64::consts::TAU;

use rayon::prelude::*;

use crate::halfedge::{HalfedgeId, HalfedgeMesh, VertexId};

/// Cotangent weights are clamped to the cotangent of about 3 degrees.
const COT_BOUND: f64 = 19.1;

/// Curvature at one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Curvature {
    /// Signed mean curvature, positive on convex regions.
    pub mean: f64,
    /// Largest absolute principal curvature.
    pub magnitude: f64,
}

impl Curvature {
    /// Curvature from mean (`h`) and Gaussian (`k`) values.
    #[must_use]
    pub fn from_mean_gaussian(h: f64, k: f64) -> Self {
        Self {
            mean: h,
            magnitude: h.abs() + (h * h - k).max(0.0).sqrt(),
        }
    }
}

/// Cotangent of the angle at the corner opposite halfedge `h` in its face.
fn cot_opposite(mesh: &HalfedgeMesh, h: HalfedgeId) -> f64 {
    if mesh.is_boundary_halfedge(h) {
        return 0.0;
    }
    let apex = mesh.position(mesh.to_vertex(mesh.next(h)));
    let a = mesh.position(mesh.from_vertex(h)) - apex;
    let b = mesh.position(mesh.to_vertex(h)) - apex;
    let cross = a.cross(&b).norm();
    if cross <= f64::EPSILON {
        return 0.0;
    }
    (a.dot(&b) / cross).clamp(-COT_BOUND, COT_BOUND)
}

/// Curvature of an interior vertex, `None` if its one-ring is degenerate.
fn interior_curvature(mesh: &HalfedgeMesh, v: VertexId) -> Option<Curvature> {
    let p = mesh.position(v);
    let normal = mesh.vertex_normal(v)?;

    let mut area = 0.0;
    let mut angle_sum = 0.0;
    let mut laplace = nalgebra::Vector3::zeros();
    for h in mesh.outgoing(v) {
        let q = mesh.position(mesh.to_vertex(h));
        let weight = cot_opposite(mesh, h) + cot_opposite(mesh, h.opposite());
        laplace += (q - p) * weight;

        if mesh.is_boundary_halfedge(h) {
            continue;
        }
        let r = mesh.position(mesh.to_vertex(mesh.next(h)));
        let (u, w) = (q - p, r - p);
        area += u.cross(&w).norm() / 6.0;
        let denom = u.norm() * w.norm();
        if denom > f64::EPSILON {
            angle_sum += (u.dot(&w) / denom).clamp(-1.0, 1.0).acos();
        }
    }
    if area <= f64::EPSILON {
        return None;
    }

    let laplace = laplace / (2.0 * area);
    let mean = -0.5 * laplace.dot(&normal);
    let gaussian = (TAU - angle_sum) / area;
    let curvature = Curvature::from_mean_gaussian(mean, gaussian);
    curvature.magnitude.is_finite().then_some(curvature)
}

/// Estimate curvature for every vertex slot of the store.
///
/// The result is indexed by vertex slot; removed vertices and vertices
/// whose curvature cannot be estimated get `None`. Boundary vertices take
/// the mean of their interior neighbors. `smoothing` uniform one-ring
/// averaging passes follow.
#[must_use]
pub fn curvature_field(mesh: &HalfedgeMesh, smoothing: u32) -> Vec<Option<Curvature>> {
    let slots = mesh.vertex_capacity();
    let mut field: Vec<Option<Curvature>> = (0..slots)
        .into_par_iter()
        .map(|i| {
            let v = VertexId::new(i as u32);
            if mesh.is_removed_vertex(v) || mesh.is_boundary_vertex(v) {
                None
            } else {
                interior_curvature(mesh, v)
            }
        })
        .collect();

    let boundary: Vec<(usize, Option<Curvature>)> = mesh
        .vertices()
        .filter(|&v| mesh.is_boundary_vertex(v))
        .map(|v| {
            let interior = mesh
                .one_ring(v)
                .into_iter()
                .filter(|&n| !mesh.is_boundary_vertex(n))
                .filter_map(|n| field[n.index()]);
            (v.index(), average(interior))
        })
        .collect();
    for (i, value) in boundary {
        field[i] = value;
    }

    for _ in 0..smoothing {
        let smoothed: Vec<Option<Curvature>> = (0..slots)
            .into_par_iter()
            .map(|i| {
                let own = field[i]?;
                let v = VertexId::new(i as u32);
                let ring = mesh.one_ring(v).into_iter().filter_map(|n| field[n.index()]);
                average(std::iter::once(own).chain(ring))
            })
            .collect();
        field = smoothed;
    }
    field
}

fn average(values: impl Iterator<Item = Curvature>) -> Option<Curvature> {
    let (sum, count) = values.fold((Curvature::default(), 0usize), |(acc, n), c| {
        (
            Curvature {
                mean: acc.mean + c.mean,
                magnitude: acc.magnitude + c.magnitude,
            },
            n + 1,
        )
    });
    (count > 0).then(|| Curvature {
        mean: sum.mean / count as f64,
        magnitude: sum.magnitude / count as f64,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use mesh_types::primitives;

    #[test]
    fn sphere_has_inverse_radius_curvature() {
        let radius = 50.0;
        let mesh = HalfedgeMesh::from_indexed(&primitives::icosphere(radius, 3)).unwrap();
        let field = curvature_field(&mesh, 0);
        for c in field.iter().flatten() {
            assert!((c.mean * radius - 1.0).abs() < 0.05, "mean {}", c.mean);
            // the angle deficit is noisier than the Laplacian
            assert!(c.magnitude >= c.mean.abs());
            assert!(c.magnitude * radius < 1.3, "k {}", c.magnitude);
        }
        assert!(field.iter().all(Option::is_some));
    }

    #[test]
    fn flat_disc_has_zero_curvature() {
        let mesh = HalfedgeMesh::from_indexed(&primitives::disc(10.0, 4, 12)).unwrap();
        let field = curvature_field(&mesh, 1);
        for c in field.iter().flatten() {
            assert!(c.magnitude.abs() < 1e-6);
        }
        // boundary vertices borrow from interior neighbors
        assert!(field.iter().all(Option::is_some));
    }

    #[test]
    fn tube_magnitude_follows_the_curved_direction() {
        let radius = 10.0;
        let mesh = HalfedgeMesh::from_indexed(&primitives::tube(radius, 40.0, 8, 32)).unwrap();
        let field = curvature_field(&mesh, 0);
        let interior: Vec<_> = mesh
            .vertices()
            .filter(|&v| !mesh.is_boundary_vertex(v))
            .map(|v| field[v.index()].unwrap())
            .collect();
        assert!(!interior.is_empty());
        for c in interior {
            // H = 1 / 2r, largest principal curvature 1 / r
            assert!((c.mean * 2.0 * radius - 1.0).abs() < 0.1, "mean {}", c.mean);
            assert!((c.magnitude * radius - 1.0).abs() < 0.1, "k {}", c.magnitude);
        }
    }

    #[test]
    fn degenerate_ring_is_unestimated() {
        // Center vertex sitting on top of a collapsed fan.
        let mesh = mesh_types::IndexedMesh::from_positions(
            vec![
                mesh_types::Point3::origin(),
                mesh_types::Point3::new(1.0, 0.0, 0.0),
                mesh_types::Point3::new(2.0, 0.0, 0.0),
                mesh_types::Point3::new(3.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3], [0, 3, 1]],
        );
        let store = HalfedgeMesh::from_indexed(&mesh).unwrap();
        let field = curvature_field(&store, 0);
        assert!(field[0].is_none());
    }

    #[test]
    fn principal_magnitude_from_mean_and_gaussian() {
        let c = Curvature::from_mean_gaussian(0.5, 0.0);
        assert!((c.magnitude - 1.0).abs() < 1e-12);
        let c = Curvature::from_mean_gaussian(-0.2, 0.04);
        assert!((c.magnitude - 0.2).abs() < 1e-12);
    }
}
