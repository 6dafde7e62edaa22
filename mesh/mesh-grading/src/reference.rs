//! Reference surface for shape-preserving projection.
//!
//! The reference is an immutable snapshot of the mesh taken before any
//! remeshing, together with the sizing attributes computed on it. A
//! bounding volume hierarchy over its triangles answers closest-point
//! queries by branch and bound.

use mesh_types::{Aabb, ClosestPoint, Point3, Triangle, Vector3};
use smallvec::SmallVec;

use crate::halfedge::HalfedgeMesh;

/// Maximum triangles per BVH leaf.
const MAX_LEAF_SIZE: usize = 8;

/// Subtrees at least this large are built in parallel.
const PARALLEL_THRESHOLD: usize = 4096;

/// A point on the reference surface with interpolated attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    /// Closest point on the reference surface.
    pub point: Point3<f64>,
    /// Index of the reference triangle containing `point`.
    pub face: usize,
    /// Barycentric coordinates of `point` in that triangle.
    pub barycentric: [f64; 3],
    /// Distance from the query to `point`.
    pub distance: f64,
    /// Interpolated target edge length.
    pub target_length: f64,
    /// Interpolated mean curvature.
    pub mean_curvature: f64,
    /// Interpolated unit normal.
    pub normal: Vector3<f64>,
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        bbox: Aabb,
        triangles: SmallVec<[u32; 8]>,
    },
    Internal {
        bbox: Aabb,
        left: Box<Self>,
        right: Box<Self>,
    },
}

impl BvhNode {
    const fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Immutable snapshot of the input surface.
#[derive(Debug)]
pub struct ReferenceSurface {
    positions: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
    target_length: Vec<f64>,
    mean_curvature: Vec<f64>,
    normals: Vec<Vector3<f64>>,
    root: Option<BvhNode>,
    search_radius: f64,
}

impl ReferenceSurface {
    /// Snapshot the store, including its current grading attributes.
    ///
    /// The search radius defaults to the bounding-box diagonal (at least 1).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(mesh: &HalfedgeMesh) -> Self {
        let slots = mesh.vertex_capacity();
        let mut positions = vec![Point3::origin(); slots];
        let mut target_length = vec![0.0; slots];
        let mut mean_curvature = vec![0.0; slots];
        let mut normals = vec![Vector3::zeros(); slots];
        for v in mesh.vertices() {
            let i = v.index();
            positions[i] = mesh.position(v);
            target_length[i] = mesh.attributes(v).target_length;
            mean_curvature[i] = mesh.attributes(v).mean_curvature;
            normals[i] = mesh.vertex_normal(v).unwrap_or_else(Vector3::zeros);
        }
        let faces: Vec<[u32; 3]> = mesh
            .faces()
            .map(|f| mesh.face_vertices(f).map(|v| v.index() as u32))
            .collect();

        let boxes: Vec<(u32, Aabb)> = faces
            .iter()
            .enumerate()
            .map(|(i, [a, b, c])| {
                let bbox = Aabb::from_triangle(
                    &positions[*a as usize],
                    &positions[*b as usize],
                    &positions[*c as usize],
                );
                (i as u32, bbox)
            })
            .collect();
        let root = (!boxes.is_empty()).then(|| {
            let indices: Vec<usize> = (0..boxes.len()).collect();
            build_recursive(&boxes, indices)
        });

        let search_radius = root
            .as_ref()
            .map_or(1.0, |node| node.bbox().diagonal().max(1.0));

        Self {
            positions,
            faces,
            target_length,
            mean_curvature,
            normals,
            root,
            search_radius,
        }
    }

    /// Limit closest-point queries to `radius`.
    #[must_use]
    pub const fn with_search_radius(mut self, radius: f64) -> Self {
        self.search_radius = radius;
        self
    }

    /// Radius beyond which a query finds nothing.
    #[must_use]
    pub const fn search_radius(&self) -> f64 {
        self.search_radius
    }

    /// Number of reference triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Reference triangle `face`.
    #[must_use]
    pub fn triangle(&self, face: usize) -> Option<Triangle> {
        let [a, b, c] = *self.faces.get(face)?;
        Some(Triangle::new(
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ))
    }

    /// Closest point on the reference surface to `point`.
    ///
    /// Returns `None` when no triangle lies within the search radius.
    #[must_use]
    pub fn closest_point(&self, point: &Point3<f64>) -> Option<SurfaceSample> {
        let root = self.root.as_ref()?;
        let mut best: Option<(u32, ClosestPoint)> = None;
        let mut best_d2 = self.search_radius * self.search_radius;
        self.nearest(root, point, &mut best, &mut best_d2);
        let (face, hit) = best?;
        Some(self.sample(face as usize, &hit))
    }

    /// Distance from `point` to the reference surface, if within the search radius.
    #[must_use]
    pub fn distance(&self, point: &Point3<f64>) -> Option<f64> {
        self.closest_point(point).map(|s| s.distance)
    }

    fn nearest(
        &self,
        node: &BvhNode,
        point: &Point3<f64>,
        best: &mut Option<(u32, ClosestPoint)>,
        best_d2: &mut f64,
    ) {
        match node {
            BvhNode::Leaf { triangles, .. } => {
                for &t in triangles {
                    let Some(tri) = self.triangle(t as usize) else {
                        continue;
                    };
                    let hit = tri.closest_point(point);
                    if hit.distance_squared <= *best_d2 {
                        *best_d2 = hit.distance_squared;
                        *best = Some((t, hit));
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                let dl = left.bbox().distance_squared(point);
                let dr = right.bbox().distance_squared(point);
                let (near, d_near, far, d_far) = if dl <= dr {
                    (left, dl, right, dr)
                } else {
                    (right, dr, left, dl)
                };
                if d_near <= *best_d2 {
                    self.nearest(near, point, best, best_d2);
                }
                if d_far <= *best_d2 {
                    self.nearest(far, point, best, best_d2);
                }
            }
        }
    }

    fn sample(&self, face: usize, hit: &ClosestPoint) -> SurfaceSample {
        let corners = self.faces[face].map(|i| i as usize);
        let [wa, wb, wc] = hit.barycentric;
        let blend = |values: &[f64]| {
            wa * values[corners[0]] + wb * values[corners[1]] + wc * values[corners[2]]
        };
        let normal = self.normals[corners[0]] * wa
            + self.normals[corners[1]] * wb
            + self.normals[corners[2]] * wc;
        let normal = normal
            .try_normalize(f64::EPSILON)
            .or_else(|| self.triangle(face).and_then(|t| t.normal()))
            .unwrap_or_else(Vector3::z);

        SurfaceSample {
            point: hit.point,
            face,
            barycentric: hit.barycentric,
            distance: hit.distance_squared.sqrt(),
            target_length: blend(&self.target_length),
            mean_curvature: blend(&self.mean_curvature),
            normal,
        }
    }
}

fn axis_value(p: &Point3<f64>, axis: usize) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

fn build_recursive(boxes: &[(u32, Aabb)], indices: Vec<usize>) -> BvhNode {
    let bbox = indices
        .iter()
        .fold(Aabb::empty(), |acc, &i| acc.union(&boxes[i].1));

    if indices.len() <= MAX_LEAF_SIZE {
        return BvhNode::Leaf {
            bbox,
            triangles: indices.iter().map(|&i| boxes[i].0).collect(),
        };
    }

    // Median split along the longest axis
    let axis = bbox.longest_axis();
    let mut sorted = indices;
    sorted.sort_by(|&a, &b| {
        let va = axis_value(&boxes[a].1.center(), axis);
        let vb = axis_value(&boxes[b].1.center(), axis);
        va.total_cmp(&vb)
    });
    let right_indices = sorted.split_off(sorted.len() / 2);
    let left_indices = sorted;

    let (left, right) = if right_indices.len() >= PARALLEL_THRESHOLD {
        rayon::join(
            || build_recursive(boxes, left_indices),
            || build_recursive(boxes, right_indices),
        )
    } else {
        (
            build_recursive(boxes, left_indices),
            build_recursive(boxes, right_indices),
        )
    };

    BvhNode::Internal {
        bbox,
        left: Box::new(left),
        right: Box::new(right),
    }
}
