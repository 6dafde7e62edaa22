//! Adaptive remeshing driver.

// Mesh sizes don't overflow f64 precision in practice
#![allow(
    clippy::cast_precision_loss,
    clippy::similar_names,
    clippy::suboptimal_flops
)]

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{GradingConfig, SizingStrategy};
use crate::error::{GradingError, GradingResult, Rejection};
use crate::halfedge::{EdgeId, HalfedgeMesh, VertexId, DEGENERATE_EPSILON};
use crate::reference::ReferenceSurface;
use crate::report::{EdgeStatistics, GradingReport, IterationStats};
use crate::sizing::{assign_sizing, Sizer};

/// Edges longer than this multiple of their target are split.
pub const SPLIT_RATIO: f64 = 4.0 / 3.0;

/// Edges shorter than this multiple of their target are collapsed.
pub const COLLAPSE_RATIO: f64 = 4.0 / 5.0;

/// Upper bound on split sweeps per pass.
const MAX_SPLIT_ROUNDS: usize = 10;

/// Interior angle (degrees) above which a triangle counts as a cap.
const CAP_ANGLE_DEGREES: f64 = 170.0;

/// Grade a mesh in place.
///
/// Computes the sizing field on the input, then runs the configured number
/// of split/collapse/flip/relax/project passes. On success `mesh` is
/// replaced by the graded mesh.
///
/// # Arguments
///
/// * `mesh` - Manifold triangle mesh, graded in place
/// * `config` - Grading parameters
///
/// # Returns
///
/// A report with counts, resolved landmarks and per-pass statistics.
///
/// # Errors
///
/// Returns an error, leaving `mesh` untouched, if:
/// - The configuration is invalid
/// - The mesh has no vertices or no faces
/// - The mesh is not a 2-manifold
///
/// # Example
///
/// ```
/// use mesh_grading::{grade, GradingConfig};
/// use mesh_types::primitives;
///
/// let mut sphere = primitives::icosphere(50.0, 2);
/// let config = GradingConfig::new(1.0, 5.0)
///     .with_error_tolerance(0.05)
///     .with_iterations(3);
///
/// let report = grade(&mut sphere, &config)?;
/// assert_eq!(report.final_faces, sphere.faces.len());
/// assert!(report.was_remeshed());
/// # Ok::<(), mesh_grading::GradingError>(())
/// ```
pub fn grade(mesh: &mut IndexedMesh, config: &GradingConfig) -> GradingResult<GradingReport> {
    config.validate()?;
    if mesh.vertices.is_empty() {
        return Err(GradingError::EmptyMesh);
    }
    if mesh.faces.is_empty() {
        return Err(GradingError::NoFaces);
    }

    let mut store = HalfedgeMesh::from_indexed(mesh)?;
    let original_vertices = mesh.vertices.len();
    let original_faces = mesh.faces.len();
    let original_edge_stats = EdgeStatistics::of_store(&store);

    let sizer = Sizer::new(config, &store.bounds());
    let low_confidence_vertices = assign_sizing(&mut store, &sizer, config.curvature_smoothing);
    if low_confidence_vertices > 0 {
        debug!(
            "{} vertices without curvature estimate",
            low_confidence_vertices
        );
    }
    if let Some(angle) = config.feature_angle_radians() {
        let features = mark_features(&mut store, angle);
        debug!("Marked {} feature edges", features);
    }

    let reference = ReferenceSurface::new(&store);
    let mut remesher = Remesher {
        mesh: store,
        reference,
        sizer,
        config,
    };
    let (iterations, converged_early) = remesher.run();
    let caps_removed = if config.remove_caps {
        remesher.remove_caps()
    } else {
        0
    };

    let final_edge_stats = EdgeStatistics::of_store(&remesher.mesh);
    *mesh = remesher.mesh.to_indexed();

    let report = GradingReport {
        original_vertices,
        original_faces,
        final_vertices: mesh.vertices.len(),
        final_faces: mesh.faces.len(),
        mode: config.mode,
        side: config.side,
        landmarks: remesher.sizer.landmarks,
        error_tolerance: remesher.sizer.error_tolerance,
        normalization: remesher.sizer.normalization,
        iterations,
        caps_removed,
        low_confidence_vertices,
        converged_early,
        original_edge_stats,
        final_edge_stats,
    };
    info!("{}", report);
    Ok(report)
}

/// Mark interior edges whose dihedral angle exceeds `angle` (radians) as
/// feature edges, and their endpoints as feature vertices.
///
/// Returns the number of feature edges.
pub fn mark_features(mesh: &mut HalfedgeMesh, angle: f64) -> usize {
    let features: Vec<EdgeId> = mesh
        .edges()
        .filter(|&e| {
            let (Some(fa), Some(fb)) = (mesh.face(e.halfedge(0)), mesh.face(e.halfedge(1))) else {
                return false;
            };
            match (mesh.face_normal(fa), mesh.face_normal(fb)) {
                (Some(na), Some(nb)) => na.dot(&nb).clamp(-1.0, 1.0).acos() > angle,
                _ => false,
            }
        })
        .collect();
    for &e in &features {
        mesh.set_feature_edge(e, true);
        let (a, b) = mesh.edge_vertices(e);
        mesh.attributes_mut(a).feature = true;
        mesh.attributes_mut(b).feature = true;
    }
    features.len()
}

/// Whether moving `v` to `q` keeps every incident face non-degenerate and
/// facing the same way. Faces containing `ignore` are skipped.
fn keeps_orientation(
    mesh: &HalfedgeMesh,
    v: VertexId,
    q: &Point3<f64>,
    ignore: Option<VertexId>,
) -> bool {
    let p = mesh.position(v);
    mesh.outgoing(v).all(|h| {
        if mesh.is_boundary_halfedge(h) {
            return true;
        }
        let (b, c) = (mesh.to_vertex(h), mesh.to_vertex(mesh.next(h)));
        if Some(b) == ignore || Some(c) == ignore {
            return true;
        }
        let (pb, pc) = (mesh.position(b), mesh.position(c));
        let before = (pb - p).cross(&(pc - p));
        let after = (pb - q).cross(&(pc - q));
        let scale = (pb - q).norm_squared().max((pc - q).norm_squared());
        after.norm() > 2.0 * DEGENERATE_EPSILON * scale && after.dot(&before) > 0.0
    })
}

fn corner_angle(apex: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let (u, w) = (a - apex, b - apex);
    let denom = u.norm() * w.norm();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (u.dot(&w) / denom).clamp(-1.0, 1.0).acos()
}

struct Remesher<'a> {
    mesh: HalfedgeMesh,
    reference: ReferenceSurface,
    sizer: Sizer,
    config: &'a GradingConfig,
}

impl Remesher<'_> {
    /// Run all passes. Returns per-pass statistics and whether the run
    /// stopped early.
    fn run(&mut self) -> (Vec<IterationStats>, bool) {
        let mut history = Vec::with_capacity(self.config.iterations as usize);
        for iteration in 0..self.config.iterations {
            if iteration > 0 {
                self.refresh();
            }

            let mut stats = IterationStats::default();
            let mut moved = HashSet::new();

            self.split_long_edges(&mut stats, &mut moved);
            self.check_topology("split");
            self.collapse_short_edges(&mut stats);
            self.check_topology("collapse");
            self.flip_edges(&mut stats);
            self.check_topology("flip");
            self.relax(&mut stats, &mut moved);
            if self.config.project_to_original {
                self.project(&moved, &mut stats);
            }

            debug!(
                "Iteration {}: {} splits, {} collapses, {} flips, {} rejected, {} relaxed, {} projected",
                iteration + 1,
                stats.splits,
                stats.collapses,
                stats.flips,
                stats.rejected,
                stats.relaxed,
                stats.projected
            );
            history.push(stats);

            if let Some(tolerance) = self.config.convergence_tolerance {
                let last = iteration + 1 == self.config.iterations;
                if !last && !stats.changed_topology() && stats.max_displacement < tolerance {
                    debug!("Converged after {} iterations", iteration + 1);
                    return (history, true);
                }
            }
        }
        (history, false)
    }

    #[cfg(debug_assertions)]
    fn check_topology(&self, step: &str) {
        if let Err(e) = self.mesh.validate() {
            debug_assert!(false, "{step} broke the mesh: {e}");
        }
    }

    #[cfg(not(debug_assertions))]
    #[allow(clippy::unused_self)]
    const fn check_topology(&self, _step: &str) {}

    fn edge_target(&self, e: EdgeId) -> f64 {
        let (a, b) = self.mesh.edge_vertices(e);
        0.5 * (self.mesh.attributes(a).target_length + self.mesh.attributes(b).target_length)
    }

    /// Re-sample the sizing field at the current vertex positions.
    fn refresh(&mut self) {
        let vertices: Vec<VertexId> = self.mesh.vertices().collect();
        match self.sizer.strategy {
            SizingStrategy::Distance => {
                for v in vertices {
                    let target = self.sizer.distance_target(&self.mesh.position(v));
                    self.mesh.attributes_mut(v).target_length = target;
                }
            }
            SizingStrategy::Hybrid => {
                let (mesh, reference) = (&self.mesh, &self.reference);
                let samples: Vec<_> = vertices
                    .into_par_iter()
                    .map(|v| (v, reference.closest_point(&mesh.position(v))))
                    .collect();
                for (v, sample) in samples {
                    if let Some(sample) = sample {
                        let attributes = self.mesh.attributes_mut(v);
                        attributes.target_length = sample.target_length;
                        attributes.mean_curvature = sample.mean_curvature;
                    }
                }
            }
        }
    }

    fn split_long_edges(&mut self, stats: &mut IterationStats, moved: &mut HashSet<VertexId>) {
        for _ in 0..MAX_SPLIT_ROUNDS {
            let edges: Vec<EdgeId> = self.mesh.edges().collect();
            let mut split_any = false;
            for e in edges {
                if self.mesh.edge_length(e) <= SPLIT_RATIO * self.edge_target(e) {
                    continue;
                }
                let midpoint = self.mesh.edge_midpoint(e);
                match self.mesh.split_edge(e, midpoint) {
                    Ok(v) => {
                        if self.sizer.strategy == SizingStrategy::Distance {
                            self.mesh.attributes_mut(v).target_length =
                                self.sizer.distance_target(&midpoint);
                        }
                        moved.insert(v);
                        stats.splits += 1;
                        split_any = true;
                    }
                    Err(_) => stats.rejected += 1,
                }
            }
            if !split_any {
                break;
            }
        }
    }

    /// Endpoints that may be removed when collapsing `e`, preferred first.
    fn collapse_candidates(&self, e: EdgeId) -> Vec<(VertexId, VertexId)> {
        let mesh = &self.mesh;
        let (v0, v1) = mesh.edge_vertices(e);
        let boundary_edge = mesh.is_boundary_edge(e);
        let feature_edge = mesh.is_feature_edge(e);

        let removable = |v: VertexId, other: VertexId| {
            let on_boundary = mesh.is_boundary_vertex(v);
            if on_boundary && !(boundary_edge && mesh.is_boundary_vertex(other)) {
                return false;
            }
            if mesh.attributes(v).feature {
                let feature_edges = mesh
                    .outgoing(v)
                    .filter(|h| mesh.is_feature_edge(h.edge()))
                    .count();
                return feature_edge && feature_edges == 2;
            }
            true
        };

        let mut candidates = Vec::with_capacity(2);
        let (r0, r1) = (removable(v0, v1), removable(v1, v0));
        match (r0, r1) {
            (true, true) => {
                if mesh.valence(v0) <= mesh.valence(v1) {
                    candidates.extend([(v0, v1), (v1, v0)]);
                } else {
                    candidates.extend([(v1, v0), (v0, v1)]);
                }
            }
            (true, false) => candidates.push((v0, v1)),
            (false, true) => candidates.push((v1, v0)),
            (false, false) => {}
        }
        candidates
    }

    /// Geometric checks for removing `remove` into `keep`.
    fn check_collapse_geometry(&self, remove: VertexId, keep: VertexId) -> Result<(), Rejection> {
        let mesh = &self.mesh;
        let q = mesh.position(keep);
        let keep_target = mesh.attributes(keep).target_length;
        for n in mesh.one_ring(remove) {
            if n == keep {
                continue;
            }
            let limit = SPLIT_RATIO * 0.5 * (keep_target + mesh.attributes(n).target_length);
            if (mesh.position(n) - q).norm() > limit {
                return Err(Rejection::LongEdge);
            }
        }
        if !keeps_orientation(mesh, remove, &q, Some(keep)) {
            return Err(Rejection::FoldOver);
        }
        Ok(())
    }

    fn collapse_short_edges(&mut self, stats: &mut IterationStats) {
        let edges: Vec<EdgeId> = self.mesh.edges().collect();
        for e in edges {
            if self.mesh.is_removed_edge(e) {
                continue;
            }
            if self.mesh.edge_length(e) >= COLLAPSE_RATIO * self.edge_target(e) {
                continue;
            }
            let mut collapsed = false;
            for (remove, keep) in self.collapse_candidates(e) {
                let attempt = self
                    .check_collapse_geometry(remove, keep)
                    .and_then(|()| self.mesh.collapse_edge(e, keep));
                if attempt.is_ok() {
                    collapsed = true;
                    break;
                }
            }
            if collapsed {
                stats.collapses += 1;
            } else {
                stats.rejected += 1;
            }
        }
    }

    fn valence_deviation(&self, v: VertexId, delta: i64) -> i64 {
        let ideal = if self.mesh.is_boundary_vertex(v) { 4 } else { 6 };
        #[allow(clippy::cast_possible_wrap)]
        let valence = self.mesh.valence(v) as i64 + delta;
        (valence - ideal) * (valence - ideal)
    }

    fn flip_edges(&mut self, stats: &mut IterationStats) {
        let edges: Vec<EdgeId> = self.mesh.edges().collect();
        for e in edges {
            let mesh = &self.mesh;
            if mesh.is_boundary_edge(e) || mesh.is_feature_edge(e) {
                continue;
            }
            let (a0, b0) = (e.halfedge(0), e.halfedge(1));
            let va0 = mesh.to_vertex(a0);
            let vb0 = mesh.to_vertex(b0);
            let va1 = mesh.to_vertex(mesh.next(a0));
            let vb1 = mesh.to_vertex(mesh.next(b0));

            let before = self.valence_deviation(va0, 0)
                + self.valence_deviation(vb0, 0)
                + self.valence_deviation(va1, 0)
                + self.valence_deviation(vb1, 0);
            let after = self.valence_deviation(va0, -1)
                + self.valence_deviation(vb0, -1)
                + self.valence_deviation(va1, 1)
                + self.valence_deviation(vb1, 1);
            if after >= before {
                continue;
            }

            if !self.flip_keeps_orientation(va0, vb0, va1, vb1) {
                stats.rejected += 1;
                continue;
            }
            match self.mesh.flip_edge(e) {
                Ok(()) => stats.flips += 1,
                Err(_) => stats.rejected += 1,
            }
        }
    }

    /// Whether replacing the diagonal `va0`-`vb0` by `va1`-`vb1` keeps both
    /// faces oriented like the quad they span.
    fn flip_keeps_orientation(
        &self,
        va0: VertexId,
        vb0: VertexId,
        va1: VertexId,
        vb1: VertexId,
    ) -> bool {
        let p = |v| self.mesh.position(v);
        // Faces before: (vb0, va0, va1) and (va0, vb0, vb1).
        let quad = (p(va0) - p(vb0)).cross(&(p(va1) - p(vb0)))
            + (p(vb0) - p(va0)).cross(&(p(vb1) - p(va0)));
        let fa = (p(va1) - p(vb1)).cross(&(p(vb0) - p(vb1)));
        let fb = (p(vb1) - p(va1)).cross(&(p(va0) - p(va1)));
        fa.dot(&quad) > 0.0 && fb.dot(&quad) > 0.0
    }

    fn relax(&mut self, stats: &mut IterationStats, moved: &mut HashSet<VertexId>) {
        let factor = self.config.relaxation_factor;
        let mesh = &self.mesh;
        let vertices: Vec<VertexId> = mesh
            .vertices()
            .filter(|&v| !mesh.is_boundary_vertex(v) && !mesh.attributes(v).feature)
            .collect();

        let targets: Vec<(VertexId, Point3<f64>)> = vertices
            .into_par_iter()
            .filter_map(|v| {
                let normal = mesh.vertex_normal(v)?;
                let mut centroid = Vector3::zeros();
                let mut weight_sum = 0.0;
                for f in mesh.vertex_faces(v) {
                    let [a, b, c] = mesh.face_vertices(f);
                    let sizing = (mesh.attributes(a).target_length
                        + mesh.attributes(b).target_length
                        + mesh.attributes(c).target_length)
                        / 3.0;
                    let triangle = mesh.triangle(f);
                    let weight = triangle.area() / (sizing * sizing).max(f64::EPSILON);
                    centroid += triangle.centroid().coords * weight;
                    weight_sum += weight;
                }
                if weight_sum <= f64::EPSILON {
                    return None;
                }
                let p = mesh.position(v);
                let delta = centroid / weight_sum - p.coords;
                let tangential = delta - normal * normal.dot(&delta);
                Some((v, p + tangential * factor))
            })
            .collect();

        for (v, q) in targets {
            if !keeps_orientation(&self.mesh, v, &q, None) {
                continue;
            }
            let displacement = (q - self.mesh.position(v)).norm();
            if self.mesh.move_vertex(v, q).is_ok() {
                stats.relaxed += 1;
                stats.max_displacement = stats.max_displacement.max(displacement);
                moved.insert(v);
            }
        }
    }

    fn project(&mut self, moved: &HashSet<VertexId>, stats: &mut IterationStats) {
        let mesh = &self.mesh;
        let candidates: Vec<VertexId> = moved
            .iter()
            .copied()
            .filter(|&v| !mesh.is_removed_vertex(v) && !mesh.is_boundary_vertex(v))
            .collect();

        let reference = &self.reference;
        let samples: Vec<_> = candidates
            .into_par_iter()
            .map(|v| (v, reference.closest_point(&mesh.position(v))))
            .collect();

        for (v, sample) in samples {
            let Some(sample) = sample else {
                stats.projection_misses += 1;
                continue;
            };
            if self.mesh.move_vertex(v, sample.point).is_err() {
                continue;
            }
            let target = match self.sizer.strategy {
                SizingStrategy::Distance => self.sizer.distance_target(&sample.point),
                SizingStrategy::Hybrid => sample.target_length,
            };
            let attributes = self.mesh.attributes_mut(v);
            attributes.target_length = target;
            attributes.mean_curvature = sample.mean_curvature;
            stats.projected += 1;
        }
    }

    /// Flip interior edges opposite an angle above the cap threshold when
    /// that lowers the largest angle of the two faces.
    fn remove_caps(&mut self) -> usize {
        let cap = CAP_ANGLE_DEGREES.to_radians();
        let edges: Vec<EdgeId> = self.mesh.edges().collect();
        let mut flipped = 0;
        for e in edges {
            let mesh = &self.mesh;
            if mesh.is_boundary_edge(e) || mesh.is_feature_edge(e) {
                continue;
            }
            let (a0, b0) = (e.halfedge(0), e.halfedge(1));
            let va0 = mesh.to_vertex(a0);
            let vb0 = mesh.to_vertex(b0);
            let va1 = mesh.to_vertex(mesh.next(a0));
            let vb1 = mesh.to_vertex(mesh.next(b0));
            let [p0, q0, p1, q1] = [va0, vb0, va1, vb1].map(|v| mesh.position(v));

            let opposite = corner_angle(&p1, &p0, &q0).max(corner_angle(&q1, &p0, &q0));
            if opposite <= cap {
                continue;
            }
            let max_after = [
                corner_angle(&p1, &q1, &q0),
                corner_angle(&q1, &p1, &q0),
                corner_angle(&q0, &p1, &q1),
                corner_angle(&p1, &q1, &p0),
                corner_angle(&q1, &p1, &p0),
                corner_angle(&p0, &p1, &q1),
            ]
            .into_iter()
            .fold(0.0, f64::max);
            if max_after >= opposite || !self.flip_keeps_orientation(va0, vb0, va1, vb1) {
                continue;
            }
            if self.mesh.flip_edge(e).is_ok() {
                flipped += 1;
            }
        }
        if flipped > 0 {
            debug!("Removed {} caps", flipped);
        }
        flipped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::EarSide;
    use mesh_types::{primitives, MeshTopology};

    fn sphere_config() -> GradingConfig {
        GradingConfig::new(1.0, 5.0)
            .with_error_tolerance(0.05)
            .with_iterations(4)
    }

    #[test]
    fn test_grade_rejects_empty_mesh() {
        let mut mesh = IndexedMesh::new();
        assert!(matches!(
            grade(&mut mesh, &GradingConfig::default()),
            Err(GradingError::EmptyMesh)
        ));
    }

    #[test]
    fn test_grade_rejects_no_faces() {
        let mut mesh = IndexedMesh::from_positions(vec![Point3::origin()], Vec::new());
        assert!(matches!(
            grade(&mut mesh, &GradingConfig::default()),
            Err(GradingError::NoFaces)
        ));
    }

    #[test]
    fn test_grade_rejects_nan_vertex() {
        let positions = vec![
            Point3::new(f64::NAN, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        let original = IndexedMesh::from_positions(positions, vec![[0, 1, 2]]);
        let mut mesh = original.clone();
        let result = grade(&mut mesh, &GradingConfig::new(1.0, 2.0).with_iterations(2));
        assert!(matches!(
            result,
            Err(GradingError::NonFiniteVertex { index: 0, .. })
        ));
        assert_eq!(mesh.faces, original.faces);
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn test_invalid_config_leaves_mesh_untouched() {
        let original = primitives::icosphere(10.0, 1);
        let mut mesh = original.clone();
        let result = grade(&mut mesh, &GradingConfig::new(5.0, 1.0));
        assert!(matches!(result, Err(GradingError::InvalidLengthRange { .. })));
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_non_manifold_input_is_reported() {
        let original = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, -1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        let mut mesh = original.clone();
        let result = grade(&mut mesh, &GradingConfig::default());
        assert!(matches!(result, Err(GradingError::NonManifold { .. })));
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_coarse_sphere_is_refined() {
        let mut mesh = primitives::icosphere(50.0, 1);
        let report = grade(&mut mesh, &sphere_config()).unwrap();
        assert!(report.final_faces > report.original_faces);
        assert_eq!(report.iterations_run(), 4);
        assert!(report.totals().splits > 0);
        HalfedgeMesh::from_indexed(&mesh).unwrap().validate().unwrap();
    }

    #[test]
    fn test_fine_sphere_is_coarsened() {
        let mut mesh = primitives::icosphere(50.0, 4);
        let report = grade(&mut mesh, &sphere_config()).unwrap();
        assert!(report.final_faces < report.original_faces);
        assert!(report.totals().collapses > 0);
    }

    #[test]
    fn test_report_carries_landmarks() {
        let mut mesh = primitives::icosphere(60.0, 2);
        let config = sphere_config()
            .with_side(EarSide::Right)
            .with_iterations(1);
        let report = grade(&mut mesh, &config).unwrap();
        assert_eq!(report.side, EarSide::Right);
        assert!((report.landmarks.right.x - 0.15 * 60.0).abs() < 1e-6);
        assert_eq!(report.error_tolerance, 0.05);
        assert_eq!(report.final_vertices, mesh.vertex_count());
    }

    #[test]
    fn test_convergence_stops_early() {
        let mut mesh = primitives::icosphere(50.0, 3);
        let config = sphere_config()
            .with_iterations(30)
            .with_convergence_tolerance(10.0);
        let report = grade(&mut mesh, &config).unwrap();
        assert!(report.converged_early);
        assert!(report.iterations_run() < 30);
    }

    #[test]
    fn test_feature_edges_survive() {
        // A folded strip: two flat halves meeting at a 90 degree crease.
        let mut positions = Vec::new();
        for j in 0..=8 {
            let y = f64::from(j) * 2.0;
            for x in [-8.0, -6.0, -4.0, -2.0] {
                positions.push(Point3::new(x, y, 0.0));
            }
            positions.push(Point3::new(0.0, y, 0.0));
            for z in [2.0, 4.0, 6.0, 8.0] {
                positions.push(Point3::new(0.0, y, z));
            }
        }
        let mut faces = Vec::new();
        for j in 0..8u32 {
            for i in 0..8u32 {
                let a = j * 9 + i;
                let (b, c, d) = (a + 1, a + 10, a + 9);
                faces.push([a, b, c]);
                faces.push([a, c, d]);
            }
        }
        let mut mesh = IndexedMesh::from_positions(positions, faces);
        let config = GradingConfig::new(1.0, 3.0)
            .with_mode(SizingStrategy::Distance)
            .with_side(EarSide::Left)
            .with_feature_angle(45.0)
            .with_iterations(3);
        grade(&mut mesh, &config).unwrap();

        // crease vertices stay on the crease line
        let crease: Vec<_> = mesh
            .vertices
            .iter()
            .filter(|v| v.position.x.abs() < 1e-9 && v.position.z.abs() < 1e-9)
            .collect();
        // both crease ends lie on the boundary and are kept
        assert!(crease.len() >= 2);
        for v in &mesh.vertices {
            let p = v.position;
            assert!(p.x.abs() < 1e-9 || p.z.abs() < 1e-9, "vertex left the fold: {p:?}");
        }
    }

    #[test]
    fn test_mark_features_on_cube_edges() {
        let strip = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 3, 1]],
        );
        let mut store = HalfedgeMesh::from_indexed(&strip).unwrap();
        assert_eq!(mark_features(&mut store, 45f64.to_radians()), 1);
        assert!(store.attributes(VertexId::new(0)).feature);
        assert!(!store.attributes(VertexId::new(2)).feature);
        assert_eq!(mark_features(&mut store, 100f64.to_radians()), 0);
    }

    #[test]
    fn test_cap_is_flipped() {
        // Two triangles sharing a long diagonal with a needle on one side.
        let cap = IndexedMesh::from_positions(
            vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.01, 0.0),
                Point3::new(0.0, -1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 0, 3]],
        );
        let store = HalfedgeMesh::from_indexed(&cap).unwrap();
        let reference = ReferenceSurface::new(&store);
        let config = GradingConfig::default();
        let sizer = Sizer::new(&config, &store.bounds());
        let mut remesher = Remesher {
            mesh: store,
            reference,
            sizer,
            config: &config,
        };
        assert_eq!(remesher.remove_caps(), 1);
        remesher.mesh.validate().unwrap();
        assert!(remesher
            .mesh
            .find_halfedge(VertexId::new(2), VertexId::new(3))
            .is_some());
    }
}
