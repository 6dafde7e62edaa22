//! Sizing field estimation.
//!
//! A sizing field assigns every vertex the edge length its neighborhood
//! should approach. Hybrid sizing derives it from curvature with the
//! sagitta estimate `s = L² k / 8` and sharpens it near the landmarks;
//! distance sizing grows it linearly with the distance to the nearest
//! landmark.

use std::f64::consts::PI;

use mesh_types::{Aabb, IndexedMesh, MeshBounds, Point3};
use rayon::prelude::*;
use tracing::debug;

use crate::config::{EarSide, GradingConfig, SizingStrategy};
use crate::curvature::{curvature_field, Curvature};
use crate::error::{GradingError, GradingResult};
use crate::halfedge::{HalfedgeMesh, VertexId};
use crate::landmark::{resolve_landmarks, Landmarks};

/// Resolved sizing parameters shared by the estimator and the remesher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizer {
    /// Sizing strategy.
    pub strategy: SizingStrategy,
    /// Smallest target length.
    pub min_length: f64,
    /// Largest target length.
    pub max_length: f64,
    /// Chordal error tolerance.
    pub error_tolerance: f64,
    /// Ear the grading focuses on.
    pub side: EarSide,
    /// Resolved landmarks.
    pub landmarks: Landmarks,
    /// Distance at which distance sizing saturates, also the falloff
    /// radius of the hybrid landmark pull.
    pub normalization: f64,
}

impl Sizer {
    /// Resolve landmarks and the normalization length for a mesh with the given bounds.
    #[must_use]
    pub fn new(config: &GradingConfig, bounds: &Aabb) -> Self {
        let landmarks = resolve_landmarks(config.side, &config.landmarks, bounds);
        Self {
            strategy: config.mode,
            min_length: config.min_length,
            max_length: config.max_length,
            error_tolerance: config.effective_error_tolerance(),
            side: config.side,
            landmarks,
            normalization: resolve_normalization(config.distance_normalization, bounds),
        }
    }

    /// Distance sizing at `point`.
    #[must_use]
    pub fn distance_target(&self, point: &Point3<f64>) -> f64 {
        let d = self.landmarks.distance(self.side, point);
        let t = (d / self.normalization).clamp(0.0, 1.0);
        (self.max_length - self.min_length).mul_add(t, self.min_length)
    }

    /// Curvature-only sizing for a principal curvature magnitude `k`.
    #[must_use]
    pub fn curvature_target(&self, k: f64) -> f64 {
        if k > 0.0 {
            (8.0 * self.error_tolerance / k)
                .sqrt()
                .clamp(self.min_length, self.max_length)
        } else {
            self.max_length
        }
    }

    /// Pull `target` towards the minimum length near the relevant landmarks.
    ///
    /// Uses a cosine blend over the normalization radius; a no-op when no
    /// side is chosen.
    #[must_use]
    pub fn landmark_pull(&self, target: f64, point: &Point3<f64>) -> f64 {
        if self.side == EarSide::None {
            return target;
        }
        let d = self.landmarks.distance(self.side, point);
        if d >= self.normalization {
            return target;
        }
        let w = 0.5 * (1.0 + (PI * d / self.normalization).cos());
        w.mul_add(-(target - self.min_length), target)
    }

    /// Target length at `point`.
    ///
    /// `curvature` is only used by hybrid sizing; `None` there means the
    /// curvature could not be estimated and yields the maximum length.
    #[must_use]
    pub fn target(&self, point: &Point3<f64>, curvature: Option<f64>) -> f64 {
        match self.strategy {
            SizingStrategy::Distance => self.distance_target(point),
            SizingStrategy::Hybrid => match curvature {
                Some(k) => self.landmark_pull(self.curvature_target(k), point),
                None => self.max_length,
            },
        }
    }
}

/// Distance normalization actually used: the configured value if positive,
/// the bounding-box diagonal otherwise (1 for a degenerate box).
#[must_use]
pub fn resolve_normalization(configured: f64, bounds: &Aabb) -> f64 {
    if configured > 0.0 {
        return configured;
    }
    let diagonal = bounds.diagonal();
    if diagonal > 0.0 {
        diagonal
    } else {
        1.0
    }
}

/// Per-vertex sizing computed on an input mesh.
#[derive(Debug, Clone)]
pub struct SizingField {
    /// Target edge length per input vertex.
    pub target_length: Vec<f64>,
    /// Signed mean curvature per input vertex (0 where unknown).
    pub mean_curvature: Vec<f64>,
    /// Vertices whose curvature could not be estimated.
    pub low_confidence: Vec<bool>,
    /// Resolved sizing parameters.
    pub sizer: Sizer,
}

impl SizingField {
    /// Number of low-confidence vertices.
    #[must_use]
    pub fn low_confidence_count(&self) -> usize {
        self.low_confidence.iter().filter(|&&b| b).count()
    }
}

/// Assign target lengths and curvature to every live vertex of the store.
///
/// Returns the number of low-confidence vertices. Curvature is only
/// estimated for hybrid sizing.
pub fn assign_sizing(mesh: &mut HalfedgeMesh, sizer: &Sizer, smoothing: u32) -> usize {
    let curvature: Vec<Option<Curvature>> = match sizer.strategy {
        SizingStrategy::Hybrid => curvature_field(mesh, smoothing),
        SizingStrategy::Distance => Vec::new(),
    };

    let store = &*mesh;
    let computed: Vec<(VertexId, f64, Option<Curvature>)> = store
        .vertices()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|v| {
            let c = curvature.get(v.index()).copied().flatten();
            let p = store.position(v);
            (v, sizer.target(&p, c.map(|c| c.magnitude)), c)
        })
        .collect();

    let mut low_confidence = 0;
    for (v, target, c) in computed {
        let unknown = sizer.strategy == SizingStrategy::Hybrid && c.is_none();
        if unknown {
            low_confidence += 1;
            debug!("Curvature undefined at vertex {}, using max length", v.index());
        }
        let attributes = mesh.attributes_mut(v);
        attributes.target_length = target;
        attributes.mean_curvature = c.map_or(0.0, |c| c.mean);
        attributes.low_confidence = unknown;
    }
    low_confidence
}

/// Compute the sizing field of a mesh without remeshing it.
///
/// # Errors
///
/// Configuration errors, an empty mesh, or a non-manifold mesh.
///
/// # Example
///
/// ```
/// use mesh_grading::{compute_sizing_field, EarSide, GradingConfig, LandmarkOptions, SizingStrategy};
/// use mesh_types::{primitives, Point3};
///
/// let disc = primitives::disc(30.0, 6, 24);
/// let config = GradingConfig::new(1.0, 10.0)
///     .with_mode(SizingStrategy::Distance)
///     .with_side(EarSide::Left)
///     .with_distance_normalization(20.0)
///     .with_landmarks(LandmarkOptions::default().with_left(Point3::new(-10.0, 0.0, 0.0)));
///
/// let field = compute_sizing_field(&disc, &config)?;
/// // the center is 10 mm from the landmark: halfway between min and max
/// assert!((field.target_length[0] - 5.5).abs() < 1e-9);
/// # Ok::<(), mesh_grading::GradingError>(())
/// ```
pub fn compute_sizing_field(mesh: &IndexedMesh, config: &GradingConfig) -> GradingResult<SizingField> {
    config.validate()?;
    if mesh.vertices.is_empty() {
        return Err(GradingError::EmptyMesh);
    }
    if mesh.faces.is_empty() {
        return Err(GradingError::NoFaces);
    }
    let mut store = HalfedgeMesh::from_indexed(mesh)?;
    let sizer = Sizer::new(config, &mesh.bounds());
    assign_sizing(&mut store, &sizer, config.curvature_smoothing);

    let n = mesh.vertices.len();
    let mut field = SizingField {
        target_length: vec![config.max_length; n],
        mean_curvature: vec![0.0; n],
        low_confidence: vec![false; n],
        sizer,
    };
    for v in store.vertices() {
        let a = store.attributes(v);
        field.target_length[v.index()] = a.target_length;
        field.mean_curvature[v.index()] = a.mean_curvature;
        field.low_confidence[v.index()] = a.low_confidence;
    }
    Ok(field)
}
