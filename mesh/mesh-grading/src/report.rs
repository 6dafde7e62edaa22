//! Diagnostics of a grading run.

// Face/edge counts don't overflow in practice
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use hashbrown::HashSet;
use mesh_types::IndexedMesh;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{EarSide, SizingStrategy};
use crate::halfedge::HalfedgeMesh;
use crate::landmark::Landmarks;

/// Statistics about edge lengths in a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeStatistics {
    /// Minimum edge length.
    pub min_length: f64,
    /// Maximum edge length.
    pub max_length: f64,
    /// Average edge length.
    pub avg_length: f64,
    /// Standard deviation of edge lengths.
    pub std_dev: f64,
    /// Total number of edges.
    pub edge_count: usize,
}

impl EdgeStatistics {
    /// Statistics over a sequence of edge lengths.
    pub fn from_lengths(lengths: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = f64::INFINITY;
        let mut max = 0.0f64;
        for len in lengths {
            count += 1;
            sum += len;
            sum_sq += len * len;
            min = min.min(len);
            max = max.max(len);
        }
        if count == 0 {
            return Self::default();
        }
        let avg = sum / count as f64;
        let variance = (sum_sq / count as f64 - avg * avg).max(0.0);
        Self {
            min_length: min,
            max_length: max,
            avg_length: avg,
            std_dev: variance.sqrt(),
            edge_count: count,
        }
    }

    /// Statistics over the unique edges of an indexed mesh.
    #[must_use]
    pub fn of_indexed(mesh: &IndexedMesh) -> Self {
        let mut seen = HashSet::with_capacity(mesh.faces.len() * 3 / 2);
        let mut lengths = Vec::with_capacity(mesh.faces.len() * 3 / 2);
        for face in &mesh.faces {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                if !seen.insert((a.min(b), a.max(b))) {
                    continue;
                }
                if let (Some(pa), Some(pb)) =
                    (mesh.vertices.get(a as usize), mesh.vertices.get(b as usize))
                {
                    lengths.push((pb.position - pa.position).norm());
                }
            }
        }
        Self::from_lengths(lengths)
    }

    /// Statistics over the live edges of the store.
    #[must_use]
    pub fn of_store(mesh: &HalfedgeMesh) -> Self {
        Self::from_lengths(mesh.edges().map(|e| mesh.edge_length(e)))
    }
}

/// Work done by one remeshing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationStats {
    /// Edges split.
    pub splits: usize,
    /// Edges collapsed.
    pub collapses: usize,
    /// Edges flipped.
    pub flips: usize,
    /// Collapses and flips refused by topology or geometry rules.
    pub rejected: usize,
    /// Vertices moved by tangential relaxation.
    pub relaxed: usize,
    /// Vertices projected back onto the reference surface.
    pub projected: usize,
    /// Projection queries that found no reference triangle.
    pub projection_misses: usize,
    /// Largest relaxation displacement.
    pub max_displacement: f64,
}

impl IterationStats {
    /// Whether the pass changed the connectivity.
    #[must_use]
    pub const fn changed_topology(&self) -> bool {
        self.splits > 0 || self.collapses > 0 || self.flips > 0
    }

    /// Total number of topological operations.
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.splits + self.collapses + self.flips
    }

    fn accumulate(mut self, other: &Self) -> Self {
        self.splits += other.splits;
        self.collapses += other.collapses;
        self.flips += other.flips;
        self.rejected += other.rejected;
        self.relaxed += other.relaxed;
        self.projected += other.projected;
        self.projection_misses += other.projection_misses;
        self.max_displacement = self.max_displacement.max(other.max_displacement);
        self
    }
}

/// Result of grading a mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GradingReport {
    /// Vertices before grading.
    pub original_vertices: usize,
    /// Faces before grading.
    pub original_faces: usize,
    /// Vertices after grading.
    pub final_vertices: usize,
    /// Faces after grading.
    pub final_faces: usize,
    /// Sizing strategy used.
    pub mode: SizingStrategy,
    /// Ear the grading focused on.
    pub side: EarSide,
    /// Resolved landmarks, including the gamma factors used.
    pub landmarks: Landmarks,
    /// Error tolerance after defaulting.
    pub error_tolerance: f64,
    /// Distance normalization after defaulting.
    pub normalization: f64,
    /// Per-pass statistics, in order.
    pub iterations: Vec<IterationStats>,
    /// Edges flipped by the final cap removal.
    pub caps_removed: usize,
    /// Input vertices whose curvature could not be estimated.
    pub low_confidence_vertices: usize,
    /// Whether the run stopped before the iteration limit.
    pub converged_early: bool,
    /// Edge statistics of the input.
    pub original_edge_stats: EdgeStatistics,
    /// Edge statistics of the result.
    pub final_edge_stats: EdgeStatistics,
}

impl GradingReport {
    /// Get the face count change ratio.
    #[must_use]
    pub fn face_ratio(&self) -> f64 {
        if self.original_faces == 0 {
            1.0
        } else {
            self.final_faces as f64 / self.original_faces as f64
        }
    }

    /// Get the vertex count change ratio.
    #[must_use]
    pub fn vertex_ratio(&self) -> f64 {
        if self.original_vertices == 0 {
            1.0
        } else {
            self.final_vertices as f64 / self.original_vertices as f64
        }
    }

    /// Number of passes actually run.
    #[must_use]
    pub fn iterations_run(&self) -> usize {
        self.iterations.len()
    }

    /// Statistics summed over all passes (largest displacement kept).
    #[must_use]
    pub fn totals(&self) -> IterationStats {
        self.iterations
            .iter()
            .fold(IterationStats::default(), IterationStats::accumulate)
    }

    /// Check if any remeshing operations were performed.
    #[must_use]
    pub fn was_remeshed(&self) -> bool {
        self.iterations.iter().any(IterationStats::changed_topology) || self.caps_removed > 0
    }
}

impl fmt::Display for GradingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();
        write!(
            f,
            "Grading ({}, side {}): {} → {} vertices, {} → {} faces ({:.1}x), \
             {} splits, {} collapses, {} flips in {} passes",
            self.mode,
            self.side,
            self.original_vertices,
            self.final_vertices,
            self.original_faces,
            self.final_faces,
            self.face_ratio(),
            totals.splits,
            totals.collapses,
            totals.flips,
            self.iterations_run()
        )
    }
}
