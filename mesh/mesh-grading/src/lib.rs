//! Adaptive mesh grading for HRTF simulation.
//!
//! Boundary element simulations of head-related transfer functions need
//! fine triangles around the ear being simulated and tolerate coarse ones
//! elsewhere. This crate remeshes a head mesh so its edge lengths follow a
//! sizing field:
//!
//! - **Hybrid**: edge length from local curvature and an error tolerance,
//!   pulled towards the minimum length near the chosen ear
//! - **Distance**: edge length grows linearly with the distance to the
//!   chosen ear canal entrance
//!
//! The remesher runs a fixed number of passes, each performing:
//! - **Split**: Edges longer than 4/3 of their target are split
//! - **Collapse**: Edges shorter than 4/5 of their target are collapsed
//! - **Flip**: Edges are flipped towards valence 6 (4 on the boundary)
//! - **Relax**: Vertices move tangentially towards sizing-weighted centroids
//! - **Project**: Moved vertices return to the input surface
//!
//! # Examples
//!
//! Curvature-driven grading of a sphere:
//!
//! ```
//! use mesh_grading::{grade, GradingConfig};
//! use mesh_types::primitives;
//!
//! let mut mesh = primitives::icosphere(50.0, 2);
//! let config = GradingConfig::new(1.0, 5.0)
//!     .with_error_tolerance(0.05)
//!     .with_iterations(3);
//!
//! let report = grade(&mut mesh, &config)?;
//! assert!(report.final_faces > report.original_faces);
//! # Ok::<(), mesh_grading::GradingError>(())
//! ```
//!
//! Distance grading towards the left ear:
//!
//! ```
//! use mesh_grading::{grade, EarSide, GradingConfig, SizingStrategy};
//! use mesh_types::primitives;
//!
//! let mut mesh = primitives::icosphere(80.0, 2);
//! let config = GradingConfig::new(2.0, 12.0)
//!     .with_mode(SizingStrategy::Distance)
//!     .with_side(EarSide::Left)
//!     .with_iterations(2);
//!
//! let report = grade(&mut mesh, &config)?;
//! assert!(report.landmarks.left.x < 0.0);
//! # Ok::<(), mesh_grading::GradingError>(())
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod config;
mod curvature;
mod error;
mod halfedge;
mod landmark;
mod reference;
mod remesh;
mod report;
mod sizing;

pub use config::{EarSide, GradingConfig, LandmarkOptions, SizingStrategy};
pub use curvature::{curvature_field, Curvature};
pub use error::{GradingError, GradingResult, Rejection};
pub use halfedge::{
    EdgeId, FaceId, GradingAttributes, HalfedgeId, HalfedgeMesh, OutgoingHalfedges, VertexId,
};
pub use landmark::{resolve_gamma, resolve_landmarks, Landmarks, DEFAULT_GAMMA, GAMMA_LIMIT};
pub use reference::{ReferenceSurface, SurfaceSample};
pub use remesh::{grade, mark_features, COLLAPSE_RATIO, SPLIT_RATIO};
pub use report::{EdgeStatistics, GradingReport, IterationStats};
pub use sizing::{assign_sizing, compute_sizing_field, resolve_normalization, Sizer, SizingField};
