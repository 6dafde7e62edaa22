//! Error types for mesh grading.

use thiserror::Error;

/// Errors that abort a grading run.
///
/// Configuration and input errors are reported before the mesh is touched.
#[derive(Debug, Error)]
pub enum GradingError {
    /// Minimum edge length is not positive.
    #[error("Invalid minimum edge length: {0} (must be > 0)")]
    InvalidMinLength(f64),

    /// Maximum edge length is below the minimum.
    #[error("Invalid edge length range: min {min} > max {max}")]
    InvalidLengthRange {
        /// Requested minimum edge length.
        min: f64,
        /// Requested maximum edge length.
        max: f64,
    },

    /// Distance normalization is negative or not finite.
    #[error("Invalid distance normalization: {0} (must be >= 0, 0 derives it from the mesh)")]
    InvalidNormalization(f64),

    /// Iteration count is zero.
    #[error("Invalid iteration count: {0} (must be >= 1)")]
    InvalidIterations(u32),

    /// Relaxation factor outside `(0, 1]`.
    #[error("Invalid relaxation factor: {0} (must be in (0, 1])")]
    InvalidRelaxationFactor(f64),

    /// Unrecognized grading mode name.
    #[error("Unknown grading mode '{0}' (expected 'hybrid' or 'distance')")]
    UnknownMode(String),

    /// Unrecognized ear side name.
    #[error("Unknown side '{0}' (expected 'left', 'right' or 'none')")]
    UnknownSide(String),

    /// Mesh has no vertices.
    #[error("Mesh has no vertices")]
    EmptyMesh,

    /// Mesh has no faces.
    #[error("Mesh has no faces")]
    NoFaces,

    /// A face references a vertex that does not exist.
    #[error("Face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    InvalidFaceIndex {
        /// Face index.
        face: usize,
        /// Offending vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// A vertex position has a NaN or infinite coordinate.
    #[error("Vertex {index} has a non-finite position ({x}, {y}, {z})")]
    NonFiniteVertex {
        /// Vertex index.
        index: usize,
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
    },

    /// Mesh is not a 2-manifold.
    #[error("Mesh contains non-manifold geometry: {reason}")]
    NonManifold {
        /// What was found.
        reason: String,
    },

    /// Internal connectivity is inconsistent.
    #[error("Halfedge connectivity is inconsistent: {0}")]
    InvalidTopology(String),
}

/// Result type for grading operations.
pub type GradingResult<T> = std::result::Result<T, GradingError>;

/// Reason a mesh mutation was refused.
///
/// Rejections are expected during remeshing: the operation is skipped and
/// counted, the mesh is left as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Rejection {
    /// The element was removed by an earlier operation.
    #[error("element was removed")]
    Removed,

    /// Boundary edges cannot be flipped.
    #[error("edge is on the boundary")]
    BoundaryEdge,

    /// The vertex to keep is not an endpoint of the edge.
    #[error("vertex is not an endpoint of the edge")]
    NotEndpoint,

    /// The endpoints share a neighbor other than the two opposite vertices.
    #[error("collapse violates the link condition")]
    LinkCondition,

    /// An interior edge joins two boundary vertices.
    #[error("collapse would join two boundary vertices through the interior")]
    BoundaryBridge,

    /// Both remaining edges of an adjacent face are on the boundary.
    #[error("collapse would remove an ear of the boundary")]
    BoundaryFan,

    /// The flipped edge already exists.
    #[error("flipped edge already exists")]
    ExistingEdge,

    /// The result would contain a degenerate face or vertex.
    #[error("operation would create a degenerate element")]
    Degenerate,

    /// The survivor would get an edge above the split threshold.
    #[error("collapse would create a long edge")]
    LongEdge,

    /// A face would turn over.
    #[error("operation would flip a face")]
    FoldOver,

    /// Topology or feature rules forbid the operation.
    #[error("vertex is locked")]
    Locked,
}
