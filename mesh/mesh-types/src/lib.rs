//! Core mesh types for HRTF mesh grading.
//!
//! This crate provides the foundational types shared by the I/O layer, the
//! grading engine and the command-line tool:
//!
//! - [`Vertex`] - A point in 3D space with an optional normal
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with closest-point queries
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`primitives`] - Procedural test surfaces (icosphere, disc, tube)
//!
//! # Units
//!
//! All coordinates are `f64` millimeters.
//!
//! # Coordinate System
//!
//! Uses a **right-handed coordinate system** with the head centered at the
//! origin:
//! - X: width (left/right), left ear on the negative side
//! - Y: depth (front/back)
//! - Z: height (up/down)
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside**.
//!
//! # Example
//!
//! ```
//! use mesh_types::{Vertex, IndexedMesh, Point3, MeshTopology};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::new(Point3::new(0.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(1.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(0.5, 1.0, 0.0)));
//! mesh.faces.push([0, 1, 2]);
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(!mesh.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
pub mod primitives;
mod traits;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::IndexedMesh;
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::{ClosestPoint, Triangle};
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
