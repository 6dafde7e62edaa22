//! Property-based tests for the halfedge store.
//!
//! Random sequences of splits, collapses, flips and moves must keep the
//! store a valid manifold, whatever the individual operations decide.
//!
//! Run with: cargo test -p mesh-grading --test proptest_halfedge

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_truncation)]

use mesh_grading::{EdgeId, HalfedgeMesh, Rejection, VertexId};
use mesh_types::{primitives, IndexedMesh, MeshTopology, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Split(u32),
    Collapse(u32, bool),
    Flip(u32),
    Nudge(u32, [f64; 3]),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Split),
        (any::<u32>(), any::<bool>()).prop_map(|(e, keep)| Op::Collapse(e, keep)),
        any::<u32>().prop_map(Op::Flip),
        (any::<u32>(), prop::array::uniform3(-0.2..0.2f64)).prop_map(|(v, d)| Op::Nudge(v, d)),
    ]
}

/// Pick a live edge from an arbitrary number.
fn pick_edge(mesh: &HalfedgeMesh, n: u32) -> Option<EdgeId> {
    let edges: Vec<EdgeId> = mesh.edges().collect();
    (!edges.is_empty()).then(|| edges[n as usize % edges.len()])
}

fn pick_vertex(mesh: &HalfedgeMesh, n: u32) -> Option<VertexId> {
    let vertices: Vec<VertexId> = mesh.vertices().collect();
    (!vertices.is_empty()).then(|| vertices[n as usize % vertices.len()])
}

fn apply(mesh: &mut HalfedgeMesh, op: Op) -> Result<(), Rejection> {
    match op {
        Op::Split(n) => {
            let e = pick_edge(mesh, n).ok_or(Rejection::Removed)?;
            let p = mesh.edge_midpoint(e);
            mesh.split_edge(e, p).map(|_| ())
        }
        Op::Collapse(n, keep_first) => {
            let e = pick_edge(mesh, n).ok_or(Rejection::Removed)?;
            let (a, b) = mesh.edge_vertices(e);
            mesh.collapse_edge(e, if keep_first { a } else { b })
        }
        Op::Flip(n) => {
            let e = pick_edge(mesh, n).ok_or(Rejection::Removed)?;
            mesh.flip_edge(e)
        }
        Op::Nudge(n, [x, y, z]) => {
            let v = pick_vertex(mesh, n).ok_or(Rejection::Removed)?;
            let p = mesh.position(v) + Vector3::new(x, y, z);
            mesh.move_vertex(v, p)
        }
    }
}

fn euler(mesh: &HalfedgeMesh) -> i64 {
    mesh.vertex_count() as i64 - mesh.edge_count() as i64 + mesh.face_count() as i64
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn closed_mesh_stays_valid(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mut mesh = HalfedgeMesh::from_indexed(&primitives::icosphere(10.0, 1)).unwrap();
        for op in ops {
            let _ = apply(&mut mesh, op);
            prop_assert!(mesh.validate().is_ok(), "{:?} broke the mesh", op);
            prop_assert_eq!(euler(&mesh), 2);
        }
    }

    #[test]
    fn open_mesh_stays_valid(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mut mesh = HalfedgeMesh::from_indexed(&primitives::disc(5.0, 2, 8)).unwrap();
        let boundary_before = mesh.edges().filter(|&e| mesh.is_boundary_edge(e)).count();
        for op in ops {
            let _ = apply(&mut mesh, op);
            prop_assert!(mesh.validate().is_ok(), "{:?} broke the mesh", op);
            prop_assert_eq!(euler(&mesh), 1);
        }
        // splits may add boundary edges, collapses may remove them, but a
        // disc never loses its rim entirely
        let boundary_after = mesh.edges().filter(|&e| mesh.is_boundary_edge(e)).count();
        prop_assert!(boundary_after >= 3);
        prop_assert!(boundary_before >= 3);
    }

    #[test]
    fn export_round_trips(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut mesh = HalfedgeMesh::from_indexed(&primitives::icosphere(10.0, 1)).unwrap();
        for op in ops {
            let _ = apply(&mut mesh, op);
        }
        let exported: IndexedMesh = mesh.to_indexed();
        prop_assert_eq!(exported.vertex_count(), mesh.vertex_count());
        prop_assert_eq!(exported.face_count(), mesh.face_count());
        let rebuilt = HalfedgeMesh::from_indexed(&exported).unwrap();
        prop_assert!(rebuilt.validate().is_ok());
        prop_assert_eq!(rebuilt.edge_count(), mesh.edge_count());
    }
}
