//! Cross-format round trips on the surfaces the grading tool works with.
//!
//! Every format must preserve connectivity exactly, so that a mesh saved by
//! one tool and loaded by the next is still the same manifold.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mesh_io::{MeshFormat, load_mesh, save_mesh, save_mesh_with};
use mesh_types::{IndexedMesh, MeshTopology, primitives};
use tempfile::tempdir;

fn surfaces() -> Vec<(&'static str, IndexedMesh)> {
    vec![
        ("sphere", primitives::icosphere(85.0, 3)),
        ("disc", primitives::disc(40.0, 5, 24)),
        ("tube", primitives::tube(10.0, 30.0, 4, 16)),
    ]
}

fn assert_same_shape(a: &IndexedMesh, b: &IndexedMesh, tolerance: f64) {
    assert_eq!(a.vertex_count(), b.vertex_count());
    assert_eq!(a.face_count(), b.face_count());
    assert_eq!(a.unique_edges().len(), b.unique_edges().len());
    let area_a = a.surface_area();
    let area_b = b.surface_area();
    assert!(
        (area_a - area_b).abs() <= tolerance * area_a,
        "area changed from {area_a} to {area_b}"
    );
}

#[test]
fn every_format_preserves_connectivity() {
    let dir = tempdir().unwrap();
    for (name, mesh) in surfaces() {
        for format in [MeshFormat::Stl, MeshFormat::Ply, MeshFormat::Obj] {
            for binary in [true, false] {
                let path = dir
                    .path()
                    .join(format!("{name}_{binary}.{}", format.extension()));
                save_mesh_with(&mesh, &path, binary).unwrap();
                let loaded = load_mesh(&path).unwrap();
                // STL stores f32 coordinates
                assert_same_shape(&mesh, &loaded, 1e-5);
            }
        }
    }
}

#[test]
fn chained_conversion_keeps_topology() {
    let dir = tempdir().unwrap();
    let original = primitives::icosphere(70.0, 2);

    let stl = dir.path().join("head.stl");
    let ply = dir.path().join("head.ply");
    let obj = dir.path().join("head.obj");

    save_mesh(&original, &stl).unwrap();
    let from_stl = load_mesh(&stl).unwrap();
    save_mesh(&from_stl, &ply).unwrap();
    let from_ply = load_mesh(&ply).unwrap();
    save_mesh(&from_ply, &obj).unwrap();
    let from_obj = load_mesh(&obj).unwrap();

    assert_same_shape(&from_ply, &from_obj, 1e-12);
    assert_same_shape(&original, &from_obj, 1e-5);
}

#[test]
fn missing_file_is_reported_with_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.ply");
    let err = load_mesh(&path).unwrap_err();
    assert!(err.to_string().contains("absent.ply"));
}
