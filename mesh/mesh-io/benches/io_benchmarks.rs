//! Benchmarks for mesh-io operations.
//!
//! Run with: cargo bench -p mesh-io

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_io::{load_mesh, save_mesh, weld_vertices};
use mesh_types::{IndexedMesh, primitives};
use tempfile::tempdir;

/// Triangle soup of a sphere, as an STL file would deliver it.
fn unwelded(mesh: &IndexedMesh) -> IndexedMesh {
    let positions = mesh
        .faces
        .iter()
        .flat_map(|f| f.map(|i| mesh.vertices[i as usize].position))
        .collect::<Vec<_>>();
    #[allow(clippy::cast_possible_truncation)]
    let faces = (0..mesh.faces.len() as u32)
        .map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
        .collect();
    IndexedMesh::from_positions(positions, faces)
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("roundtrip");
    let Ok(dir) = tempdir() else {
        return;
    };

    for subdivisions in [3u32, 5] {
        let sphere = primitives::icosphere(90.0, subdivisions);
        group.throughput(Throughput::Elements(sphere.faces.len() as u64));
        for ext in ["stl", "ply", "obj"] {
            let path = dir.path().join(format!("sphere_{subdivisions}.{ext}"));
            group.bench_with_input(
                BenchmarkId::new(ext, subdivisions),
                &sphere,
                |b, mesh| {
                    b.iter(|| {
                        save_mesh(black_box(mesh), &path).ok();
                        load_mesh(&path).ok()
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_weld(c: &mut Criterion) {
    let soup = unwelded(&primitives::icosphere(90.0, 5));
    c.bench_function("weld_icosphere_5", |b| {
        b.iter(|| {
            let mut mesh = soup.clone();
            weld_vertices(black_box(&mut mesh))
        });
    });
}

criterion_group!(benches, bench_roundtrip, bench_weld);
criterion_main!(benches);
