//! Benchmark for LOD mesh generation.
//!
//! TARGET: a full 4-level chain for a 129x129 cell in under 10 ms
//!
//! Run with: cargo bench --package strata_terrain --bench lod_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_terrain::{Edge, HeightField, LodGenerator, LodMesh, LodSettings, PerlinNoise, Ray, TerrainSeed};
use glam::Vec3;

fn hilly(size: u32) -> HeightField {
    let mut hf = HeightField::new(size, size).expect("valid size");
    hf.generate_octaves(&PerlinNoise::new(TerrainSeed::new(42)), 0.0, 0.0, 0.02, 40.0, 4, 0.5);
    hf
}

fn benchmark_single_mesh(c: &mut Criterion) {
    let hf = hilly(129);
    let mut group = c.benchmark_group("lod_mesh");

    for n in [17u32, 33, 65, 129] {
        group.throughput(Throughput::Elements(u64::from(n * n)));
        group.bench_function(format!("generate_{n}x{n}"), |b| {
            let mut mesh = LodMesh::new(0, 128, 128, n, n).expect("valid grid");
            b.iter(|| {
                mesh.generate(black_box(&hf));
                black_box(mesh.normals().len())
            });
        });
    }

    group.finish();
}

fn benchmark_lod_chain(c: &mut Criterion) {
    let hf = hilly(129);
    let generator = LodGenerator::new(LodSettings::standard(128)).expect("pool");

    c.bench_function("lod_chain_4_levels_129", |b| {
        b.iter(|| black_box(generator.generate(black_box(&hf), 128, 128).expect("valid chain")));
    });
}

fn benchmark_seams(c: &mut Criterion) {
    let west_hf = hilly(129);
    let mut east_hf = HeightField::new(129, 129).expect("valid size");
    east_hf.generate_octaves(&PerlinNoise::new(TerrainSeed::new(42)), 128.0, 0.0, 0.02, 40.0, 4, 0.5);

    let mut west = LodMesh::new(0, 128, 128, 129, 129).expect("valid grid");
    let mut east = west.clone();
    west.generate(&west_hf);
    east.generate(&east_hf);

    c.bench_function("fuse_and_average_edge_129", |b| {
        b.iter(|| {
            west.fuse_edge(Edge::East, &mut east).expect("same dims");
            west.average_edge(Edge::East, &mut east).expect("same dims");
        });
    });
}

fn benchmark_ray_pick(c: &mut Criterion) {
    let mut mesh = LodMesh::new(0, 128, 128, 65, 65).expect("valid grid");
    mesh.generate(&hilly(129));
    let ray = Ray::new(Vec3::new(20.0, 200.0, 30.0), Vec3::new(0.3, -1.0, 0.2).normalize());

    c.bench_function("intersect_ray_65x65", |b| {
        b.iter(|| black_box(mesh.intersect_ray(black_box(&ray))));
    });
}

criterion_group!(
    benches,
    benchmark_single_mesh,
    benchmark_lod_chain,
    benchmark_seams,
    benchmark_ray_pick,
);

criterion_main!(benches);
