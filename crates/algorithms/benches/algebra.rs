//! Benchmarks for suitability scoring and the composite index

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use riverhsi_algorithms::algebra::{combine, CombineMethod};
use riverhsi_algorithms::curve::{interpolate, SuitabilityCurve};
use riverhsi_algorithms::suitability::build_suitability_raster;
use riverhsi_core::{GeoTransform, Raster};

fn create_layer(size: usize, scale: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    for row in 0..size {
        for col in 0..size {
            let v = scale * ((row * 7 + col * 13) % 100) as f64 / 100.0;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn trout_curve() -> SuitabilityCurve {
    SuitabilityCurve::from_points(&[
        (0.0, 0.0),
        (0.1, 0.35),
        (0.4, 1.0),
        (0.9, 0.7),
        (1.5, 0.1),
        (2.0, 0.0),
    ])
    .unwrap()
}

fn bench_interpolate(c: &mut Criterion) {
    let curve = trout_curve();
    let mut group = c.benchmark_group("curve/interpolate");
    for n in [1_000, 100_000, 1_000_000] {
        let queries: Vec<f64> = (0..n).map(|i| (i % 2500) as f64 / 1000.0 - 0.25).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| interpolate(black_box(&curve), black_box(&queries)))
        });
    }
    group.finish();
}

fn bench_suitability_raster(c: &mut Criterion) {
    let curve = trout_curve();
    let mut group = c.benchmark_group("suitability/build");
    for size in [256, 512, 1024] {
        let depth = create_layer(size, 2.0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| build_suitability_raster(black_box(&depth), black_box(&curve)).unwrap())
        });
    }
    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra/combine");
    for size in [256, 512, 1024] {
        let layers = vec![create_layer(size, 1.0), create_layer(size, 0.8), create_layer(size, 0.6)];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| combine(black_box(&layers), CombineMethod::GeometricMean).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_interpolate, bench_suitability_raster, bench_combine);
criterion_main!(benches);
