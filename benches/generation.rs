use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sparselife::{EngineConfig, Pattern, SparseLifeEngine};

const R_PENTOMINO: &[u8] = b"x = 3, y = 3, rule = B3/S23\nb2o$2o$bo!";

fn bench_r_pentomino(c: &mut Criterion) {
    let pattern = Pattern::from_rle(R_PENTOMINO).unwrap();
    let mut group = c.benchmark_group("r_pentomino_256_generations");
    group.throughput(Throughput::Elements(256));

    for threads in [1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let mut engine =
                        SparseLifeEngine::new(EngineConfig::default().threads(threads)).unwrap();
                    engine.load_pattern(&pattern).unwrap();
                    engine.step_n(256);
                    engine.population()
                });
            },
        );
    }
    group.finish();
}

fn bench_soup(c: &mut Criterion) {
    let soup = Pattern::random(256, 256, 0.3, Some(7));
    let mut group = c.benchmark_group("soup_256x256_64_generations");
    group.sample_size(10);
    group.throughput(Throughput::Elements(64));

    for threads in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let mut engine =
                        SparseLifeEngine::new(EngineConfig::default().threads(threads)).unwrap();
                    engine.load_pattern(&soup).unwrap();
                    engine.step_n(64);
                    engine.population()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_r_pentomino, bench_soup);
criterion_main!(benches);
