use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use regsplat::container::regionfield::Regionfield;
use regsplat::generator::{
    DiamondSquare, GenerateInfo, RegionfieldGenerator, Uniform, Voronoi,
};
use regsplat::types::Dim2;

fn criterion_benchmark(c: &mut Criterion) {
    let uniform = Uniform;
    let voronoi = Voronoi { centroid_count: 64 };
    let diamond_square = DiamondSquare {
        initial_extent: Dim2::splat(3),
        iteration: vec![1; 7],
    };
    let generators: [&dyn RegionfieldGenerator; 3] = [&uniform, &voronoi, &diamond_square];

    let info = GenerateInfo { seed: 42 };
    let mut group = c.benchmark_group("generator");
    for generator in generators {
        group.bench_with_input(
            BenchmarkId::from_parameter(generator.name()),
            &generator,
            |b, generator| {
                let mut regionfield = Regionfield::new();
                regionfield.resize(Dim2::splat(257)).unwrap();
                regionfield.region_count = 16;
                b.iter(|| generator.generate(&mut regionfield, &info).unwrap());
            },
        );
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
