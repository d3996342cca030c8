//! Criterion benchmarks for whole fits and single coordinate-ascent steps.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vbgmm_config::{FitConfig, InitMethod, Parameterization};
use vbgmm_core::data::{sample_reference_clusters, standardize};
use vbgmm_core::inference::{initializer_for, FitRun};
use vbgmm_core::VariationalGmm;

fn config(parameterization: Parameterization, k: usize, max_iter: usize) -> FitConfig {
    FitConfig {
        components: k,
        init: InitMethod::Kmeans,
        max_iter,
        parameterization,
        ..FitConfig::default()
    }
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    let x = standardize(&sample_reference_clusters(100, 2208).0).0;

    for (name, param) in [
        ("gaussian_wishart", Parameterization::GaussianWishart),
        ("corduneanu_bishop", Parameterization::CorduneanuBishop),
    ] {
        let model = VariationalGmm::new(config(param, 10, 50)).expect("valid config");
        group.bench_with_input(BenchmarkId::new("k10_50iter", name), &x, |b, x| {
            b.iter(|| black_box(model.fit(black_box(x)).expect("fit")))
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for points in [100usize, 1000] {
        let x = standardize(&sample_reference_clusters(points, 2208).0).0;
        let cfg = config(Parameterization::GaussianWishart, 10, usize::MAX);
        let init = initializer_for(cfg.init);
        group.bench_with_input(BenchmarkId::new("k10", points * 5), &x, |b, x| {
            let mut run = FitRun::initialize(x, &cfg, init.as_ref()).expect("initialize");
            b.iter(|| black_box(run.step().expect("step")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_step);
criterion_main!(benches);
