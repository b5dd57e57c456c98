use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use globalfit::prelude::*;
use nalgebra::DVector;
use shared_test_code::linspace;
use shared_test_code::models::{decay_model, DecayMeasurement};

/// two measurements of the same sample on the same spectral axis
fn build_problem(nnls: bool) -> GlobalProblem {
    let rates = [0.5, 2., 8.];
    let first = DecayMeasurement::new(linspace(0., 10., 256), linspace(400., 600., 64), &rates);
    let second = DecayMeasurement::new(linspace(0., 5., 128), linspace(400., 600., 64), &rates);
    GlobalProblemBuilder::new(decay_model(3, &["dataset1", "dataset2"]))
        .dataset(first.dataset("dataset1"))
        .dataset(second.dataset("dataset2"))
        .initial_parameters(DVector::from_vec(vec![0.3, 3., 6.]))
        .nnls(nnls)
        .build()
        .expect("Building valid problem should not panic")
}

fn run_fit(problem: GlobalProblem) -> DVector<f64> {
    let result = GlobalFitSolver::default()
        .fit(problem)
        .expect("fit must not fail");
    assert!(result.was_successful(), "Termination not successful");
    result.best_parameters().clone()
}

fn bench_grouped_decay_fit(c: &mut Criterion) {
    c.bench_function("grouped decays w/o noise", |bencher| {
        bencher.iter_batched(
            || build_problem(false),
            run_fit,
            BatchSize::SmallInput,
        )
    });
    c.bench_function("grouped decays w/o noise (nnls)", |bencher| {
        bencher.iter_batched(|| build_problem(true), run_fit, BatchSize::SmallInput)
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_grouped_decay_fit);
criterion_main!(benches);
