//! Benchmarks of the PLN objective and of complete fits
//!
//! Run with: cargo bench -p plnopt

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plnopt::prelude::*;

fn problem(n: usize, p: usize, d: usize) -> (PlnData, Vec<f64>) {
    let y = Matrix::from_fn(n, p, |i, j| ((3 * i + 5 * j) % 7) as f64);
    let x = Matrix::from_fn(n, d, |i, l| if l == 0 { 1.0 } else { ((i + l) as f64).sin() });
    let o = Matrix::zeros(n, p);
    let data = PlnData::new(y, x, o, 0.0).unwrap();

    let layout = data.layout();
    let mut start = vec![0.0; layout.n_param()];
    for (k, i) in layout.m_range().enumerate() {
        start[i] = 0.1 * (k as f64).cos();
    }
    for i in layout.s_range() {
        start[i] = 0.5;
    }
    (data, start)
}

fn benchmark_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pln_objective");

    for &(n, p) in &[(20, 5), (100, 10), (500, 20)] {
        let (data, start) = problem(n, p, 3);
        let evaluator = ObjectiveEvaluator::new(&data);

        group.bench_with_input(BenchmarkId::new("value", n * p), &start, |b, x| {
            let mut ctx = EvaluationContext::new(&data);
            b.iter(|| evaluator.evaluate(black_box(x), false, &mut ctx));
        });
        group.bench_with_input(BenchmarkId::new("value_and_gradient", n * p), &start, |b, x| {
            let mut ctx = EvaluationContext::new(&data);
            b.iter(|| evaluator.evaluate(black_box(x), true, &mut ctx));
        });
    }

    group.finish();
}

fn benchmark_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pln_fit");
    group.sample_size(10);
    let (data, start) = problem(50, 5, 2);

    for name in ["LBFGS", "VAR2", "TNEWTON_PRECOND", "CCSAQ"] {
        let config = PlnConfig::new().with_algorithm(name).with_maxeval(500);
        group.bench_function(name, |b| {
            b.iter(|| {
                optimize_pln(
                    black_box(&start),
                    data.y(),
                    data.x(),
                    data.o(),
                    data.ky(),
                    &config,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_evaluation, benchmark_fit);
criterion_main!(benches);
