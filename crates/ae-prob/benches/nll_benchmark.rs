use ae_core::{Measurement, NllFunction};
use ae_prob::{BinomialNll, LinearVarianceNll, PoissonNll, confidence_to_delta_nll};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_nll_families(c: &mut Criterion) {
    let xs: Vec<f64> = (1..=10_000).map(|i| (i as f64) * 1e-3).collect();

    let lv = LinearVarianceNll::new(&Measurement::new(5.0, 1.5, 0.6).unwrap());
    c.bench_function("linear_variance_nll_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += lv.evaluate(x).unwrap();
            }
            black_box(acc)
        })
    });

    let p = PoissonNll::new(7.0).unwrap();
    c.bench_function("poisson_nll_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += p.evaluate(x).unwrap();
            }
            black_box(acc)
        })
    });

    let bin = BinomialNll::new(3, 17).unwrap();
    c.bench_function("binomial_nll_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += bin.evaluate(x * 0.0999).unwrap();
            }
            black_box(acc)
        })
    });
}

fn bench_confidence(c: &mut Criterion) {
    c.bench_function("confidence_to_delta_nll_dof3", |b| {
        b.iter(|| black_box(confidence_to_delta_nll(black_box(0.9), 3).unwrap()))
    });
}

criterion_group!(benches, bench_nll_families, bench_confidence);
criterion_main!(benches);
