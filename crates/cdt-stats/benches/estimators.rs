use cdt_stats::{
    autocovariance, batch_estimate, correlation_time, fit_equilibration, AutocovMode, FitOpts,
    LagSampling,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn ar_series(len: usize) -> Vec<f64> {
    let mut state = 0.0f64;
    (0..len)
        .map(|i| {
            state = 0.9 * state + ((i as f64) * 12.9898).sin();
            state
        })
        .collect()
}

fn bench_autocovariance(c: &mut Criterion) {
    let series = ar_series(10_000);
    c.bench_function("autocovariance_resolution", |b| {
        b.iter(|| {
            autocovariance(
                black_box(&series),
                2_000,
                AutocovMode::Biased,
                LagSampling::Resolution(200),
            )
            .expect("covariance")
        });
    });
    c.bench_function("batched_correlation_time", |b| {
        b.iter(|| {
            batch_estimate(black_box(&series), 10, |batch| {
                correlation_time(batch).map(|t| t as f64)
            })
            .expect("batched")
        });
    });
}

fn bench_fits(c: &mut Criterion) {
    let series: Vec<f64> = (0..2_000)
        .map(|t| 40.0 * (1.0 - (-(t as f64) / 150.0).exp()))
        .collect();
    c.bench_function("equilibration_fit", |b| {
        b.iter(|| fit_equilibration(black_box(&series), 0.1, &FitOpts::default()).expect("fit"));
    });
}

criterion_group!(benches, bench_autocovariance, bench_fits);
criterion_main!(benches);
