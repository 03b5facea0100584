use criterion::{Criterion, criterion_group, criterion_main};
use itertools::Itertools;
use ndarray::Array1;
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::Rng;
use spherometry::Spherometer;

fn polar_rows() -> Vec<Vec<String>> {
    let mut rng = rand::rng();
    [24, 18, 12, 6]
        .into_iter()
        .map(|slots| {
            let offset: f64 = rng.random_range(-0.002..0.002);
            Array1::random(slots, Uniform::new(0.074, 0.078))
                .iter()
                .map(|sag| format!("{:.4}", sag + offset))
                .collect_vec()
        })
        .collect_vec()
}

fn process_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("process");
    group.sample_size(10);

    let rows = polar_rows();
    let spherometer = Spherometer::<f64, _>::polar(vec![11.875, 8.5, 5.25, 2.]);
    group.bench_function("polar blocking", |b| {
        b.iter(|| spherometer.process_rows(&rows))
    });
    group.bench_function("polar parallel", |b| {
        b.iter(|| spherometer.process_rows_par(&rows))
    });

    let rows = vec![
        Array1::random(100, Uniform::new(0.074, 0.078))
            .iter()
            .map(|sag| format!("{sag:.4}"))
            .collect_vec(),
    ];
    let spherometer = Spherometer::<f64, _>::grid(3., 10);
    group.bench_function("grid blocking", |b| {
        b.iter(|| spherometer.process_rows(&rows))
    });
    group.bench_function("grid parallel", |b| {
        b.iter(|| spherometer.process_rows_par(&rows))
    });
}

criterion_group!(benches, process_benchmark);
criterion_main!(benches);
