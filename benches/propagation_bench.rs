//! Benchmarks for angular spectrum propagation and gradient passes.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use ndarray::Array2;
use photonfield::profiles::gaussian;
use photonfield::{Field, Grid, Modulator, PropagationConfig, System, Tensor};

fn gaussian_field(n: usize, pad: usize) -> Field {
    let grid = Grid::square(n, 10e-6).unwrap();
    let profile = gaussian(&grid, 200e-6).unwrap();
    Field::new(Tensor::constant(profile.into_dyn()), grid, 700e-9, 0.0)
        .unwrap()
        .with_propagation(PropagationConfig {
            pad_factor: [pad, pad],
        })
}

fn bench_propagate(c: &mut Criterion) {
    for n in [64, 128, 256] {
        let mut group = c.benchmark_group(format!("propagate_{}x{}", n, n));
        group.throughput(Throughput::Elements((n * n) as u64));
        group.sample_size(20);

        for pad in [0, 1] {
            let field = gaussian_field(n, pad);
            group.bench_function(format!("pad_{}", pad), |b| {
                b.iter(|| black_box(field.propagate(black_box(0.05)).unwrap()));
            });
        }
        group.finish();
    }
}

fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase_mask_gradient");
    group.sample_size(10);

    for n in [64, 128] {
        let field = gaussian_field(n, 0);
        let modulator = Modulator::phase(*field.grid(), Array2::zeros((n, n)), 0.0, true).unwrap();
        let system = System::new(vec![modulator.into()]);
        group.bench_function(format!("{}x{}", n, n), |b| {
            b.iter(|| {
                let loss = system
                    .measure_intensity_at_z(&field, 0.05)
                    .unwrap()
                    .sum()
                    .real();
                loss.backward().unwrap();
                for p in system.trainable_parameters() {
                    p.zero_grad();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_propagate, bench_backward);
criterion_main!(benches);
