//! photonfield Benchmark Suite

use photonfield::profiles::{checkerboard, gaussian};
use photonfield::{
    real_data, Element, Field, Grid, Lens, Modulator, OpticsResult, PropagationConfig, System,
};

use ndarray::Array2;
use std::time::Instant;

const WAVELENGTH: f64 = 700e-9;
const SPACING: f64 = 10e-6;

fn gaussian_field(n: usize, pad: usize) -> OpticsResult<Field> {
    let grid = Grid::square(n, SPACING)?;
    let profile = gaussian(&grid, 20.0 * SPACING)?;
    let data = photonfield::Tensor::constant(profile.into_dyn());
    Ok(Field::new(data, grid, WAVELENGTH, 0.0)?.with_propagation(PropagationConfig {
        pad_factor: [pad, pad],
    }))
}

fn benchmark_propagation() -> OpticsResult<()> {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Angular Spectrum Propagation");
    println!("{}", "=".repeat(60));

    let sizes = [64, 128, 256, 512];

    for &n in &sizes {
        for pad in [0, 1] {
            let field = gaussian_field(n, pad)?;

            // Warm up
            for _ in 0..2 {
                let _ = field.propagate(0.05);
            }

            let n_iters = if n <= 128 { 50 } else { 5 };

            let start = Instant::now();
            for _ in 0..n_iters {
                let _ = field.propagate(0.05);
            }
            let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

            let padded = n * (1 + 2 * pad);
            println!(
                "  {}x{} (pad {}, FFT {}x{}): {:.3} ms",
                n,
                n,
                pad,
                padded,
                padded,
                elapsed * 1000.0
            );
        }
    }
    Ok(())
}

fn benchmark_four_f() -> OpticsResult<()> {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: 4f System (checkerboard)");
    println!("{}", "=".repeat(60));

    let focal_length = 0.02;
    let sizes = [64, 128, 256];

    for &n in &sizes {
        let grid = Grid::square(n, SPACING)?;
        let board = checkerboard(&grid, [8.0 * SPACING, 8.0 * SPACING], [4, 4])?;
        let field = Field::new(real_data(board.into_dyn()), grid, WAVELENGTH, 0.0)?;
        let system = System::new(vec![
            Lens::new(grid, focal_length, focal_length)?.into(),
            Lens::new(grid, focal_length, 3.0 * focal_length)?.into(),
        ]);

        let n_iters = if n <= 128 { 20 } else { 3 };

        let start = Instant::now();
        for _ in 0..n_iters {
            let _ = system.measure_intensity_at_z(&field, 4.0 * focal_length);
        }
        let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

        println!("  {}x{}: {:.3} ms per image", n, n, elapsed * 1000.0);
    }
    Ok(())
}

fn benchmark_backward() -> OpticsResult<()> {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Forward + Backward (trainable phase mask)");
    println!("{}", "=".repeat(60));

    let sizes = [64, 128, 256];

    for &n in &sizes {
        let field = gaussian_field(n, 0)?;
        let grid = *field.grid();
        let modulator: Element = Modulator::phase(grid, Array2::zeros((n, n)), 0.0, true)?.into();
        let system = System::new(vec![modulator]);

        let n_iters = if n <= 128 { 20 } else { 3 };

        let start = Instant::now();
        for _ in 0..n_iters {
            let intensity = system.measure_intensity_at_z(&field, 0.05)?;
            let loss = intensity.sum().real();
            loss.backward()?;
            for p in system.trainable_parameters() {
                p.zero_grad();
            }
        }
        let elapsed = start.elapsed().as_secs_f64() / n_iters as f64;

        println!("  {}x{}: {:.3} ms per step", n, n, elapsed * 1000.0);
    }
    Ok(())
}

fn main() -> OpticsResult<()> {
    println!("\n{}", "#".repeat(60));
    println!("#  photonfield Rust Benchmark Suite");
    println!("{}", "#".repeat(60));

    benchmark_propagation()?;
    benchmark_four_f()?;
    benchmark_backward()?;

    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK COMPLETE");
    println!("{}", "=".repeat(60));
    Ok(())
}
