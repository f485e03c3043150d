//! Schell-model mutual coherence functions and their coherent modes.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, Array3, ArrayD, IxDyn};
use num_complex::Complex64;

use super::hermite_gaussian::{factorial, hermite};
use crate::error::{ensure_positive, OpticsError, OpticsResult};
use crate::grid::Grid;

/// `Γ(r1, r2) = sqrt(I(r1) I(r2)) μ(r1 - r2)`, shape `[Nx, Ny, Nx, Ny]`.
pub fn schell_model(
    grid: &Grid,
    intensity: impl Fn(f64, f64) -> f64,
    coherence: impl Fn(f64, f64) -> f64,
) -> ArrayD<Complex64> {
    let (x, y) = grid.meshgrid();
    let amplitude = ndarray::Zip::from(&x)
        .and(&y)
        .map_collect(|&x, &y| intensity(x, y).max(0.0).sqrt());
    let [nx, ny] = grid.shape();
    ArrayD::from_shape_fn(IxDyn(&[nx, ny, nx, ny]), |idx| {
        let (i1, j1, i2, j2) = (idx[0], idx[1], idx[2], idx[3]);
        let mu = coherence(x[[i1, j1]] - x[[i2, j2]], y[[i1, j1]] - y[[i2, j2]]);
        Complex64::new(amplitude[[i1, j1]] * amplitude[[i2, j2]] * mu, 0.0)
    })
}

/// Gaussian Schell-model source: intensity `2/(pi w^2) exp(-2 r^2 / w^2)`,
/// coherence `exp(-|r1 - r2|^2 / (2 sigma^2))`. A coherence width of zero
/// gives a delta-correlated source.
pub fn gaussian_schell_model(grid: &Grid, waist: f64, coherence_width: f64) -> OpticsResult<ArrayD<Complex64>> {
    ensure_positive("waist", waist)?;
    if !(coherence_width.is_finite() && coherence_width >= 0.0) {
        return Err(OpticsError::invalid(
            "coherence_width",
            format!("must be finite and non-negative, got {}", coherence_width),
        ));
    }
    let intensity = |x: f64, y: f64| 2.0 / (PI * waist * waist) * (-2.0 * (x * x + y * y) / (waist * waist)).exp();
    if coherence_width == 0.0 {
        return Ok(schell_model(grid, intensity, |dx, dy| {
            if dx == 0.0 && dy == 0.0 {
                1.0
            } else {
                0.0
            }
        }));
    }
    let two_sigma2 = 2.0 * coherence_width * coherence_width;
    Ok(schell_model(grid, intensity, |dx, dy| (-(dx * dx + dy * dy) / two_sigma2).exp()))
}

/// Coherent modes of a Gaussian Schell-model source.
#[derive(Debug, Clone)]
pub struct SchellModes {
    /// `[M, Nx, Ny]`
    pub modes: Array3<Complex64>,
    /// `[M]`, non-increasing
    pub weights: Array1<f64>,
    /// Hermite-Gauss orders `(m, n)` of each mode.
    pub orders: Vec<(usize, usize)>,
}

/// Analytic coherent-mode expansion of [`gaussian_schell_model`], keeping
/// the `max_modes` largest weights.
pub fn gaussian_schell_modes(
    grid: &Grid,
    waist: f64,
    coherence_width: f64,
    max_modes: usize,
) -> OpticsResult<SchellModes> {
    ensure_positive("waist", waist)?;
    ensure_positive("coherence_width", coherence_width)?;
    if max_modes == 0 {
        return Err(OpticsError::invalid("max_modes", "must be positive"));
    }
    let a = 1.0 / (waist * waist);
    let b = 1.0 / (2.0 * coherence_width * coherence_width);
    let c = (a * a + 2.0 * a * b).sqrt();
    let ratio = b / (a + b + c);
    let prefactor = 2.0 / (PI * waist * waist) * PI / (a + b + c);

    // weights fall with m + n, so the first `max_modes` by total order win
    let orders: Vec<(usize, usize)> = (0..max_modes)
        .flat_map(|total| (0..=total).map(move |m| (m, total - m)))
        .take(max_modes)
        .collect();

    let mode_1d = |n: usize, x: f64| {
        (2.0 * c / PI).powf(0.25) / (2f64.powi(n as i32) * factorial(n)).sqrt()
            * hermite(n, x * (2.0 * c).sqrt())
            * (-c * x * x).exp()
    };
    let xs = grid.x_coords();
    let ys = grid.y_coords();
    let [nx, ny] = grid.shape();
    let mut modes = Array3::zeros((orders.len(), nx, ny));
    for (k, &(m, n)) in orders.iter().enumerate() {
        let ex = xs.mapv(|x| mode_1d(m, x));
        let ey = ys.mapv(|y| mode_1d(n, y));
        let plane = Array2::from_shape_fn((nx, ny), |(i, j)| Complex64::new(ex[i] * ey[j], 0.0));
        modes.index_axis_mut(ndarray::Axis(0), k).assign(&plane);
    }
    let weights = orders
        .iter()
        .map(|&(m, n)| prefactor * ratio.powi((m + n) as i32))
        .collect();
    Ok(SchellModes {
        modes,
        weights,
        orders,
    })
}
