//! Gaussian beam modes normalized to unit power.

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{ensure_positive, OpticsError, OpticsResult};
use crate::grid::Grid;

/// Physicists' Hermite polynomial `H_n(x)`.
pub fn hermite(n: usize, x: f64) -> f64 {
    let (mut prev, mut cur) = (1.0, 2.0 * x);
    if n == 0 {
        return prev;
    }
    for k in 1..n {
        let next = 2.0 * x * cur - 2.0 * k as f64 * prev;
        prev = cur;
        cur = next;
    }
    cur
}

/// Generalized Laguerre polynomial `L_p^alpha(x)`.
pub fn laguerre(p: usize, alpha: f64, x: f64) -> f64 {
    let (mut prev, mut cur) = (1.0, 1.0 + alpha - x);
    if p == 0 {
        return prev;
    }
    for k in 1..p {
        let k = k as f64;
        let next = ((2.0 * k + 1.0 + alpha - x) * cur - (k + alpha) * prev) / (k + 1.0);
        prev = cur;
        cur = next;
    }
    cur
}

pub(crate) fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn mode_index(name: &'static str, value: i32) -> OpticsResult<usize> {
    usize::try_from(value)
        .map_err(|_| OpticsError::invalid(name, format!("must be non-negative, got {}", value)))
}

/// Fundamental Gaussian `TEM00` with waist `w0`.
pub fn gaussian(grid: &Grid, waist: f64) -> OpticsResult<Array2<Complex64>> {
    hermite_gaussian(grid, 0, 0, waist)
}

/// Hermite-Gaussian mode `HG_mn` at its waist.
pub fn hermite_gaussian(grid: &Grid, m: i32, n: i32, waist: f64) -> OpticsResult<Array2<Complex64>> {
    ensure_positive("waist", waist)?;
    let m = mode_index("m", m)?;
    let n = mode_index("n", n)?;
    let norm = (2.0 / PI).sqrt()
        / waist
        / (2f64.powi((m + n) as i32) * factorial(m) * factorial(n)).sqrt();
    let (x, y) = grid.meshgrid();
    let scale = 2f64.sqrt() / waist;
    Ok(ndarray::Zip::from(&x).and(&y).map_collect(|&x, &y| {
        let envelope = (-(x * x + y * y) / (waist * waist)).exp();
        Complex64::new(
            norm * hermite(m, scale * x) * hermite(n, scale * y) * envelope,
            0.0,
        )
    }))
}

/// Laguerre-Gaussian mode `LG_pl` at its waist, carrying `exp(i l phi)`.
pub fn laguerre_gaussian(grid: &Grid, p: i32, l: i32, waist: f64) -> OpticsResult<Array2<Complex64>> {
    ensure_positive("waist", waist)?;
    let p = mode_index("p", p)?;
    let abs_l = l.unsigned_abs() as usize;
    let norm = (2.0 * factorial(p) / (PI * factorial(p + abs_l))).sqrt() / waist;
    let (x, y) = grid.meshgrid();
    Ok(ndarray::Zip::from(&x).and(&y).map_collect(|&x, &y| {
        let r2 = x * x + y * y;
        let rho = (2.0 * r2).sqrt() / waist;
        let radial = norm
            * rho.powi(abs_l as i32)
            * laguerre(p, abs_l as f64, 2.0 * r2 / (waist * waist))
            * (-r2 / (waist * waist)).exp();
        Complex64::from_polar(radial, l as f64 * y.atan2(x))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn power(grid: &Grid, mode: &Array2<Complex64>) -> f64 {
        mode.iter().map(|v| v.norm_sqr()).sum::<f64>() * grid.cell_area()
    }

    #[test]
    fn test_polynomials() {
        assert_abs_diff_eq!(hermite(3, 0.5), 8.0 * 0.125 - 12.0 * 0.5);
        assert_abs_diff_eq!(laguerre(2, 1.0, 0.5), 0.5 * 0.25 - 3.0 * 0.5 + 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(factorial(5), 120.0);
    }

    #[test]
    fn test_modes_have_unit_power() {
        let grid = Grid::square(128, 0.1).unwrap();
        for (m, n) in [(0, 0), (1, 0), (2, 3)] {
            let mode = hermite_gaussian(&grid, m, n, 1.5).unwrap();
            assert_abs_diff_eq!(power(&grid, &mode), 1.0, epsilon = 1e-6);
        }
        for (p, l) in [(0, 1), (1, -2), (2, 0)] {
            let mode = laguerre_gaussian(&grid, p, l, 1.5).unwrap();
            assert_abs_diff_eq!(power(&grid, &mode), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_modes_are_orthogonal() {
        let grid = Grid::square(128, 0.1).unwrap();
        let a = hermite_gaussian(&grid, 1, 0, 1.5).unwrap();
        let b = hermite_gaussian(&grid, 0, 1, 1.5).unwrap();
        let overlap: Complex64 = a.iter().zip(b.iter()).map(|(u, v)| u.conj() * v).sum();
        assert!(overlap.norm() < 1e-10);
    }

    #[test]
    fn test_invalid_parameters() {
        let grid = Grid::square(8, 1.0).unwrap();
        assert!(matches!(
            gaussian(&grid, 0.0),
            Err(OpticsError::InvalidParameter { name: "waist", .. })
        ));
        assert!(matches!(
            hermite_gaussian(&grid, -1, 0, 1.0),
            Err(OpticsError::InvalidParameter { name: "m", .. })
        ));
        assert!(laguerre_gaussian(&grid, -2, 1, 1.0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let grid = Grid::square(16, 0.5).unwrap();
        assert_eq!(
            laguerre_gaussian(&grid, 1, 2, 2.0).unwrap(),
            laguerre_gaussian(&grid, 1, 2, 2.0).unwrap()
        );
    }
}
