//! Sinc, gratings and phase profiles.
//!
//! Phase profiles return radians; wrap them with `exp(i phi)` (for example
//! through [`crate::elements::Modulator::phase`]) to use them as masks.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};

use crate::error::{ensure_finite, ensure_positive, OpticsError, OpticsResult};
use crate::grid::Grid;

fn normalized_sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// `sinc(x / a) * sinc(y / b)` with the normalized sinc.
pub fn sinc(grid: &Grid, scale: [f64; 2]) -> OpticsResult<Array2<f64>> {
    ensure_positive("scale", scale[0])?;
    ensure_positive("scale", scale[1])?;
    let (x, y) = grid.meshgrid();
    Ok(Zip::from(&x)
        .and(&y)
        .map_collect(|&x, &y| normalized_sinc(x / scale[0]) * normalized_sinc(y / scale[1])))
}

/// Airy disk `(2 J₁(r/a) / (r/a))²`, equal to 1 at the centre.
pub fn airy(grid: &Grid, scale: f64) -> OpticsResult<Array2<f64>> {
    ensure_positive("scale", scale)?;
    let (x, y) = grid.meshgrid();
    Ok(Zip::from(&x).and(&y).map_collect(|&x, &y| {
        let u = x.hypot(y) / scale;
        if u == 0.0 {
            1.0
        } else {
            (2.0 * libm::j1(u) / u).powi(2)
        }
    }))
}

/// Coordinate along the grating vector, in periods.
fn grating_phase(grid: &Grid, period: f64, angle: f64) -> OpticsResult<Array2<f64>> {
    ensure_positive("period", period)?;
    ensure_finite("angle", angle)?;
    let (x, y) = grid.meshgrid();
    let (s, c) = angle.sin_cos();
    Ok(Zip::from(&x)
        .and(&y)
        .map_collect(|&x, &y| (x * c + y * s) / period))
}

/// Square-wave grating: `height` where the fractional period is below
/// `duty_cycle`, 0 elsewhere.
pub fn binary_grating(
    grid: &Grid,
    period: f64,
    angle: f64,
    height: f64,
    duty_cycle: f64,
) -> OpticsResult<Array2<f64>> {
    if !(0.0..=1.0).contains(&duty_cycle) {
        return Err(OpticsError::invalid(
            "duty_cycle",
            format!("must lie in [0, 1], got {}", duty_cycle),
        ));
    }
    Ok(grating_phase(grid, period, angle)?
        .mapv(|u| if u - u.floor() < duty_cycle { height } else { 0.0 }))
}

/// Sawtooth grating rising from 0 to `height` over each period.
pub fn blazed_grating(grid: &Grid, period: f64, angle: f64, height: f64) -> OpticsResult<Array2<f64>> {
    Ok(grating_phase(grid, period, angle)?.mapv(|u| height * (u - u.floor())))
}

/// `height / 2 * (1 + cos(2 pi u))`.
pub fn sinusoidal_grating(grid: &Grid, period: f64, angle: f64, height: f64) -> OpticsResult<Array2<f64>> {
    Ok(grating_phase(grid, period, angle)?.mapv(|u| height / 2.0 * (1.0 + (2.0 * PI * u).cos())))
}

/// Thin-lens phase `-pi r^2 / (lambda f)`.
pub fn lens_phase(grid: &Grid, focal_length: f64, wavelength: f64) -> OpticsResult<Array2<f64>> {
    ensure_finite("focal_length", focal_length)?;
    if focal_length == 0.0 {
        return Err(OpticsError::invalid("focal_length", "must be nonzero"));
    }
    ensure_positive("wavelength", wavelength)?;
    Ok(grid
        .radius_squared()
        .mapv(|r2| -PI * r2 / (wavelength * focal_length)))
}

/// Phase of a plane wave with polar angle `theta` and azimuth `phi`.
pub fn plane_wave_phase(grid: &Grid, theta: f64, phi: f64, wavelength: f64) -> OpticsResult<Array2<f64>> {
    ensure_finite("theta", theta)?;
    ensure_finite("phi", phi)?;
    ensure_positive("wavelength", wavelength)?;
    let k = 2.0 * PI / wavelength;
    let (kx, ky) = (k * theta.sin() * phi.cos(), k * theta.sin() * phi.sin());
    let (x, y) = grid.meshgrid();
    Ok(Zip::from(&x).and(&y).map_collect(|&x, &y| kx * x + ky * y))
}

/// Phase of a spherical wave from a point at axial distance `distance`;
/// negative distances converge.
pub fn spherical_wave_phase(grid: &Grid, distance: f64, wavelength: f64) -> OpticsResult<Array2<f64>> {
    ensure_finite("distance", distance)?;
    if distance == 0.0 {
        return Err(OpticsError::invalid("distance", "must be nonzero"));
    }
    ensure_positive("wavelength", wavelength)?;
    let k = 2.0 * PI / wavelength;
    Ok(grid
        .radius_squared()
        .mapv(|r2| distance.signum() * k * (r2 + distance * distance).sqrt()))
}

/// Uniform random phase in `[0, 2 pi)`, reproducible for a given seed.
pub fn random_phase(grid: &Grid, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(0.0, 2.0 * PI);
    let [nx, ny] = grid.shape();
    Array2::from_shape_simple_fn((nx, ny), || dist.sample(&mut rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sinc_peak_and_zeros() {
        let grid = Grid::square(5, 1.0).unwrap();
        let s = sinc(&grid, [2.0, 1.0]).unwrap();
        assert_abs_diff_eq!(s[[2, 2]], 1.0);
        // x = 2 is the first zero for a = 2
        assert_abs_diff_eq!(s[[4, 2]], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(s[[3, 2]], 2.0 / PI, epsilon = 1e-12);
    }

    #[test]
    fn test_airy_peak_and_first_zero() {
        let grid = Grid::square(3, 1.0).unwrap();
        let a = airy(&grid, 1.0).unwrap();
        assert_abs_diff_eq!(a[[1, 1]], 1.0);
        assert_abs_diff_eq!(a[[2, 1]], 0.774_578_072_057_836_5, epsilon = 1e-10);
        assert_abs_diff_eq!(a[[1, 0]], a[[2, 1]], epsilon = 1e-15);

        // first zero of J₁ at 3.8317
        let a = airy(&Grid::square(5, 1.0).unwrap(), 2.0 / 3.831_705_970_207_512).unwrap();
        assert_abs_diff_eq!(a[[4, 2]], 0.0, epsilon = 1e-12);
        assert!(airy(&grid, 0.0).is_err());
    }

    #[test]
    fn test_gratings() {
        let grid = Grid::new([4, 1], [0.25, 1.0], [0.375, 0.0]).unwrap();
        // x = 0, 0.25, 0.5, 0.75
        let binary = binary_grating(&grid, 1.0, 0.0, 2.0, 0.5).unwrap();
        assert_eq!(binary.column(0).to_vec(), vec![2.0, 2.0, 0.0, 0.0]);
        let blazed = blazed_grating(&grid, 1.0, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(blazed[[2, 0]], 0.5, epsilon = 1e-12);
        let sine = sinusoidal_grating(&grid, 1.0, 0.0, 1.0).unwrap();
        assert_abs_diff_eq!(sine[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sine[[2, 0]], 0.0, epsilon = 1e-12);
        assert!(binary_grating(&grid, 1.0, 0.0, 1.0, 1.5).is_err());
    }

    #[test]
    fn test_phase_profiles() {
        let grid = Grid::square(3, 1e-3).unwrap();
        let lens = lens_phase(&grid, 0.5, 1e-6).unwrap();
        assert_abs_diff_eq!(lens[[1, 1]], 0.0);
        assert_abs_diff_eq!(lens[[2, 1]], -PI * 1e-6 / (1e-6 * 0.5), epsilon = 1e-9);
        assert!(lens_phase(&grid, 0.0, 1e-6).is_err());

        let tilt = plane_wave_phase(&grid, 0.01, 0.0, 1e-6).unwrap();
        assert_abs_diff_eq!(tilt[[2, 0]] - tilt[[1, 0]], 2.0 * PI / 1e-6 * 0.01f64.sin() * 1e-3, epsilon = 1e-9);

        let sphere = spherical_wave_phase(&grid, -0.1, 1e-6).unwrap();
        assert!(sphere[[1, 1]] < 0.0);
    }

    #[test]
    fn test_random_phase_is_seeded() {
        let grid = Grid::square(16, 1.0).unwrap();
        let a = random_phase(&grid, 7);
        assert_eq!(a, random_phase(&grid, 7));
        assert_ne!(a, random_phase(&grid, 8));
        assert!(a.iter().all(|&p| (0.0..2.0 * PI).contains(&p)));
    }
}
