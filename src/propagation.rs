//! Angular-spectrum free-space propagation.
//!
//! The trailing two axes of the data are the spatial plane. Wavelength and
//! distance tensors broadcast against the leading (batch) axes and must
//! already carry unit axes for the plane, e.g. `[B, 1, 1]`.

use std::f64::consts::PI;

use log::debug;
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use num_complex::Complex64;

use crate::autodiff::{broadcast_shape, zip_broadcast, Tensor};
use crate::config::{Interpolation, PropagationConfig};
use crate::error::{OpticsError, OpticsResult};
use crate::grid::Grid;
use crate::interpolation::resample_plane;

/// Allowed overshoot of an output plane past the domain, in samples.
const BOUNDS_TOLERANCE: f64 = 1e-9;

/// Sample frequencies of an `n`-point DFT with sample spacing `d`,
/// in the order `[0, 1, .., (n-1)/2, -(n/2), .., -1] / (d n)`.
pub fn fftfreq(n: usize, d: f64) -> Array1<f64> {
    let scale = 1.0 / (d * n as f64);
    Array1::from_shape_fn(n, |k| {
        let k = if k <= (n - 1) / 2 {
            k as f64
        } else {
            k as f64 - n as f64
        };
        k * scale
    })
}

/// Angular-spectrum propagator configured with a padding policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularSpectrum {
    config: PropagationConfig,
}

impl AngularSpectrum {
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> PropagationConfig {
        self.config
    }

    /// Padded lattice the transform runs on.
    pub fn padded_grid(&self, grid: &Grid) -> OpticsResult<Grid> {
        let [nx, ny] = grid.shape();
        let [px, py] = self.config.pad_factor;
        Grid::new(
            [nx * (1 + 2 * px), ny * (1 + 2 * py)],
            grid.spacing(),
            grid.offset(),
        )
    }

    /// `fx^2 + fy^2` on the padded lattice.
    fn radial_frequency_squared(&self, grid: &Grid) -> OpticsResult<Array2<f64>> {
        let padded = self.padded_grid(grid)?;
        let [nx, ny] = padded.shape();
        let [dx, dy] = padded.spacing();
        let fx = fftfreq(nx, dx);
        let fy = fftfreq(ny, dy);
        Ok(Array2::from_shape_fn((nx, ny), |(i, j)| {
            fx[i] * fx[i] + fy[j] * fy[j]
        }))
    }

    /// Transfer function `H` on the padded lattice, evanescent band masked.
    pub fn transfer_function(
        &self,
        grid: &Grid,
        wavelength: &Tensor,
        distance: &Tensor,
    ) -> OpticsResult<Tensor> {
        let rho2 = Tensor::from_real(self.radial_frequency_squared(grid)?.into_dyn());
        let lambda2 = wavelength.mul(wavelength)?;
        let arg = Tensor::scalar(1.0).sub(&lambda2.mul(&rho2)?)?;
        let kz = arg.masked_sqrt();
        let phase = kz
            .mul(distance)?
            .div(wavelength)?
            .scale_real(2.0 * PI);
        let h = phase.scale(Complex64::new(0.0, 1.0)).exp();

        let arg_val = arg.value();
        let dist_val = distance.value();
        let shape = broadcast_shape(arg_val.shape(), dist_val.shape())?;
        let mask = zip_broadcast(&arg_val, &dist_val, &shape, |a, d| {
            if a.re >= 0.0 || d == Complex64::new(0.0, 0.0) {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        })?;
        h.mul(&Tensor::constant(mask))
    }

    /// Propagate `data` by `distance`, returning samples on `grid`.
    ///
    /// A distance of exactly zero everywhere returns the input values
    /// unchanged (broadcast against the distance batch); when the distance
    /// requires a gradient the result still carries `d/d(distance)` through
    /// a branch that contributes zero.
    pub fn propagate(
        &self,
        data: &Tensor,
        grid: &Grid,
        wavelength: &Tensor,
        distance: &Tensor,
    ) -> OpticsResult<Tensor> {
        let full = self.propagate_padded(data, grid, wavelength, distance)?;
        let [px, py] = self.config.pad_factor;
        if px == 0 && py == 0 {
            return Ok(full);
        }
        let [nx, ny] = grid.shape();
        full.window([px * nx, py * ny], [nx, ny])
    }

    /// Propagate `data` by `distance` and sample the result on `target`.
    ///
    /// `target` must lie inside the padded propagation domain; compatible
    /// grids skip interpolation entirely.
    pub fn propagate_onto(
        &self,
        data: &Tensor,
        grid: &Grid,
        wavelength: &Tensor,
        distance: &Tensor,
        target: &Grid,
        method: Interpolation,
    ) -> OpticsResult<Tensor> {
        if target.is_compatible(grid) {
            return self.propagate(data, grid, wavelength, distance);
        }
        let padded = self.padded_grid(grid)?;
        let [x_min, x_max, y_min, y_max] = padded.bounds();
        let [t_x_min, t_x_max, t_y_min, t_y_max] = target.bounds();
        let [dx, dy] = padded.spacing();
        let tol_x = BOUNDS_TOLERANCE * dx;
        let tol_y = BOUNDS_TOLERANCE * dy;
        if t_x_min < x_min - tol_x
            || t_x_max > x_max + tol_x
            || t_y_min < y_min - tol_y
            || t_y_max > y_max + tol_y
        {
            return Err(OpticsError::invalid(
                "grid",
                format!(
                    "output plane [{}] lies outside the propagation domain [{}]",
                    target.describe(),
                    padded.describe()
                ),
            ));
        }
        let full = self.propagate_padded(data, grid, wavelength, distance)?;
        let axis = full.ndim() - 2;
        resample_plane(&full, axis, &padded, target, method)
    }

    /// Propagation result on the whole padded lattice.
    fn propagate_padded(
        &self,
        data: &Tensor,
        grid: &Grid,
        wavelength: &Tensor,
        distance: &Tensor,
    ) -> OpticsResult<Tensor> {
        let [nx, ny] = grid.shape();
        let [px, py] = self.config.pad_factor;
        let input = if px == 0 && py == 0 {
            data.clone()
        } else {
            data.embed(self.padded_grid(grid)?.shape(), [px * nx, py * ny])?
        };

        let zero = distance.value().iter().all(|d| d.re == 0.0 && d.im == 0.0);
        if !zero {
            return self.spectral(&input, grid, wavelength, distance);
        }
        let shape = broadcast_shape(
            &broadcast_shape(&input.shape(), &distance.shape())?,
            &wavelength.shape(),
        )?;
        let input = if shape == input.shape() {
            input
        } else {
            let ones = ArrayD::from_elem(IxDyn(&shape), Complex64::new(1.0, 0.0));
            input.mul(&Tensor::constant(ones))?
        };
        if !distance.requires_grad() {
            return Ok(input);
        }
        let branch = self.spectral(&input.detach(), grid, wavelength, distance)?;
        let delta = branch.sub(&branch.detach())?;
        input.add(&delta)
    }

    /// `IFFT2(FFT2(u) H)` on data already embedded in the padded lattice.
    fn spectral(
        &self,
        input: &Tensor,
        grid: &Grid,
        wavelength: &Tensor,
        distance: &Tensor,
    ) -> OpticsResult<Tensor> {
        debug!(
            "angular spectrum on {:?} (pad {:?}), data {:?}",
            self.padded_grid(grid)?.shape(),
            self.config.pad_factor,
            input.shape()
        );
        let h = self.transfer_function(grid, wavelength, distance)?;
        input.fft2()?.mul(&h)?.ifft2()
    }
}
