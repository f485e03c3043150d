//! Multi-wavelength channel plans.
//!
//! A [`ChannelPlan`] lays out channels on an equally spaced frequency grid
//! and turns them into a batched wavelength tensor, so one field can carry
//! every channel through a system at once.

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use num_complex::Complex64;

use crate::autodiff::Tensor;
use crate::error::{ensure_positive, OpticsError, OpticsResult};
use crate::field::Field;
use crate::grid::Grid;

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPlan {
    pub n_channels: usize,
    /// Metres.
    pub center_wavelength: f64,
    pub channel_spacing_ghz: f64,
    /// Metres, ordered by increasing frequency.
    pub wavelengths: Vec<f64>,
    /// Relative channel powers.
    pub powers: Vec<f64>,
}

impl ChannelPlan {
    /// Create new plan of `n_channels` equal-power channels centred on
    /// `center_wavelength`.
    pub fn new(n_channels: usize, center_wavelength: f64, channel_spacing_ghz: f64) -> OpticsResult<Self> {
        if n_channels == 0 {
            return Err(OpticsError::invalid("n_channels", "must be positive"));
        }
        ensure_positive("center_wavelength", center_wavelength)?;
        ensure_positive("channel_spacing_ghz", channel_spacing_ghz)?;
        let center_freq = SPEED_OF_LIGHT / center_wavelength;
        let half = (n_channels as f64 - 1.0) / 2.0;

        let mut wavelengths = Vec::with_capacity(n_channels);
        for i in 0..n_channels {
            let freq = center_freq + (i as f64 - half) * channel_spacing_ghz * 1e9;
            if freq <= 0.0 {
                return Err(OpticsError::invalid(
                    "channel_spacing_ghz",
                    format!("channel {} falls at a non-positive frequency", i),
                ));
            }
            wavelengths.push(SPEED_OF_LIGHT / freq);
        }

        Ok(Self {
            n_channels,
            center_wavelength,
            channel_spacing_ghz,
            wavelengths,
            powers: vec![1.0; n_channels],
        })
    }

    /// Replace the equal powers with a sech² envelope peaking at the centre
    /// channel, as produced by a soliton comb.
    pub fn with_sech_envelope(mut self) -> Self {
        let n = self.n_channels as f64;
        let half = (n - 1.0) / 2.0;
        let width = (n / 4.0).max(1.0);
        self.powers = (0..self.n_channels)
            .map(|i| {
                let x = (i as f64 - half) / width;
                1.0 / x.cosh().powi(2)
            })
            .collect();
        self
    }

    /// `(wavelength m, frequency THz, relative power)` of one channel.
    pub fn channel_info(&self, idx: usize) -> Option<(f64, f64, f64)> {
        let wavelength = *self.wavelengths.get(idx)?;
        let frequency = SPEED_OF_LIGHT / wavelength / 1e12;
        Some((wavelength, frequency, *self.powers.get(idx)?))
    }

    pub fn total_power(&self) -> f64 {
        self.powers.iter().sum()
    }

    /// Wavelengths as a `[C]` tensor, the batch axis of a multi-channel field.
    pub fn wavelength_tensor(&self) -> Tensor {
        Tensor::from_real(Array1::from(self.wavelengths.clone()).into_dyn())
    }

    /// Field `[C, Nx, Ny]` carrying `profile` on every channel, each scaled to
    /// its channel power.
    pub fn field(&self, profile: &Array2<Complex64>, grid: Grid, z: f64) -> OpticsResult<Field> {
        let [nx, ny] = grid.shape();
        if profile.dim() != (nx, ny) {
            return Err(OpticsError::shape([nx, ny], profile.shape()));
        }
        let base_power: f64 = profile.iter().map(|v| v.norm_sqr()).sum::<f64>() * grid.cell_area();
        if base_power <= 0.0 {
            return Err(OpticsError::invalid("profile", "carries no power"));
        }
        if self.powers.len() != self.n_channels || self.wavelengths.len() != self.n_channels {
            return Err(OpticsError::invalid(
                "powers",
                format!(
                    "{} channels with {} wavelengths and {} powers",
                    self.n_channels,
                    self.wavelengths.len(),
                    self.powers.len()
                ),
            ));
        }
        let mut data = ArrayD::zeros(IxDyn(&[self.n_channels, nx, ny]));
        for (mut channel, power) in data.axis_iter_mut(Axis(0)).zip(&self.powers) {
            let scale = (power / base_power).sqrt();
            channel.assign(&profile.mapv(|v| v * scale));
        }
        Field::new(Tensor::constant(data), grid, self.wavelength_tensor(), z)
    }
}
