//! Discretized optical fields.
//!
//! A [`Field`] couples a data tensor with the grid it is sampled on, its
//! wavelength(s), its axial position and the propagation settings it was
//! created with. Leading data axes are batch axes; the trailing "core" axes
//! depend on the [`FieldKind`]. Fields are values: every operation returns a
//! new field.

use log::debug;
use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;

use crate::autodiff::{broadcast_shape, Tensor};
use crate::config::{self, Interpolation, PropagationConfig};
use crate::error::{OpticsError, OpticsResult};
use crate::grid::Grid;
use crate::interpolation::resample_plane;
use crate::propagation::AngularSpectrum;

/// Representation carried by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `[...batch, Nx, Ny]`
    Coherent,
    /// `[...batch, 2, Nx, Ny]`, Jones components on axis -3.
    Polarized,
    /// `[...batch, M, Nx, Ny]` coherent modes with real weights `[M]`.
    ModeExpansion,
    /// `[...batch, Nx, Ny, Nx, Ny]` mutual coherence `Γ(r1, r2)`.
    MutualCoherence,
}

impl FieldKind {
    /// Number of trailing axes owned by the representation.
    pub fn core_axes(self) -> usize {
        match self {
            FieldKind::Coherent => 2,
            FieldKind::Polarized | FieldKind::ModeExpansion => 3,
            FieldKind::MutualCoherence => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    data: Tensor,
    grid: Grid,
    wavelength: Tensor,
    z: Tensor,
    kind: FieldKind,
    weights: Option<Tensor>,
    propagation: PropagationConfig,
}

impl Field {
    /// Coherent scalar field `[...batch, Nx, Ny]`.
    pub fn new(
        data: Tensor,
        grid: Grid,
        wavelength: impl Into<Tensor>,
        z: impl Into<Tensor>,
    ) -> OpticsResult<Self> {
        Self::build(data, grid, wavelength.into(), z.into(), FieldKind::Coherent, None)
    }

    /// Coherent field at `z = 0` with the wavelength of the active config.
    pub fn from_config(data: Tensor, grid: Grid) -> OpticsResult<Self> {
        Self::new(data, grid, config::current().default_wavelength, 0.0)
    }

    /// Polarized field `[...batch, 2, Nx, Ny]`.
    pub fn polarized(
        data: Tensor,
        grid: Grid,
        wavelength: impl Into<Tensor>,
        z: impl Into<Tensor>,
    ) -> OpticsResult<Self> {
        let field = Self::build(data, grid, wavelength.into(), z.into(), FieldKind::Polarized, None)?;
        let shape = field.data.shape();
        if shape[shape.len() - 3] != 2 {
            return Err(OpticsError::shape("2 polarization components on axis -3", shape));
        }
        Ok(field)
    }

    /// Mutual coherence `[...batch, Nx, Ny, Nx, Ny]`.
    pub fn mutual_coherence(
        data: Tensor,
        grid: Grid,
        wavelength: impl Into<Tensor>,
        z: impl Into<Tensor>,
    ) -> OpticsResult<Self> {
        Self::build(data, grid, wavelength.into(), z.into(), FieldKind::MutualCoherence, None)
    }

    /// Coherent-mode expansion: modes `[...batch, M, Nx, Ny]`, weights `[M]`.
    pub fn mode_expansion(
        modes: Tensor,
        weights: Tensor,
        grid: Grid,
        wavelength: impl Into<Tensor>,
        z: impl Into<Tensor>,
    ) -> OpticsResult<Self> {
        let shape = modes.shape();
        if shape.len() < 3 || weights.shape() != [shape[shape.len() - 3]] {
            return Err(OpticsError::shape(
                "weights [M] matching modes [..., M, Nx, Ny]",
                (weights.shape(), shape),
            ));
        }
        if weights.value().iter().any(|w| !(w.re >= 0.0) || w.im != 0.0) {
            return Err(OpticsError::invalid("weights", "mode weights must be real and non-negative"));
        }
        Self::build(
            modes,
            grid,
            wavelength.into(),
            z.into(),
            FieldKind::ModeExpansion,
            Some(weights),
        )
    }

    fn build(
        data: Tensor,
        grid: Grid,
        wavelength: Tensor,
        z: Tensor,
        kind: FieldKind,
        weights: Option<Tensor>,
    ) -> OpticsResult<Self> {
        let field = Self {
            data,
            grid,
            wavelength,
            z,
            kind,
            weights,
            propagation: config::current().propagation,
        };
        field.validate()?;
        Ok(field)
    }

    fn validate(&self) -> OpticsResult<()> {
        let shape = self.data.shape();
        let core = self.kind.core_axes();
        let [nx, ny] = self.grid.shape();
        let expected: &[usize] = match self.kind {
            FieldKind::MutualCoherence => &[nx, ny, nx, ny],
            _ => &[nx, ny],
        };
        if shape.len() < core || !shape.ends_with(expected) {
            return Err(OpticsError::shape(
                format!("{:?} data ending in {:?}", self.kind, expected),
                shape,
            ));
        }
        if self
            .wavelength
            .value()
            .iter()
            .any(|l| !(l.re.is_finite() && l.re > 0.0) || l.im != 0.0)
        {
            return Err(OpticsError::invalid("wavelength", "must be real, finite and positive"));
        }
        if self.z.value().iter().any(|z| !z.re.is_finite() || z.im != 0.0) {
            return Err(OpticsError::invalid("z", "must be real and finite"));
        }
        let batch = self.batch_shape();
        for (name, t) in [("wavelength", &self.wavelength), ("z", &self.z)] {
            match broadcast_shape(&batch, &t.shape()) {
                Ok(shape) if shape == batch => {}
                _ => {
                    return Err(OpticsError::shape(
                        format!("{} broadcastable to batch {:?}", name, batch),
                        t.shape(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Same metadata with new data.
    pub(crate) fn with_data(&self, data: Tensor) -> Self {
        Self {
            data,
            ..self.clone()
        }
    }

    /// Replace the propagation settings.
    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn wavelength(&self) -> &Tensor {
        &self.wavelength
    }

    pub fn z(&self) -> &Tensor {
        &self.z
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Mode weights of a mode expansion.
    pub fn weights(&self) -> Option<&Tensor> {
        self.weights.as_ref()
    }

    pub fn propagation(&self) -> PropagationConfig {
        self.propagation
    }

    /// Leading axes not owned by the representation.
    pub fn batch_shape(&self) -> Vec<usize> {
        let shape = self.data.shape();
        shape[..shape.len() - self.kind.core_axes()].to_vec()
    }

    /// Wavelength with unit axes appended so it broadcasts against
    /// `core` trailing axes.
    pub(crate) fn aligned_wavelength(&self, core: usize) -> OpticsResult<Tensor> {
        self.wavelength.unsqueeze_trailing(core)
    }

    /// Propagate by a signed distance (scalar or batched).
    pub fn propagate(&self, distance: impl Into<Tensor>) -> OpticsResult<Field> {
        let grid = self.grid;
        self.transport(distance.into(), &grid)
    }

    /// Propagate to an absolute plane.
    pub fn propagate_to_z(&self, z: impl Into<Tensor>) -> OpticsResult<Field> {
        let distance = z.into().sub(&self.z)?;
        self.propagate(distance)
    }

    /// Propagate to the plane at `z` and sample the result on `grid`.
    ///
    /// The output grid may differ in shape, spacing and offset, but must lie
    /// inside the (padded) propagation domain of this field. Off-lattice
    /// samples are interpolated bilinearly.
    pub fn propagate_to_plane(&self, grid: &Grid, z: impl Into<Tensor>) -> OpticsResult<Field> {
        let distance = z.into().sub(&self.z)?;
        self.transport(distance, grid)
    }

    fn transport(&self, distance: Tensor, target: &Grid) -> OpticsResult<Field> {
        if distance.value().iter().any(|d| !d.re.is_finite() || d.im != 0.0) {
            return Err(OpticsError::invalid("distance", "must be real and finite"));
        }
        broadcast_shape(&self.batch_shape(), &distance.shape())?;

        let prop = AngularSpectrum::new(self.propagation);
        let step = |data: &Tensor, source: &Grid, lambda: &Tensor, d: &Tensor| {
            prop.propagate_onto(data, source, lambda, d, target, Interpolation::Bilinear)
        };
        let data = match self.kind {
            FieldKind::MutualCoherence => {
                let lambda = self.aligned_wavelength(4)?;
                let d = distance.unsqueeze_trailing(4)?;
                let b = self.batch_shape().len();
                let mut swap: Vec<usize> = (0..b).collect();
                swap.extend([b + 2, b + 3, b, b + 1]);
                // Γ' = P Γ P^H: conjugate-propagate r2, swap pairs, propagate r1
                let half = step(&self.data.conj(), &self.grid, &lambda, &d)?
                    .conj()
                    .permute(&swap)?;
                step(&half, &self.grid, &lambda, &d)?.permute(&swap)?
            }
            kind => {
                let core = kind.core_axes();
                step(
                    &self.data,
                    &self.grid,
                    &self.aligned_wavelength(core)?,
                    &distance.unsqueeze_trailing(core)?,
                )?
            }
        };
        let z = self.z.add(&distance)?;
        Ok(Self {
            data,
            grid: *target,
            z,
            ..self.clone()
        })
    }

    /// Real intensity `[...batch, Nx, Ny]`.
    pub fn intensity(&self) -> OpticsResult<Tensor> {
        let ndim = self.data.ndim();
        match self.kind {
            FieldKind::Coherent => Ok(self.data.abs2()),
            FieldKind::Polarized => self.data.abs2().sum_axis(ndim - 3),
            FieldKind::ModeExpansion => {
                let weights = self.mode_weights()?.unsqueeze_trailing(2)?;
                self.data.abs2().mul(&weights)?.sum_axis(ndim - 3)
            }
            FieldKind::MutualCoherence => {
                let [nx, ny] = self.grid.shape();
                let mut flat = self.batch_shape();
                flat.extend([nx * ny, nx * ny]);
                let mut plane = self.batch_shape();
                plane.extend([nx, ny]);
                Ok(self.data.reshape(&flat)?.diagonal()?.reshape(&plane)?.real())
            }
        }
    }

    fn mode_weights(&self) -> OpticsResult<&Tensor> {
        self.weights
            .as_ref()
            .ok_or_else(|| OpticsError::invalid("weights", "mode expansion without weights"))
    }

    /// Total power `Σ I dA` per batch element.
    pub fn power(&self) -> OpticsResult<Tensor> {
        Ok(self
            .intensity()?
            .sum_trailing(2)?
            .scale_real(self.grid.cell_area()))
    }

    /// Rescale so every batch element carries `power`.
    pub fn normalize(&self, power: f64) -> OpticsResult<Field> {
        crate::error::ensure_positive("power", power)?;
        let ratio = Tensor::scalar(power).div(&self.power()?)?;
        if ratio.value().iter().any(|r| !r.re.is_finite()) {
            return Err(OpticsError::invalid("power", "cannot normalize a field with zero power"));
        }
        let core = self.kind.core_axes();
        let factor = match self.kind {
            FieldKind::MutualCoherence => ratio,
            _ => ratio.masked_sqrt(),
        };
        let data = self.data.mul(&factor.unsqueeze_trailing(core)?)?;
        Ok(self.with_data(data))
    }

    /// `Σ conj(u1) u2 dA` over the plane, per batch element.
    pub fn inner(&self, other: &Field) -> OpticsResult<Tensor> {
        if self.kind != FieldKind::Coherent || other.kind != FieldKind::Coherent {
            return Err(OpticsError::invalid("kind", "inner products need coherent fields"));
        }
        self.ensure_grid(&other.grid)?;
        Ok(self
            .data
            .conj()
            .mul(&other.data)?
            .sum_trailing(2)?
            .scale_real(self.grid.cell_area()))
    }

    pub(crate) fn ensure_grid(&self, grid: &Grid) -> OpticsResult<()> {
        if self.grid.is_compatible(grid) {
            Ok(())
        } else {
            Err(OpticsError::GridMismatch {
                field: self.grid.describe(),
                element: grid.describe(),
            })
        }
    }

    /// Intensity-weighted mean position, shape `batch ++ [2]`.
    pub fn centroid(&self) -> OpticsResult<ArrayD<f64>> {
        Ok(self.moments()?.0)
    }

    /// Intensity-weighted standard deviation, shape `batch ++ [2]`.
    pub fn std(&self) -> OpticsResult<ArrayD<f64>> {
        Ok(self.moments()?.1)
    }

    fn moments(&self) -> OpticsResult<(ArrayD<f64>, ArrayD<f64>)> {
        let intensity = self.intensity()?.to_real();
        let (x, y) = self.grid.meshgrid();
        let [nx, ny] = self.grid.shape();
        let batch = self.batch_shape();
        let count: usize = batch.iter().product();
        let planes = intensity
            .into_shape((count, nx, ny))
            .map_err(|e| OpticsError::shape((count, nx, ny), e.to_string()))?;

        let mut out_shape = batch;
        out_shape.push(2);
        let mut mean = ArrayD::zeros(IxDyn(&out_shape));
        let mut spread = ArrayD::zeros(IxDyn(&out_shape));
        {
            let mut mean_flat = mean
                .view_mut()
                .into_shape((count, 2))
                .map_err(|e| OpticsError::shape((count, 2), e.to_string()))?;
            let mut spread_flat = spread
                .view_mut()
                .into_shape((count, 2))
                .map_err(|e| OpticsError::shape((count, 2), e.to_string()))?;
            for (k, plane) in planes.axis_iter(Axis(0)).enumerate() {
                let total = plane.sum();
                let mx = (&plane * &x).sum() / total;
                let my = (&plane * &y).sum() / total;
                let vx = (&plane * &x.mapv(|v| (v - mx).powi(2))).sum() / total;
                let vy = (&plane * &y.mapv(|v| (v - my).powi(2))).sum() / total;
                mean_flat[[k, 0]] = mx;
                mean_flat[[k, 1]] = my;
                spread_flat[[k, 0]] = vx.sqrt();
                spread_flat[[k, 1]] = vy.sqrt();
            }
        }
        Ok((mean, spread))
    }

    /// Apply a Jones matrix, `[2, 2]` uniform or `[2, 2, Nx, Ny]` per point.
    pub fn apply_jones(&self, matrix: &Tensor) -> OpticsResult<Field> {
        if self.kind != FieldKind::Polarized {
            return Err(OpticsError::shape(
                "a polarized field",
                format!("{:?} field", self.kind),
            ));
        }
        let shape = matrix.shape();
        let matrix = match shape.as_slice() {
            [2, 2] => matrix.reshape(&[2, 2, 1, 1])?,
            [2, 2, nx, ny] if [*nx, *ny] == self.grid.shape() => matrix.clone(),
            _ => {
                let [nx, ny] = self.grid.shape();
                return Err(OpticsError::shape(format!("[2, 2] or [2, 2, {}, {}]", nx, ny), shape));
            }
        };
        let axis = self.data.ndim() - 3;
        let components = [self.data.select(axis, 0)?, self.data.select(axis, 1)?];
        let mut rows = Vec::with_capacity(2);
        for i in 0..2 {
            let row = matrix.select(0, i)?;
            let first = row.select(0, 0)?.mul(&components[0])?;
            let second = row.select(0, 1)?.mul(&components[1])?;
            rows.push(first.add(&second)?);
        }
        let out_axis = rows[0].ndim() - 2;
        Ok(self.with_data(Tensor::stack(&rows, out_axis)?))
    }

    /// Multiply by a mask broadcastable to `[...batch, Nx, Ny]`.
    pub fn modulate(&self, mask: &Tensor) -> OpticsResult<Field> {
        let shape = mask.shape();
        if shape.len() < 2 || shape[shape.len() - 2..] != self.grid.shape() {
            return Err(OpticsError::shape(
                format!("mask ending in {:?}", self.grid.shape()),
                shape,
            ));
        }
        let data = match self.kind {
            FieldKind::Coherent => self.data.mul(mask)?,
            FieldKind::Polarized | FieldKind::ModeExpansion => {
                self.data.mul(&mask.unsqueeze(shape.len() - 2)?)?
            }
            FieldKind::MutualCoherence => {
                let n = shape.len();
                let mut left = shape.clone();
                left.extend([1, 1]);
                let mut right = shape[..n - 2].to_vec();
                right.extend([1, 1]);
                right.extend_from_slice(&shape[n - 2..]);
                self.data
                    .mul(&mask.reshape(&left)?)?
                    .mul(&mask.conj().reshape(&right)?)?
            }
        };
        Ok(self.with_data(data))
    }

    /// Resample onto `grid`. Samples outside this field's extent are zero.
    pub fn resample(&self, grid: &Grid, method: Interpolation) -> OpticsResult<Field> {
        if self.grid.is_compatible(grid) {
            return Ok(self.clone());
        }
        debug!(
            "resampling {:?} field from [{}] to [{}]",
            self.kind,
            self.grid.describe(),
            grid.describe()
        );
        let ndim = self.data.ndim();
        let data = match self.kind {
            FieldKind::MutualCoherence => {
                let once = resample_plane(&self.data, ndim - 4, &self.grid, grid, method)?;
                resample_plane(&once, ndim - 2, &self.grid, grid, method)?
            }
            _ => resample_plane(&self.data, ndim - 2, &self.grid, grid, method)?,
        };
        Ok(Self {
            data,
            grid: *grid,
            ..self.clone()
        })
    }

    /// Mutual coherence of a coherent field or a mode expansion.
    pub fn to_mutual_coherence(&self) -> OpticsResult<Field> {
        let shape = self.data.shape();
        let n = shape.len();
        let outer = |u: &Tensor| -> OpticsResult<Tensor> {
            let plane = u.shape();
            let m = plane.len();
            let mut left = plane.clone();
            left.extend([1, 1]);
            let mut right = plane[..m - 2].to_vec();
            right.extend([1, 1]);
            right.extend_from_slice(&plane[m - 2..]);
            u.reshape(&left)?.mul(&u.conj().reshape(&right)?)
        };
        let gamma = match self.kind {
            FieldKind::MutualCoherence => return Ok(self.clone()),
            FieldKind::Polarized => {
                return Err(OpticsError::invalid(
                    "kind",
                    "polarized fields have no scalar mutual coherence",
                ))
            }
            FieldKind::Coherent => outer(&self.data)?,
            FieldKind::ModeExpansion => {
                let weights = self.mode_weights()?.unsqueeze_trailing(4)?;
                outer(&self.data)?.mul(&weights)?.sum_axis(n - 3)?
            }
        };
        Ok(Self {
            data: gamma,
            kind: FieldKind::MutualCoherence,
            weights: None,
            ..self.clone()
        })
    }

    /// Cut the field from the gradient graph.
    pub fn detach(&self) -> Field {
        Self {
            data: self.data.detach(),
            wavelength: self.wavelength.detach(),
            z: self.z.detach(),
            weights: self.weights.as_ref().map(Tensor::detach),
            ..self.clone()
        }
    }
}

/// Complex data tensor from real samples.
pub fn real_data(values: ArrayD<f64>) -> Tensor {
    Tensor::constant(values.mapv(|v| Complex64::new(v, 0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Dimension};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn grid(n: usize) -> Grid {
        Grid::square(n, 1e-6).unwrap()
    }

    fn ramp(shape: &[usize]) -> Tensor {
        Tensor::constant(ArrayD::from_shape_fn(IxDyn(shape), |idx| {
            let s: usize = idx.slice().iter().enumerate().map(|(k, &i)| (k + 1) * i).sum();
            c(1.0 + s as f64 * 0.1, 0.5 - s as f64 * 0.05)
        }))
    }

    #[test]
    fn test_constructors_validate_layout() {
        let g = grid(4);
        assert!(Field::new(ramp(&[4, 4]), g, 1e-6, 0.0).is_ok());
        assert!(matches!(
            Field::new(ramp(&[4, 5]), g, 1e-6, 0.0),
            Err(OpticsError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Field::new(ramp(&[4, 4]), g, -1e-6, 0.0),
            Err(OpticsError::InvalidParameter { name: "wavelength", .. })
        ));
        assert!(Field::polarized(ramp(&[3, 4, 4]), g, 1e-6, 0.0).is_err());
        assert!(Field::polarized(ramp(&[2, 4, 4]), g, 1e-6, 0.0).is_ok());
        assert!(Field::mutual_coherence(ramp(&[4, 4, 4, 4]), g, 1e-6, 0.0).is_ok());
        assert!(Field::mutual_coherence(ramp(&[4, 4]), g, 1e-6, 0.0).is_err());

        let weights = Tensor::from_real(array![1.0, 0.5].into_dyn());
        assert!(Field::mode_expansion(ramp(&[2, 4, 4]), weights.clone(), g, 1e-6, 0.0).is_ok());
        assert!(Field::mode_expansion(ramp(&[3, 4, 4]), weights, g, 1e-6, 0.0).is_err());
        let negative = Tensor::from_real(array![1.0, -0.5].into_dyn());
        assert!(Field::mode_expansion(ramp(&[2, 4, 4]), negative, g, 1e-6, 0.0).is_err());
    }

    #[test]
    fn test_batched_wavelength_must_match_batch() {
        let g = grid(4);
        let lambdas = Tensor::from_real(array![1e-6, 2e-6, 3e-6].into_dyn());
        assert!(Field::new(ramp(&[3, 4, 4]), g, &lambdas, 0.0).is_ok());
        assert!(Field::new(ramp(&[2, 4, 4]), g, &lambdas, 0.0).is_err());
        // a single plane cannot carry three wavelengths
        assert!(Field::new(ramp(&[4, 4]), g, &lambdas, 0.0).is_err());
    }

    #[test]
    fn test_intensity_per_kind() {
        let g = grid(3);
        let u = ramp(&[3, 3]);
        let coherent = Field::new(u.clone(), g, 1e-6, 0.0).unwrap();
        let expected = u.value().mapv(|v| v.norm_sqr());

        let gamma = coherent.to_mutual_coherence().unwrap();
        assert_eq!(gamma.data().shape(), vec![3, 3, 3, 3]);
        let from_gamma = gamma.intensity().unwrap().to_real();
        for (a, b) in from_gamma.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }

        let modes = Tensor::stack(&[u.clone(), u.scale_real(2.0)], 0).unwrap();
        let weights = Tensor::from_real(array![0.25, 1.0].into_dyn());
        let expansion = Field::mode_expansion(modes, weights, g, 1e-6, 0.0).unwrap();
        let from_modes = expansion.intensity().unwrap().to_real();
        for (a, b) in from_modes.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, 4.25 * b, epsilon = 1e-12);
        }
        let gamma_modes = expansion.to_mutual_coherence().unwrap().intensity().unwrap().to_real();
        for (a, b) in gamma_modes.iter().zip(from_modes.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }

        let pol = Field::polarized(Tensor::stack(&[u.clone(), u.clone()], 0).unwrap(), g, 1e-6, 0.0)
            .unwrap();
        let from_pol = pol.intensity().unwrap().to_real();
        for (a, b) in from_pol.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, 2.0 * b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_modulate_mutual_coherence_matches_coherent() {
        let g = grid(3);
        let u = ramp(&[3, 3]);
        let mask = Tensor::constant(Array2::from_shape_fn((3, 3), |(i, j)| {
            Complex64::from_polar(0.5 + 0.1 * i as f64, 0.3 * j as f64)
        }).into_dyn());
        let coherent = Field::new(u, g, 1e-6, 0.0).unwrap();
        let via_gamma = coherent
            .to_mutual_coherence()
            .unwrap()
            .modulate(&mask)
            .unwrap();
        let direct = coherent.modulate(&mask).unwrap().to_mutual_coherence().unwrap();
        for (a, b) in via_gamma.data().value().iter().zip(direct.data().value().iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_apply_jones_uniform_and_per_point() {
        let g = grid(2);
        let ex = Tensor::constant(ArrayD::from_elem(IxDyn(&[2, 2]), c(1.0, 0.0)));
        let ey = Tensor::constant(ArrayD::from_elem(IxDyn(&[2, 2]), c(0.0, 2.0)));
        let field = Field::polarized(Tensor::stack(&[ex, ey], 0).unwrap(), g, 1e-6, 0.0).unwrap();

        // swap components
        let swap = Tensor::constant(array![[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]].into_dyn());
        let out = field.apply_jones(&swap).unwrap();
        let data = out.data().value();
        assert_eq!(data[[0, 1, 1]], c(0.0, 2.0));
        assert_eq!(data[[1, 0, 0]], c(1.0, 0.0));

        let per_point = Tensor::constant(ArrayD::from_shape_fn(IxDyn(&[2, 2, 2, 2]), |idx| {
            if idx[0] == idx[1] && idx[2] == 0 {
                c(1.0, 0.0)
            } else {
                c(0.0, 0.0)
            }
        }));
        let out = field.apply_jones(&per_point).unwrap();
        let data = out.data().value();
        assert_eq!(data[[1, 0, 1]], c(0.0, 2.0));
        assert_eq!(data[[1, 1, 1]], c(0.0, 0.0));

        let scalar = Field::new(ramp(&[2, 2]), g, 1e-6, 0.0).unwrap();
        assert!(matches!(
            scalar.apply_jones(&swap),
            Err(OpticsError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_power_normalize_and_inner() {
        let g = Grid::square(4, 2.0).unwrap();
        let field = Field::new(ramp(&[4, 4]), g, 1e-6, 0.0).unwrap();
        let normalized = field.normalize(3.0).unwrap();
        assert_abs_diff_eq!(normalized.power().unwrap().item().re, 3.0, epsilon = 1e-12);
        let self_overlap = normalized.inner(&normalized).unwrap().item();
        assert_abs_diff_eq!(self_overlap.re, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(self_overlap.im, 0.0, epsilon = 1e-12);

        let other = Field::new(ramp(&[4, 4]), Grid::square(4, 1.0).unwrap(), 1e-6, 0.0).unwrap();
        assert!(matches!(field.inner(&other), Err(OpticsError::GridMismatch { .. })));
    }

    #[test]
    fn test_centroid_and_std_of_offset_gaussian() {
        let g = Grid::new([101, 100], [0.2, 0.2], [1.0, -0.5]).unwrap();
        let (x, y) = g.meshgrid();
        let (sx, sy, mx, my) = (1.5, 1.1, 0.6, -0.2);
        let amplitude = ndarray::Zip::from(&x).and(&y).map_collect(|&x, &y| {
            (-(x - mx).powi(2) / (4.0 * sx * sx) - (y - my).powi(2) / (4.0 * sy * sy)).exp()
        });
        let field = Field::new(real_data(amplitude.into_dyn()), g, 1e-6, 0.0).unwrap();
        let centroid = field.centroid().unwrap();
        let std = field.std().unwrap();
        assert_abs_diff_eq!(centroid[[0]], mx, epsilon = 1e-6);
        assert_abs_diff_eq!(centroid[[1]], my, epsilon = 1e-6);
        assert_abs_diff_eq!(std[[0]], sx, epsilon = 1e-4);
        assert_abs_diff_eq!(std[[1]], sy, epsilon = 1e-4);
    }

    #[test]
    fn test_propagate_updates_z_and_keeps_config() {
        let g = Grid::square(8, 1e-6).unwrap();
        let cfg = PropagationConfig { pad_factor: [1, 1] };
        let field = Field::new(ramp(&[8, 8]), g, 1e-6, 0.25)
            .unwrap()
            .with_propagation(cfg);
        let out = field.propagate(0.5).unwrap();
        assert_abs_diff_eq!(out.z().item().re, 0.75);
        assert_eq!(out.propagation(), cfg);
        let back = field.propagate_to_z(0.25).unwrap();
        assert_eq!(*back.data().value(), *field.data().value());
        assert!(field.propagate(f64::NAN).is_err());
    }

    #[test]
    fn test_resample_compatible_grid_is_unchanged() {
        let g = grid(4);
        let field = Field::new(ramp(&[4, 4]), g, 1e-6, 0.0).unwrap();
        let same = field.resample(&g, Interpolation::Bilinear).unwrap();
        assert_eq!(*same.data().value(), *field.data().value());

        let coarse = Grid::square(2, 2e-6).unwrap();
        let down = field.resample(&coarse, Interpolation::Nearest).unwrap();
        assert_eq!(down.data().shape(), vec![2, 2]);
        assert_eq!(*down.grid(), coarse);
    }

    #[test]
    fn test_propagate_to_plane_agrees_across_representations() {
        let g = grid(8);
        let field = Field::new(ramp(&[8, 8]), g, 1e-6, 0.0)
            .unwrap()
            .with_propagation(PropagationConfig { pad_factor: [1, 1] });
        let plane = Grid::new([5, 6], [1.5e-6, 0.9e-6], [-1e-6, 2e-6]).unwrap();

        let direct = field.propagate_to_plane(&plane, 2e-5).unwrap();
        assert_eq!(direct.data().shape(), vec![5, 6]);
        assert_eq!(*direct.grid(), plane);
        assert_abs_diff_eq!(direct.z().item().re, 2e-5);

        let via_gamma = field
            .to_mutual_coherence()
            .unwrap()
            .propagate_to_plane(&plane, 2e-5)
            .unwrap();
        assert_eq!(via_gamma.data().shape(), vec![5, 6, 5, 6]);
        let a = direct.intensity().unwrap().to_real();
        let b = via_gamma.intensity().unwrap().to_real();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-10);
        }

        // same grid: identical to propagate_to_z
        let same = field.propagate_to_plane(&g, 2e-5).unwrap();
        assert_eq!(*same.data().value(), *field.propagate_to_z(2e-5).unwrap().data().value());
    }

    #[test]
    fn test_propagate_to_plane_outside_domain_fails() {
        let g = grid(8);
        let field = Field::new(ramp(&[8, 8]), g, 1e-6, 0.0).unwrap();
        let beyond = Grid::new([8, 8], [1e-6, 1e-6], [1e-8, 0.0]).unwrap();
        assert!(matches!(
            field.propagate_to_plane(&beyond, 1e-5),
            Err(OpticsError::InvalidParameter { name: "grid", .. })
        ));
    }
}
