//! Spatial light modulators.

use ndarray::{Array2, ArrayD};
use num_complex::Complex64;

use super::Placement;
use crate::autodiff::Tensor;
use crate::error::{OpticsError, OpticsResult};
use crate::grid::Grid;
use crate::param::Param;

/// How the stored profile becomes a transmission mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationKind {
    /// Profile is the complex transmission.
    Complex,
    /// Profile is a phase in radians, mask `exp(i phi)`.
    Phase,
    /// Profile is a real amplitude.
    Amplitude,
}

/// Spatial light modulator with an arbitrary, optionally trainable profile.
#[derive(Debug, Clone)]
pub struct Modulator {
    placement: Placement,
    profile: Param,
    kind: ModulationKind,
}

impl Modulator {
    /// Create new modulator from a complex transmission mask.
    pub fn complex(grid: Grid, mask: Array2<Complex64>, z: f64, trainable: bool) -> OpticsResult<Self> {
        check_shape(&grid, mask.dim())?;
        Ok(Self {
            placement: Placement::new(grid, z)?,
            profile: Param::complex("mask", mask.into_dyn(), trainable),
            kind: ModulationKind::Complex,
        })
    }

    /// Create new phase-only modulator, mask `exp(i phase)`.
    pub fn phase(grid: Grid, phase: Array2<f64>, z: f64, trainable: bool) -> OpticsResult<Self> {
        Self::real_profile(grid, "phase", phase, z, trainable, ModulationKind::Phase)
    }

    /// Create new amplitude-only modulator.
    pub fn amplitude(grid: Grid, amplitude: Array2<f64>, z: f64, trainable: bool) -> OpticsResult<Self> {
        Self::real_profile(grid, "amplitude", amplitude, z, trainable, ModulationKind::Amplitude)
    }

    fn real_profile(
        grid: Grid,
        name: &str,
        values: Array2<f64>,
        z: f64,
        trainable: bool,
        kind: ModulationKind,
    ) -> OpticsResult<Self> {
        check_shape(&grid, values.dim())?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(OpticsError::invalid("profile", "must be finite"));
        }
        Ok(Self {
            placement: Placement::new(grid, z)?,
            profile: Param::real(name, values.into_dyn(), trainable),
            kind,
        })
    }

    /// Make the axial position trainable.
    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub fn kind(&self) -> ModulationKind {
        self.kind
    }

    pub fn profile(&self) -> &Param {
        &self.profile
    }

    pub(crate) fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn parameters(&self) -> Vec<Param> {
        vec![self.profile.clone()]
    }

    /// Complex transmission `[Nx, Ny]`.
    pub fn mask(&self) -> Tensor {
        let profile = self.profile.tensor();
        match self.kind {
            ModulationKind::Complex | ModulationKind::Amplitude => profile.clone(),
            ModulationKind::Phase => profile.scale(Complex64::i()).exp(),
        }
    }

    /// Current mask values without a graph.
    pub fn mask_values(&self) -> ArrayD<Complex64> {
        (*self.mask().value()).clone()
    }
}

fn check_shape(grid: &Grid, dim: (usize, usize)) -> OpticsResult<()> {
    let [nx, ny] = grid.shape();
    if dim != (nx, ny) {
        return Err(OpticsError::shape([nx, ny], [dim.0, dim.1]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{real_data, Field};
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, IxDyn};
    use std::f64::consts::PI;

    #[test]
    fn test_phase_mask_is_unit_modulus() {
        let grid = Grid::square(3, 1.0).unwrap();
        let phase = Array2::from_shape_fn((3, 3), |(i, j)| (i * 3 + j) as f64 * 0.3);
        let modulator = Modulator::phase(grid, phase.clone(), 0.0, false).unwrap();
        let mask = modulator.mask_values();
        for (m, p) in mask.iter().zip(phase.iter()) {
            assert_abs_diff_eq!(m.norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(m.arg(), *p, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_amplitude_scales_field() {
        let grid = Grid::square(2, 1.0).unwrap();
        let amplitude = Array2::from_elem((2, 2), 0.5);
        let modulator = Modulator::amplitude(grid, amplitude, 0.0, false).unwrap();
        let field = Field::new(real_data(ndarray::ArrayD::ones(IxDyn(&[2, 2]))), grid, 1e-6, 0.0).unwrap();
        let out = field.modulate(&modulator.mask()).unwrap();
        assert_abs_diff_eq!(out.power().unwrap().item().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_phase_gradient() {
        // d/dphi |sum(exp(i phi) u)|^2 with u = 1 and phases 0, pi/2
        let grid = Grid::new([2, 1], [1.0, 1.0], [0.0, 0.0]).unwrap();
        let phase = Array2::from_shape_vec((2, 1), vec![0.0, PI / 2.0]).unwrap();
        let modulator = Modulator::phase(grid, phase, 0.0, true).unwrap();
        let loss = modulator.mask().sum().abs2();
        loss.backward().unwrap();
        // s = 1 + i, dL/dphi_k = 2 Re(conj(s) i e^{i phi_k})
        let grad = modulator.profile().real_grad().unwrap();
        assert_abs_diff_eq!(grad[[0, 0]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[[1, 0]], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let grid = Grid::square(3, 1.0).unwrap();
        assert!(matches!(
            Modulator::phase(grid, Array2::zeros((2, 3)), 0.0, false),
            Err(OpticsError::ShapeMismatch { .. })
        ));
    }
}
