//! Thin lens element.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::Placement;
use crate::autodiff::Tensor;
use crate::error::{ensure_finite, OpticsError, OpticsResult};
use crate::field::Field;
use crate::grid::Grid;
use crate::param::Param;
use crate::profiles::circle;

/// Thin lens with phase `exp(-i pi r^2 / (lambda f))`, using the wavelength
/// of the incoming field. By default a circular pupil with the diameter of
/// the smaller grid extent blocks the corners.
#[derive(Debug, Clone)]
pub struct Lens {
    placement: Placement,
    focal_length: Param,
    pupil: bool,
}

impl Lens {
    /// Create new lens with a fixed focal length in metres.
    pub fn new(grid: Grid, focal_length: f64, z: f64) -> OpticsResult<Self> {
        check_focal_length(focal_length)?;
        Ok(Self {
            placement: Placement::new(grid, z)?,
            focal_length: Param::scalar("focal_length", focal_length, false),
            pupil: true,
        })
    }

    /// Make the focal length a trainable parameter.
    pub fn trainable_focal_length(mut self) -> Self {
        self.focal_length = Param::scalar("focal_length", self.focal_length.item(), true);
        self
    }

    /// Make the axial position trainable.
    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    /// Disable the circular pupil.
    pub fn without_pupil(mut self) -> Self {
        self.pupil = false;
        self
    }

    pub fn focal_length(&self) -> &Param {
        &self.focal_length
    }

    pub(crate) fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn parameters(&self) -> Vec<Param> {
        vec![self.focal_length.clone()]
    }

    /// Lens transmission for the wavelength(s) of `field`,
    /// shape `batch ++ [Nx, Ny]`.
    pub fn mask(&self, field: &Field) -> OpticsResult<Tensor> {
        check_focal_length(self.focal_length.item())?;
        let grid = self.placement.grid();
        let lambda = field.aligned_wavelength(2)?;
        let r2 = Tensor::from_real(grid.radius_squared().into_dyn());
        let phase = r2
            .div(&lambda.mul(self.focal_length.tensor())?)?
            .scale(Complex64::new(0.0, -PI));
        let mask = phase.exp();
        if !self.pupil {
            return Ok(mask);
        }
        let [wx, wy] = grid.extent();
        let pupil = circle(grid, wx.min(wy) / 2.0)?;
        mask.mul(&Tensor::from_real(pupil.into_dyn()))
    }
}

fn check_focal_length(f: f64) -> OpticsResult<()> {
    ensure_finite("focal_length", f)?;
    if f == 0.0 {
        return Err(OpticsError::invalid("focal_length", "must be nonzero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::real_data;
    use crate::profiles::lens_phase;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn test_mask_matches_lens_phase() {
        let grid = Grid::square(6, 1e-5).unwrap();
        let lens = Lens::new(grid, 0.2, 0.0).unwrap().without_pupil();
        let field = Field::new(real_data(ArrayD::ones(IxDyn(&[6, 6]))), grid, 0.6e-6, 0.0).unwrap();
        let mask = lens.mask(&field).unwrap().value();
        let phase = lens_phase(&grid, 0.2, 0.6e-6).unwrap();
        for (m, p) in mask.iter().zip(phase.iter()) {
            let expected = Complex64::from_polar(1.0, *p);
            assert_abs_diff_eq!(m.re, expected.re, epsilon = 1e-9);
            assert_abs_diff_eq!(m.im, expected.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pupil_blocks_corners() {
        let grid = Grid::square(8, 1.0).unwrap();
        let lens = Lens::new(grid, 1.0, 0.0).unwrap();
        let field = Field::new(real_data(ArrayD::ones(IxDyn(&[8, 8]))), grid, 1.0, 0.0).unwrap();
        let mask = lens.mask(&field).unwrap().value();
        assert_eq!(mask[[0, 0]], Complex64::new(0.0, 0.0));
        assert!((mask[[4, 4]].norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_batched_wavelengths_give_batched_mask() {
        let grid = Grid::square(4, 1e-5).unwrap();
        let lambdas = Tensor::from_real(array![0.5e-6, 1e-6].into_dyn());
        let data = real_data(ArrayD::ones(IxDyn(&[2, 4, 4])));
        let field = Field::new(data, grid, &lambdas, 0.0).unwrap();
        let mask = Lens::new(grid, 0.1, 0.0).unwrap().mask(&field).unwrap();
        assert_eq!(mask.shape(), vec![2, 4, 4]);
    }

    #[test]
    fn test_rejects_degenerate_focal_length() {
        let grid = Grid::square(4, 1.0).unwrap();
        assert!(matches!(
            Lens::new(grid, 0.0, 0.0),
            Err(OpticsError::InvalidParameter { name: "focal_length", .. })
        ));
        assert!(Lens::new(grid, f64::INFINITY, 0.0).is_err());
        let lens = Lens::new(grid, -0.5, 0.0).unwrap();
        assert_abs_diff_eq!(lens.focal_length().item(), -0.5);
    }
}
