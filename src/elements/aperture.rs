use ndarray::{Array2, ArrayD};

use super::Placement;
use crate::autodiff::Tensor;
use crate::error::{ensure_positive, OpticsError, OpticsResult};
use crate::grid::Grid;
use crate::profiles::{circle, rectangle};

/// Fixed real transmission mask.
#[derive(Debug, Clone)]
pub struct Aperture {
    placement: Placement,
    mask: Array2<f64>,
}

impl Aperture {
    pub fn circular(grid: Grid, radius: f64, z: f64) -> OpticsResult<Self> {
        let mask = circle(&grid, radius)?;
        Self::from_mask(grid, mask, z)
    }

    pub fn rectangular(grid: Grid, side: [f64; 2], z: f64) -> OpticsResult<Self> {
        let mask = rectangle(&grid, side)?;
        Self::from_mask(grid, mask, z)
    }

    /// Circular aperture with a logistic edge, `1 / (1 + exp((r - R) / w))`.
    pub fn soft_circular(grid: Grid, radius: f64, edge_width: f64, z: f64) -> OpticsResult<Self> {
        ensure_positive("radius", radius)?;
        ensure_positive("edge_width", edge_width)?;
        let mask = grid
            .radius_squared()
            .mapv(|r2| 1.0 / (1.0 + ((r2.sqrt() - radius) / edge_width).exp()));
        Self::from_mask(grid, mask, z)
    }

    pub fn from_mask(grid: Grid, mask: Array2<f64>, z: f64) -> OpticsResult<Self> {
        let [nx, ny] = grid.shape();
        if mask.dim() != (nx, ny) {
            return Err(OpticsError::shape([nx, ny], mask.shape()));
        }
        if mask.iter().any(|v| !v.is_finite()) {
            return Err(OpticsError::invalid("mask", "must be finite"));
        }
        Ok(Self {
            placement: Placement::new(grid, z)?,
            mask,
        })
    }

    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub(crate) fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn transmission(&self) -> &Array2<f64> {
        &self.mask
    }

    pub fn mask(&self) -> Tensor {
        Tensor::from_real(self.mask.clone().into_dyn())
    }

    /// Fraction of the grid that transmits more than half the light.
    pub fn open_fraction(&self) -> f64 {
        let open = self.mask.iter().filter(|&&v| v > 0.5).count();
        open as f64 / self.mask.len() as f64
    }

    pub fn mask_values(&self) -> ArrayD<f64> {
        self.mask.clone().into_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_circular_aperture() {
        let grid = Grid::square(5, 1.0).unwrap();
        let aperture = Aperture::circular(grid, 1.0, 0.0).unwrap();
        assert_eq!(aperture.transmission().sum(), 5.0);
        assert_abs_diff_eq!(aperture.open_fraction(), 0.2);
    }

    #[test]
    fn test_soft_edge_is_half_at_radius() {
        let grid = Grid::new([5, 1], [1.0, 1.0], [0.0, 0.0]).unwrap();
        let aperture = Aperture::soft_circular(grid, 1.0, 0.1, 0.0).unwrap();
        let mask = aperture.transmission();
        // x = -2, -1, 0, 1, 2
        assert_abs_diff_eq!(mask[[3, 0]], 0.5, epsilon = 1e-12);
        assert!(mask[[2, 0]] > 0.99);
        assert!(mask[[4, 0]] < 0.01);
        assert!(Aperture::soft_circular(grid, 1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_from_mask_checks_shape() {
        let grid = Grid::square(4, 1.0).unwrap();
        assert!(Aperture::from_mask(grid, Array2::ones((4, 3)), 0.0).is_err());
        assert!(Aperture::rectangular(grid, [2.0, 1.0], 0.0).is_ok());
    }
}
