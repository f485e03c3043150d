//! Regular 2D sampling lattice.
//!
//! Sample `(i, j)` sits at `x = ox + (i - (Nx - 1) / 2) * dx` and
//! `y = oy + (j - (Ny - 1) / 2) * dy`; the first array axis is x.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{ensure_finite, ensure_positive, OpticsError, OpticsResult};

/// Relative tolerance used by [`Grid::is_compatible`].
pub const GRID_TOLERANCE: f64 = 1e-9;

/// Immutable description of a sampling lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    shape: [usize; 2],
    spacing: [f64; 2],
    offset: [f64; 2],
}

impl Grid {
    /// Create a grid, validating shape and spacing.
    pub fn new(shape: [usize; 2], spacing: [f64; 2], offset: [f64; 2]) -> OpticsResult<Self> {
        if shape[0] == 0 || shape[1] == 0 {
            return Err(OpticsError::invalid(
                "shape",
                format!("both dimensions must be positive, got {:?}", shape),
            ));
        }
        ensure_positive("spacing", spacing[0])?;
        ensure_positive("spacing", spacing[1])?;
        ensure_finite("offset", offset[0])?;
        ensure_finite("offset", offset[1])?;
        Ok(Self {
            shape,
            spacing,
            offset,
        })
    }

    /// Square grid of `n x n` samples centred on the optical axis.
    pub fn square(n: usize, spacing: f64) -> OpticsResult<Self> {
        Self::new([n, n], [spacing, spacing], [0.0, 0.0])
    }

    /// Grid using the spacing of the active configuration scope.
    pub fn from_config(shape: [usize; 2]) -> OpticsResult<Self> {
        let cfg = config::current();
        Self::new(shape, cfg.default_spacing, [0.0, 0.0])
    }

    /// Same lattice shifted to a new centre.
    pub fn with_offset(&self, offset: [f64; 2]) -> OpticsResult<Self> {
        Self::new(self.shape, self.spacing, offset)
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn spacing(&self) -> [f64; 2] {
        self.spacing
    }

    pub fn offset(&self) -> [f64; 2] {
        self.offset
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Area of one sample cell.
    pub fn cell_area(&self) -> f64 {
        self.spacing[0] * self.spacing[1]
    }

    /// Physical side lengths `N * d`.
    pub fn extent(&self) -> [f64; 2] {
        [
            self.shape[0] as f64 * self.spacing[0],
            self.shape[1] as f64 * self.spacing[1],
        ]
    }

    /// Coordinates of the first and last samples along each axis:
    /// `[x_min, x_max, y_min, y_max]`.
    pub fn bounds(&self) -> [f64; 4] {
        let hx = (self.shape[0] as f64 - 1.0) / 2.0 * self.spacing[0];
        let hy = (self.shape[1] as f64 - 1.0) / 2.0 * self.spacing[1];
        [
            self.offset[0] - hx,
            self.offset[0] + hx,
            self.offset[1] - hy,
            self.offset[1] + hy,
        ]
    }

    /// Check shape, spacing and offset agreement within `tolerance`
    /// (relative to the spacing).
    pub fn compatible(&self, other: &Grid, tolerance: f64) -> bool {
        if self.shape != other.shape {
            return false;
        }
        (0..2).all(|axis| {
            let scale = self.spacing[axis].abs().max(other.spacing[axis].abs());
            (self.spacing[axis] - other.spacing[axis]).abs() <= tolerance * scale
                && (self.offset[axis] - other.offset[axis]).abs() <= tolerance * scale
        })
    }

    /// [`Grid::compatible`] with [`GRID_TOLERANCE`].
    pub fn is_compatible(&self, other: &Grid) -> bool {
        self.compatible(other, GRID_TOLERANCE)
    }

    /// Sample positions along x.
    pub fn x_coords(&self) -> Array1<f64> {
        axis_coords(self.shape[0], self.spacing[0], self.offset[0])
    }

    /// Sample positions along y.
    pub fn y_coords(&self) -> Array1<f64> {
        axis_coords(self.shape[1], self.spacing[1], self.offset[1])
    }

    /// Coordinate arrays of shape `(Nx, Ny)` ("ij" indexing).
    pub fn meshgrid(&self) -> (Array2<f64>, Array2<f64>) {
        let xs = self.x_coords();
        let ys = self.y_coords();
        let x = Array2::from_shape_fn((self.shape[0], self.shape[1]), |(i, _)| xs[i]);
        let y = Array2::from_shape_fn((self.shape[0], self.shape[1]), |(_, j)| ys[j]);
        (x, y)
    }

    /// `x^2 + y^2` at each sample.
    pub fn radius_squared(&self) -> Array2<f64> {
        let (x, y) = self.meshgrid();
        &x * &x + &y * &y
    }

    /// One-line description used in mismatch errors.
    pub fn describe(&self) -> String {
        format!(
            "shape={:?}, spacing={:?}, offset={:?}",
            self.shape, self.spacing, self.offset
        )
    }
}

fn axis_coords(n: usize, spacing: f64, offset: f64) -> Array1<f64> {
    let center = (n as f64 - 1.0) / 2.0;
    Array1::from_shape_fn(n, |i| offset + (i as f64 - center) * spacing)
}
