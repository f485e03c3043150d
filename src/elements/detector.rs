//! Detectors: per-cell power, weighted intensity and field overlap.

use ndarray::{Array3, ArrayD};
use num_complex::Complex64;

use super::Placement;
use crate::autodiff::Tensor;
use crate::error::{OpticsError, OpticsResult};
use crate::field::{Field, FieldKind};
use crate::grid::Grid;
use crate::param::Param;

#[derive(Debug, Clone)]
pub enum DetectorKind {
    /// Power per cell, `I dA`, shape `batch ++ [Nx, Ny]`.
    Power,
    /// `Σ w_c I dA` per channel, real weights `[C, Nx, Ny]`.
    Weighted(Param),
    /// `|Σ w_c u dA|²` per channel, complex weights `[C, Nx, Ny]`.
    FieldOverlap(Param),
}

/// Terminal element turning a field into a real measurement.
#[derive(Debug, Clone)]
pub struct Detector {
    placement: Placement,
    kind: DetectorKind,
}

impl Detector {
    /// Create new per-cell power detector.
    pub fn power(grid: Grid, z: f64) -> OpticsResult<Self> {
        Ok(Self {
            placement: Placement::new(grid, z)?,
            kind: DetectorKind::Power,
        })
    }

    /// Create new detector integrating intensity against real channel
    /// weights `[C, Nx, Ny]`.
    pub fn weighted(grid: Grid, weights: Array3<f64>, z: f64) -> OpticsResult<Self> {
        check_weights(&grid, weights.dim())?;
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(OpticsError::invalid("weights", "must be finite"));
        }
        Ok(Self {
            placement: Placement::new(grid, z)?,
            kind: DetectorKind::Weighted(Param::real("weights", weights.into_dyn(), false)),
        })
    }

    /// Create new detector measuring `|Σ w_c u dA|²` for complex channel
    /// weights `[C, Nx, Ny]`. Pass conjugated modes to get coupling
    /// efficiencies.
    pub fn field_overlap(grid: Grid, weights: Array3<Complex64>, z: f64) -> OpticsResult<Self> {
        check_weights(&grid, weights.dim())?;
        Ok(Self {
            placement: Placement::new(grid, z)?,
            kind: DetectorKind::FieldOverlap(Param::complex("weights", weights.into_dyn(), false)),
        })
    }

    /// Make the axial position trainable.
    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub fn kind(&self) -> &DetectorKind {
        &self.kind
    }

    /// Number of output channels, `None` for per-cell power.
    pub fn channels(&self) -> Option<usize> {
        match &self.kind {
            DetectorKind::Power => None,
            DetectorKind::Weighted(w) | DetectorKind::FieldOverlap(w) => Some(w.shape()[0]),
        }
    }

    pub(crate) fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn parameters(&self) -> Vec<Param> {
        match &self.kind {
            DetectorKind::Power => Vec::new(),
            DetectorKind::Weighted(w) | DetectorKind::FieldOverlap(w) => vec![w.clone()],
        }
    }

    /// Channel weights summed over channels, for display.
    pub(crate) fn weight_map(&self) -> Option<ArrayD<f64>> {
        match &self.kind {
            DetectorKind::Power => None,
            DetectorKind::Weighted(w) => Some(w.real_value().sum_axis(ndarray::Axis(0))),
            DetectorKind::FieldOverlap(w) => {
                Some(w.value().mapv(|v| v.norm()).sum_axis(ndarray::Axis(0)))
            }
        }
    }

    /// Measure a field already on the detector grid.
    pub fn measure(&self, field: &Field) -> OpticsResult<Tensor> {
        field.ensure_grid(self.placement.grid())?;
        let area = field.grid().cell_area();
        match &self.kind {
            DetectorKind::Power => Ok(field.intensity()?.scale_real(area)),
            DetectorKind::Weighted(w) => {
                let intensity = field.intensity()?;
                let axis = intensity.ndim() - 2;
                Ok(intensity
                    .unsqueeze(axis)?
                    .mul(w.tensor())?
                    .sum_trailing(2)?
                    .scale_real(area))
            }
            DetectorKind::FieldOverlap(w) => {
                if field.kind() != FieldKind::Coherent {
                    return Err(OpticsError::invalid(
                        "field",
                        format!("field overlap needs a coherent field, got {:?}", field.kind()),
                    ));
                }
                let data = field.data();
                let axis = data.ndim() - 2;
                Ok(data
                    .unsqueeze(axis)?
                    .mul(w.tensor())?
                    .sum_trailing(2)?
                    .scale_real(area)
                    .abs2())
            }
        }
    }
}

fn check_weights(grid: &Grid, dim: (usize, usize, usize)) -> OpticsResult<()> {
    let [nx, ny] = grid.shape();
    if (dim.1, dim.2) != (nx, ny) || dim.0 == 0 {
        return Err(OpticsError::shape(
            format!("[C, {}, {}] with C > 0", nx, ny),
            [dim.0, dim.1, dim.2],
        ));
    }
    Ok(())
}
