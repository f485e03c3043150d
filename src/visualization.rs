//! Plot-ready snapshots of fields and elements.
//!
//! Nothing is rendered here; [`VisualizationData`] carries a 2D array with
//! its value range, colormap name and physical extent, and serializes to
//! JSON for an external plotting tool.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::elements::{Element, ModulationKind};
use crate::error::{OpticsError, OpticsResult};
use crate::field::{real_data, Field, FieldKind};
use crate::grid::Grid;

/// Quantity extracted from complex samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    Intensity,
    Amplitude,
    Phase,
    Real,
    Imaginary,
}

impl Quantity {
    fn colormap(self) -> &'static str {
        match self {
            Quantity::Intensity | Quantity::Amplitude => "inferno",
            Quantity::Phase => "twilight",
            Quantity::Real | Quantity::Imaginary => "RdBu",
        }
    }

    fn extract(self, v: Complex64) -> f64 {
        match self {
            Quantity::Intensity => v.norm_sqr(),
            Quantity::Amplitude => v.norm(),
            Quantity::Phase => v.arg(),
            Quantity::Real => v.re,
            Quantity::Imaginary => v.im,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    pub title: String,
    /// `[Nx, Ny]`
    pub values: Array2<f64>,
    pub vmin: f64,
    pub vmax: f64,
    pub colormap: String,
    /// `[x_min, x_max, y_min, y_max]`
    pub extent: [f64; 4],
}

impl VisualizationData {
    fn new(title: impl Into<String>, values: Array2<f64>, quantity: Quantity, grid: &Grid) -> Self {
        let (vmin, vmax) = match quantity {
            Quantity::Phase => (-PI, PI),
            _ => values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        };
        Self {
            title: title.into(),
            values,
            vmin,
            vmax,
            colormap: quantity.colormap().to_string(),
            extent: grid.bounds(),
        }
    }

    pub fn to_json(&self) -> OpticsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Select the plane at `index` over the leading axes of `values`.
fn plane(values: ArrayD<f64>, index: &[usize]) -> OpticsResult<Array2<f64>> {
    let lead = values.ndim().saturating_sub(2);
    if index.len() != lead {
        return Err(OpticsError::shape(
            format!("{} leading indices", lead),
            index.len(),
        ));
    }
    let mut view = values.view();
    for &i in index {
        if i >= view.len_of(Axis(0)) {
            return Err(OpticsError::shape(
                format!("index below {}", view.len_of(Axis(0))),
                i,
            ));
        }
        view = view.index_axis_move(Axis(0), i);
    }
    view.to_owned()
        .into_dimensionality::<Ix2>()
        .map_err(|e| OpticsError::shape("a 2D plane", e.to_string()))
}

impl Field {
    /// Snapshot of one plane. `index` selects over the batch axes for
    /// intensity, and over every axis before `[Nx, Ny]` otherwise (batch,
    /// then polarization component or mode).
    pub fn visualize(&self, quantity: Quantity, index: &[usize]) -> OpticsResult<VisualizationData> {
        let values = match quantity {
            Quantity::Intensity => self.intensity()?.to_real(),
            _ if self.kind() == FieldKind::MutualCoherence => {
                return Err(OpticsError::invalid(
                    "quantity",
                    "only intensity is defined for a mutual coherence field",
                ))
            }
            _ => self.data().value().mapv(|v| quantity.extract(v)),
        };
        let title = format!("{:?} {:?} at z = {:.3e} m", self.kind(), quantity, self.z().item().re);
        Ok(VisualizationData::new(title, plane(values, index)?, quantity, self.grid()))
    }
}

impl Element {
    /// Snapshot of the element profile.
    pub fn visualize(&self) -> OpticsResult<VisualizationData> {
        let grid = *self.grid();
        let [nx, ny] = grid.shape();
        let full = |values: ArrayD<f64>| -> OpticsResult<Array2<f64>> {
            values
                .broadcast(IxDyn(&[nx, ny]))
                .ok_or_else(|| OpticsError::shape([nx, ny], values.shape()))?
                .to_owned()
                .into_dimensionality::<Ix2>()
                .map_err(|e| OpticsError::shape([nx, ny], e.to_string()))
        };
        let (quantity, values) = match self {
            Element::Lens(lens) => {
                let reference = Field::new(
                    real_data(ArrayD::ones(IxDyn(&[nx, ny]))),
                    grid,
                    config::current().default_wavelength,
                    0.0,
                )?;
                let mask = lens.mask(&reference)?.value().mapv(|v| v.arg());
                (Quantity::Phase, full(mask)?)
            }
            Element::Modulator(m) => {
                let mask = m.mask_values();
                match m.kind() {
                    ModulationKind::Phase => (Quantity::Phase, full(mask.mapv(|v| v.arg()))?),
                    ModulationKind::Amplitude => (Quantity::Real, full(mask.mapv(|v| v.re))?),
                    ModulationKind::Complex => (Quantity::Amplitude, full(mask.mapv(|v| v.norm()))?),
                }
            }
            Element::Aperture(a) => (Quantity::Amplitude, a.transmission().clone()),
            Element::PolarizationOptic(p) => {
                // transmitted intensity for x-polarized light
                let jones = p.jones_matrix()?.value();
                let column = jones.index_axis(Axis(1), 0).mapv(|v| v.norm_sqr());
                (Quantity::Intensity, full(column.sum_axis(Axis(0)))?)
            }
            Element::Detector(d) => match d.weight_map() {
                Some(weights) => (Quantity::Real, full(weights)?),
                None => (Quantity::Real, Array2::ones((nx, ny))),
            },
        };
        let title = format!("{} at z = {:.3e} m", self.name(), self.z_value());
        Ok(VisualizationData::new(title, values, quantity, &grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Tensor;
    use crate::elements::{Aperture, Lens, PolarizationOptic};
    use approx::assert_abs_diff_eq;

    fn grid() -> Grid {
        Grid::square(4, 1.0).unwrap()
    }

    #[test]
    fn test_field_intensity_snapshot() {
        let data = real_data(ArrayD::from_elem(IxDyn(&[2, 4, 4]), 2.0));
        let field = Field::new(data, grid(), 1e-6, 0.0).unwrap();
        let snap = field.visualize(Quantity::Intensity, &[1]).unwrap();
        assert_eq!(snap.values.dim(), (4, 4));
        assert_abs_diff_eq!(snap.vmax, 4.0);
        assert_eq!(snap.extent, [-1.5, 1.5, -1.5, 1.5]);
        assert!(field.visualize(Quantity::Intensity, &[]).is_err());
        assert!(field.visualize(Quantity::Intensity, &[2]).is_err());
    }

    #[test]
    fn test_phase_snapshot_range() {
        let data = Tensor::constant(ArrayD::from_elem(IxDyn(&[4, 4]), Complex64::new(0.0, 1.0)));
        let field = Field::new(data, grid(), 1e-6, 0.0).unwrap();
        let snap = field.visualize(Quantity::Phase, &[]).unwrap();
        assert_abs_diff_eq!(snap.values[[0, 0]], PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(snap.vmin, -PI);
        assert_eq!(snap.colormap, "twilight");
    }

    #[test]
    fn test_element_snapshots() {
        let aperture: Element = Aperture::circular(grid(), 1.0, 0.0).unwrap().into();
        let snap = aperture.visualize().unwrap();
        assert_abs_diff_eq!(snap.values.sum(), 4.0);

        let polarizer: Element = PolarizationOptic::linear_polarizer(grid(), 0.0, 0.0).unwrap().into();
        let snap = polarizer.visualize().unwrap();
        assert_abs_diff_eq!(snap.values[[2, 3]], 1.0, epsilon = 1e-12);

        let lens: Element = Lens::new(grid(), 1.0, 0.0).unwrap().into();
        let json = lens.visualize().unwrap().to_json().unwrap();
        assert!(json.contains("\"colormap\":\"twilight\""));
    }
}
