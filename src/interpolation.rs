//! Separable resampling between grids.
//!
//! Each axis is mapped with a sparse tap table, so resampling is linear in
//! the data and back-propagates through [`Tensor::interpolate_axis`]. Target
//! samples outside the source extent receive no taps and come out zero.

use std::sync::Arc;

use ndarray::Array1;

use crate::autodiff::{Taps, Tensor};
use crate::config::Interpolation;
use crate::error::OpticsResult;
use crate::grid::Grid;

const EDGE_TOLERANCE: f64 = 1e-9;

/// Taps mapping samples `x0 + j * dx`, `j < n_in`, onto `targets`.
pub(crate) fn axis_taps(
    n_in: usize,
    x0: f64,
    dx: f64,
    targets: &Array1<f64>,
    method: Interpolation,
) -> Taps {
    let last = (n_in - 1) as f64;
    let rows = targets
        .iter()
        .map(|&x| {
            let t = (x - x0) / dx;
            match method {
                Interpolation::Nearest => {
                    let j = (t + 0.5).floor();
                    if j >= 0.0 && j <= last {
                        vec![(j as usize, 1.0)]
                    } else {
                        Vec::new()
                    }
                }
                Interpolation::Bilinear => {
                    if t < -EDGE_TOLERANCE || t > last + EDGE_TOLERANCE {
                        return Vec::new();
                    }
                    let t = t.clamp(0.0, last);
                    let j0 = t.floor();
                    let frac = t - j0;
                    let j0 = j0 as usize;
                    if frac <= EDGE_TOLERANCE || j0 + 1 >= n_in {
                        vec![(j0, 1.0)]
                    } else {
                        vec![(j0, 1.0 - frac), (j0 + 1, frac)]
                    }
                }
            }
        })
        .collect();
    Arc::new(rows)
}

/// Resample the spatial pair of axes starting at `x_axis` from `source` to
/// `target`.
pub(crate) fn resample_plane(
    data: &Tensor,
    x_axis: usize,
    source: &Grid,
    target: &Grid,
    method: Interpolation,
) -> OpticsResult<Tensor> {
    let [x_min, _, y_min, _] = source.bounds();
    let [nx, ny] = source.shape();
    let [dx, dy] = source.spacing();
    let x_taps = axis_taps(nx, x_min, dx, &target.x_coords(), method);
    let y_taps = axis_taps(ny, y_min, dy, &target.y_coords(), method);
    data.interpolate_axis(x_axis, x_taps)?
        .interpolate_axis(x_axis + 1, y_taps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn test_bilinear_taps_split_between_neighbours() {
        let taps = axis_taps(4, 0.0, 1.0, &array![0.0, 1.25, 3.0, 3.5, -0.2], Interpolation::Bilinear);
        assert_eq!(taps[0], vec![(0, 1.0)]);
        assert_eq!(taps[1].len(), 2);
        assert_abs_diff_eq!(taps[1][0].1, 0.75);
        assert_abs_diff_eq!(taps[1][1].1, 0.25);
        assert_eq!(taps[2], vec![(3, 1.0)]);
        assert!(taps[3].is_empty());
        assert!(taps[4].is_empty());
    }

    #[test]
    fn test_nearest_taps_cover_half_a_cell() {
        let taps = axis_taps(3, 0.0, 1.0, &array![-0.5, 0.4, 2.6], Interpolation::Nearest);
        assert_eq!(taps[0], vec![(0, 1.0)]);
        assert_eq!(taps[1], vec![(0, 1.0)]);
        assert!(taps[2].is_empty());
    }

    #[test]
    fn test_identity_resample() {
        let grid = Grid::new([3, 4], [1.0, 2.0], [0.5, 0.0]).unwrap();
        let data = Tensor::from_real(ArrayD::from_shape_fn(IxDyn(&[3, 4]), |i| {
            (i[0] * 4 + i[1]) as f64
        }));
        let out = resample_plane(&data, 0, &grid, &grid, Interpolation::Bilinear).unwrap();
        assert_eq!(*out.value(), *data.value());
    }

    #[test]
    fn test_upsampling_interpolates_linearly() {
        let coarse = Grid::new([2, 1], [2.0, 1.0], [0.0, 0.0]).unwrap();
        let fine = Grid::new([3, 1], [1.0, 1.0], [0.0, 0.0]).unwrap();
        let data = Tensor::from_real(array![[0.0], [4.0]].into_dyn());
        let out = resample_plane(&data, 0, &coarse, &fine, Interpolation::Bilinear).unwrap();
        let values = out.to_real();
        assert_abs_diff_eq!(values[[0, 0]], 0.0);
        assert_abs_diff_eq!(values[[1, 0]], 2.0);
        assert_abs_diff_eq!(values[[2, 0]], 4.0);
    }
}
