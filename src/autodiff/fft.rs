//! Two-dimensional DFT over the trailing axes of a complex array.

use ndarray::Axis;
use num_complex::Complex64;
use rustfft::FftPlanner;

use super::CArray;

/// Unnormalized forward transform, or inverse scaled by `1 / (N1 * N2)`.
pub(crate) fn fft2(input: &CArray, inverse: bool) -> CArray {
    let mut out = input.as_standard_layout().into_owned();
    let ndim = out.ndim();
    let mut planner = FftPlanner::<f64>::new();

    for axis in [ndim - 1, ndim - 2] {
        let n = out.shape()[axis];
        let plan = if inverse {
            planner.plan_fft_inverse(n)
        } else {
            planner.plan_fft_forward(n)
        };
        let mut buffer = vec![Complex64::new(0.0, 0.0); n];
        let mut scratch = vec![Complex64::new(0.0, 0.0); plan.get_inplace_scratch_len()];
        for mut lane in out.lanes_mut(Axis(axis)) {
            for (slot, value) in buffer.iter_mut().zip(lane.iter()) {
                *slot = *value;
            }
            plan.process_with_scratch(&mut buffer, &mut scratch);
            for (value, slot) in lane.iter_mut().zip(buffer.iter()) {
                *value = *slot;
            }
        }
    }

    if inverse {
        let scale = 1.0 / (out.shape()[ndim - 1] * out.shape()[ndim - 2]) as f64;
        out.mapv_inplace(|v| v * scale);
    }
    out
}
