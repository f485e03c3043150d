//! Numpy-style broadcasting helpers shared by the elementwise ops.

use ndarray::{Axis, IxDyn, Zip};
use num_complex::Complex64;

use super::CArray;
use crate::error::{OpticsError, OpticsResult};

/// Right-aligned broadcast of two shapes.
pub(crate) fn broadcast_shape(a: &[usize], b: &[usize]) -> OpticsResult<Vec<usize>> {
    let n = a.len().max(b.len());
    let dim = |shape: &[usize], i: usize| {
        let lead = n - shape.len();
        if i >= lead {
            shape[i - lead]
        } else {
            1
        }
    };
    (0..n)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Ok(x),
            (1, y) => Ok(y),
            (x, 1) => Ok(x),
            _ => Err(OpticsError::shape(a, b)),
        })
        .collect()
}

/// Apply `f` elementwise after broadcasting both operands to `shape`.
pub(crate) fn zip_broadcast(
    a: &CArray,
    b: &CArray,
    shape: &[usize],
    f: impl Fn(Complex64, Complex64) -> Complex64,
) -> OpticsResult<CArray> {
    let a_view = a
        .broadcast(IxDyn(shape))
        .ok_or_else(|| OpticsError::shape(shape, a.shape()))?;
    let b_view = b
        .broadcast(IxDyn(shape))
        .ok_or_else(|| OpticsError::shape(shape, b.shape()))?;
    Ok(Zip::from(&a_view)
        .and(&b_view)
        .map_collect(|&x, &y| f(x, y)))
}

/// Sum a broadcast gradient back down to the operand shape.
pub(crate) fn sum_to_shape(grad: CArray, shape: &[usize]) -> CArray {
    let mut grad = grad;
    while grad.ndim() > shape.len() {
        grad = grad.sum_axis(Axis(0));
    }
    for (axis, &dim) in shape.iter().enumerate() {
        if dim == 1 && grad.shape()[axis] != 1 {
            grad = grad.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn test_broadcast_shape_rules() {
        assert_eq!(broadcast_shape(&[3, 1, 5], &[4, 5]).unwrap(), vec![3, 4, 5]);
        assert_eq!(broadcast_shape(&[], &[2, 2]).unwrap(), vec![2, 2]);
        assert!(broadcast_shape(&[3, 4], &[2, 4]).is_err());
    }

    #[test]
    fn test_sum_to_shape_reduces_broadcast_axes() {
        let grad = ArrayD::from_elem(IxDyn(&[2, 3, 4]), Complex64::new(1.0, 0.0));
        let reduced = sum_to_shape(grad, &[3, 1]);
        assert_eq!(reduced.shape(), &[3, 1]);
        assert!(reduced.iter().all(|v| (v.re - 8.0).abs() < 1e-12));
    }
}
