//! Differentiable primitives.
//!
//! Elementwise arithmetic broadcasts numpy-style. Ops documented as "real"
//! read the real part of their input and return a real result; their
//! adjoints project the incoming gradient onto the real axis.

use std::sync::Arc;

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use num_complex::Complex64;

use super::broadcast::{broadcast_shape, sum_to_shape, zip_broadcast};
use super::fft::fft2;
use super::{BackwardOp, CArray, Tensor};
use crate::error::{OpticsError, OpticsResult};

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// Interpolation taps: for every output index, `(input index, weight)` pairs.
pub(crate) type Taps = Arc<Vec<Vec<(usize, f64)>>>;

fn real(v: f64) -> Complex64 {
    Complex64::new(v, 0.0)
}

/// Copy into a fresh standard-layout array of the given shape.
fn reshape_owned(array: &CArray, shape: &[usize]) -> CArray {
    let mut out = ArrayD::zeros(IxDyn(shape));
    out.iter_mut().zip(array.iter()).for_each(|(o, v)| *o = *v);
    out
}

impl Tensor {
    /// Elementwise sum with broadcasting.
    pub fn add(&self, other: &Tensor) -> OpticsResult<Tensor> {
        let (a, b) = (self.value(), other.value());
        let shape = broadcast_shape(a.shape(), b.shape())?;
        let out = zip_broadcast(&a, &b, &shape, |x, y| x + y)?;
        Ok(Tensor::from_op(
            out,
            Add {
                lhs: self.clone(),
                rhs: other.clone(),
                negate_rhs: false,
            },
        ))
    }

    /// Elementwise difference with broadcasting.
    pub fn sub(&self, other: &Tensor) -> OpticsResult<Tensor> {
        let (a, b) = (self.value(), other.value());
        let shape = broadcast_shape(a.shape(), b.shape())?;
        let out = zip_broadcast(&a, &b, &shape, |x, y| x - y)?;
        Ok(Tensor::from_op(
            out,
            Add {
                lhs: self.clone(),
                rhs: other.clone(),
                negate_rhs: true,
            },
        ))
    }

    /// Elementwise product with broadcasting.
    pub fn mul(&self, other: &Tensor) -> OpticsResult<Tensor> {
        let (a, b) = (self.value(), other.value());
        let shape = broadcast_shape(a.shape(), b.shape())?;
        let out = zip_broadcast(&a, &b, &shape, |x, y| x * y)?;
        Ok(Tensor::from_op(
            out,
            Mul {
                lhs: self.clone(),
                rhs: other.clone(),
                lhs_val: a,
                rhs_val: b,
            },
        ))
    }

    /// Elementwise quotient with broadcasting.
    pub fn div(&self, other: &Tensor) -> OpticsResult<Tensor> {
        let (a, b) = (self.value(), other.value());
        let shape = broadcast_shape(a.shape(), b.shape())?;
        let out = zip_broadcast(&a, &b, &shape, |x, y| x / y)?;
        Ok(Tensor::from_op(
            out,
            Div {
                lhs: self.clone(),
                rhs: other.clone(),
                lhs_val: a,
                rhs_val: b,
            },
        ))
    }

    /// Multiply by a complex constant.
    pub fn scale(&self, factor: Complex64) -> Tensor {
        let out = self.value().mapv(|v| v * factor);
        Tensor::from_op(
            out,
            Scale {
                input: self.clone(),
                factor,
            },
        )
    }

    /// Multiply by a real constant.
    pub fn scale_real(&self, factor: f64) -> Tensor {
        self.scale(real(factor))
    }

    pub fn neg(&self) -> Tensor {
        self.scale_real(-1.0)
    }

    /// Complex exponential.
    pub fn exp(&self) -> Tensor {
        let out = Arc::new(self.value().mapv(|v| v.exp()));
        Tensor::from_op(
            (*out).clone(),
            Exp {
                input: self.clone(),
                out_val: out,
            },
        )
    }

    /// Complex conjugate.
    pub fn conj(&self) -> Tensor {
        let out = self.value().mapv(|v| v.conj());
        Tensor::from_op(out, Conj { input: self.clone() })
    }

    /// Squared modulus (real).
    pub fn abs2(&self) -> Tensor {
        let input = self.value();
        let out = input.mapv(|v| real(v.norm_sqr()));
        Tensor::from_op(
            out,
            Abs2 {
                input: self.clone(),
                in_val: input,
            },
        )
    }

    /// Real part (real).
    pub fn real(&self) -> Tensor {
        let out = self.value().mapv(|v| real(v.re));
        Tensor::from_op(out, RealPart { input: self.clone() })
    }

    /// Cosine of the real part (real).
    pub fn cos(&self) -> Tensor {
        let input = self.value();
        let out = input.mapv(|v| real(v.re.cos()));
        Tensor::from_op(
            out,
            Trig {
                input: self.clone(),
                in_val: input,
                sine: false,
            },
        )
    }

    /// Sine of the real part (real).
    pub fn sin(&self) -> Tensor {
        let input = self.value();
        let out = input.mapv(|v| real(v.re.sin()));
        Tensor::from_op(
            out,
            Trig {
                input: self.clone(),
                in_val: input,
                sine: true,
            },
        )
    }

    /// `sqrt(Re x)` where `Re x > 0`, zero elsewhere (real).
    ///
    /// The derivative is zero wherever the value is masked, so no infinite or
    /// undefined gradients leak out of the excluded region.
    pub fn masked_sqrt(&self) -> Tensor {
        let out = Arc::new(
            self.value()
                .mapv(|v| real(if v.re > 0.0 { v.re.sqrt() } else { 0.0 })),
        );
        Tensor::from_op(
            (*out).clone(),
            MaskedSqrt {
                input: self.clone(),
                out_val: out,
            },
        )
    }

    /// View the same elements under a new shape.
    pub fn reshape(&self, shape: &[usize]) -> OpticsResult<Tensor> {
        let input = self.value();
        if shape.iter().product::<usize>() != input.len() {
            return Err(OpticsError::shape(shape, input.shape()));
        }
        let out = reshape_owned(&input, shape);
        Ok(Tensor::from_op(
            out,
            Reshape {
                input: self.clone(),
                in_shape: input.shape().to_vec(),
            },
        ))
    }

    /// Append `count` unit axes.
    pub fn unsqueeze_trailing(&self, count: usize) -> OpticsResult<Tensor> {
        let mut shape = self.shape();
        shape.extend(std::iter::repeat(1).take(count));
        self.reshape(&shape)
    }

    /// Insert a unit axis at `axis`.
    pub fn unsqueeze(&self, axis: usize) -> OpticsResult<Tensor> {
        let mut shape = self.shape();
        if axis > shape.len() {
            return Err(OpticsError::shape(format!("axis <= {}", shape.len()), axis));
        }
        shape.insert(axis, 1);
        self.reshape(&shape)
    }

    /// Reorder axes; `axes[i]` is the input axis placed at position `i`.
    pub fn permute(&self, axes: &[usize]) -> OpticsResult<Tensor> {
        let input = self.value();
        let mut sorted = axes.to_vec();
        sorted.sort_unstable();
        if sorted != (0..input.ndim()).collect::<Vec<_>>() {
            return Err(OpticsError::shape(
                format!("a permutation of 0..{}", input.ndim()),
                axes,
            ));
        }
        let out = input
            .view()
            .permuted_axes(IxDyn(axes))
            .as_standard_layout()
            .into_owned();
        let mut inverse = vec![0; axes.len()];
        for (position, &axis) in axes.iter().enumerate() {
            inverse[axis] = position;
        }
        Ok(Tensor::from_op(
            out,
            Permute {
                input: self.clone(),
                inverse,
            },
        ))
    }

    /// Sum of all elements, as a zero-dimensional tensor.
    pub fn sum(&self) -> Tensor {
        let input = self.value();
        let total = input.iter().fold(ZERO, |acc, v| acc + v);
        Tensor::from_op(
            ArrayD::from_elem(IxDyn(&[]), total),
            SumAll {
                input: self.clone(),
                in_shape: input.shape().to_vec(),
            },
        )
    }

    /// Sum over one axis, removing it.
    pub fn sum_axis(&self, axis: usize) -> OpticsResult<Tensor> {
        let input = self.value();
        if axis >= input.ndim() {
            return Err(OpticsError::shape(format!("axis < {}", input.ndim()), axis));
        }
        let out = input.sum_axis(Axis(axis));
        Ok(Tensor::from_op(
            out,
            SumAxis {
                input: self.clone(),
                axis,
                in_shape: input.shape().to_vec(),
            },
        ))
    }

    /// Sum over the trailing `count` axes.
    pub fn sum_trailing(&self, count: usize) -> OpticsResult<Tensor> {
        let mut out = self.clone();
        for _ in 0..count {
            let ndim = out.ndim();
            if ndim == 0 {
                return Err(OpticsError::shape(format!("at least {} axes", count), self.shape()));
            }
            out = out.sum_axis(ndim - 1)?;
        }
        Ok(out)
    }

    /// Take index `index` along `axis`, removing the axis.
    pub fn select(&self, axis: usize, index: usize) -> OpticsResult<Tensor> {
        let input = self.value();
        if axis >= input.ndim() || index >= input.shape()[axis] {
            return Err(OpticsError::shape(
                input.shape(),
                format!("index {} on axis {}", index, axis),
            ));
        }
        let out = input.index_axis(Axis(axis), index).to_owned();
        Ok(Tensor::from_op(
            out,
            Select {
                input: self.clone(),
                axis,
                index,
                in_shape: input.shape().to_vec(),
            },
        ))
    }

    /// Stack equally shaped tensors along a new axis.
    pub fn stack(parts: &[Tensor], axis: usize) -> OpticsResult<Tensor> {
        let values: Vec<Arc<CArray>> = parts.iter().map(Tensor::value).collect();
        let first = values
            .first()
            .ok_or_else(|| OpticsError::shape("at least one tensor", 0))?;
        // Broadcast every part to a common shape first.
        let mut shape = first.shape().to_vec();
        for value in &values[1..] {
            shape = broadcast_shape(&shape, value.shape())?;
        }
        if axis > shape.len() {
            return Err(OpticsError::shape(format!("axis <= {}", shape.len()), axis));
        }
        let broadcast: Vec<CArray> = values
            .iter()
            .map(|v| {
                v.broadcast(IxDyn(&shape))
                    .map(|view| view.to_owned())
                    .ok_or_else(|| OpticsError::shape(&shape, v.shape()))
            })
            .collect::<OpticsResult<_>>()?;
        let views: Vec<_> = broadcast.iter().map(|v| v.view()).collect();
        let out = ndarray::stack(Axis(axis), &views)
            .map_err(|e| OpticsError::shape(&shape, e.to_string()))?;
        Ok(Tensor::from_op(
            out,
            Stack {
                inputs: parts.to_vec(),
                in_shapes: values.iter().map(|v| v.shape().to_vec()).collect(),
                axis,
            },
        ))
    }

    /// Forward DFT over the trailing two axes (unnormalized).
    pub fn fft2(&self) -> OpticsResult<Tensor> {
        self.spectral(false)
    }

    /// Inverse DFT over the trailing two axes (scaled by `1/N`).
    pub fn ifft2(&self) -> OpticsResult<Tensor> {
        self.spectral(true)
    }

    fn spectral(&self, inverse: bool) -> OpticsResult<Tensor> {
        let input = self.value();
        if input.ndim() < 2 {
            return Err(OpticsError::shape("at least 2 axes", input.shape()));
        }
        Ok(Tensor::from_op(
            fft2(&input, inverse),
            Spectral {
                input: self.clone(),
                inverse,
            },
        ))
    }

    /// Zero-pad the trailing two axes to `size`, placing the input at `start`.
    pub fn embed(&self, size: [usize; 2], start: [usize; 2]) -> OpticsResult<Tensor> {
        let input = self.value();
        let inner = trailing2(&input)?;
        if start[0] + inner[0] > size[0] || start[1] + inner[1] > size[1] {
            return Err(OpticsError::shape(size, (start, inner)));
        }
        Ok(Tensor::from_op(
            embed_array(&input, size, start),
            Embed {
                input: self.clone(),
                start,
                inner,
            },
        ))
    }

    /// Crop the trailing two axes to `size` starting at `start`.
    pub fn window(&self, start: [usize; 2], size: [usize; 2]) -> OpticsResult<Tensor> {
        let input = self.value();
        let outer = trailing2(&input)?;
        if start[0] + size[0] > outer[0] || start[1] + size[1] > outer[1] {
            return Err(OpticsError::shape(outer, (start, size)));
        }
        Ok(Tensor::from_op(
            window_array(&input, start, size),
            Window {
                input: self.clone(),
                start,
                outer,
            },
        ))
    }

    /// Linear map along `axis`: `out[i] = sum_k w_k * in[j_k]` over `taps[i]`.
    pub(crate) fn interpolate_axis(&self, axis: usize, taps: Taps) -> OpticsResult<Tensor> {
        let input = self.value();
        if axis >= input.ndim() {
            return Err(OpticsError::shape(format!("axis < {}", input.ndim()), axis));
        }
        let n_in = input.shape()[axis];
        if taps.iter().flatten().any(|&(j, _)| j >= n_in) {
            return Err(OpticsError::shape(format!("tap indices < {}", n_in), axis));
        }
        let mut shape = input.shape().to_vec();
        shape[axis] = taps.len();
        let mut out = ArrayD::zeros(IxDyn(&shape));
        for (i, row) in taps.iter().enumerate() {
            let mut lane = out.index_axis_mut(Axis(axis), i);
            for &(j, w) in row {
                lane.scaled_add(real(w), &input.index_axis(Axis(axis), j));
            }
        }
        Ok(Tensor::from_op(
            out,
            Interpolate {
                input: self.clone(),
                axis,
                taps,
                n_in,
            },
        ))
    }

    /// Diagonal of the trailing two axes, which must be square.
    pub fn diagonal(&self) -> OpticsResult<Tensor> {
        let input = self.value();
        let [n, m] = trailing2(&input)?;
        if n != m {
            return Err(OpticsError::shape("square trailing axes", input.shape()));
        }
        let ndim = input.ndim();
        let mut shape = input.shape()[..ndim - 1].to_vec();
        shape[ndim - 2] = n;
        let mut out = ArrayD::zeros(IxDyn(&shape));
        for k in 0..n {
            let source = input
                .index_axis(Axis(ndim - 1), k)
                .index_axis_move(Axis(ndim - 2), k);
            out.index_axis_mut(Axis(ndim - 2), k).assign(&source);
        }
        Ok(Tensor::from_op(out, Diagonal { input: self.clone(), n }))
    }
}

fn trailing2(array: &CArray) -> OpticsResult<[usize; 2]> {
    let ndim = array.ndim();
    if ndim < 2 {
        return Err(OpticsError::shape("at least 2 axes", array.shape()));
    }
    Ok([array.shape()[ndim - 2], array.shape()[ndim - 1]])
}

fn embed_array(input: &CArray, size: [usize; 2], start: [usize; 2]) -> CArray {
    let ndim = input.ndim();
    let mut shape = input.shape().to_vec();
    shape[ndim - 2] = size[0];
    shape[ndim - 1] = size[1];
    let mut out = ArrayD::zeros(IxDyn(&shape));
    let inner = [input.shape()[ndim - 2], input.shape()[ndim - 1]];
    out.slice_each_axis_mut(|ax| trailing_slice(ax.axis.index(), ndim, start, inner))
        .assign(input);
    out
}

fn window_array(input: &CArray, start: [usize; 2], size: [usize; 2]) -> CArray {
    let ndim = input.ndim();
    input
        .slice_each_axis(|ax| trailing_slice(ax.axis.index(), ndim, start, size))
        .to_owned()
}

fn trailing_slice(axis: usize, ndim: usize, start: [usize; 2], size: [usize; 2]) -> Slice {
    if axis + 2 < ndim {
        Slice::from(..)
    } else {
        let k = axis + 2 - ndim;
        Slice::from(start[k]..start[k] + size[k])
    }
}

struct Add {
    lhs: Tensor,
    rhs: Tensor,
    negate_rhs: bool,
}

impl BackwardOp for Add {
    fn name(&self) -> &'static str {
        if self.negate_rhs {
            "sub"
        } else {
            "add"
        }
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.lhs.clone(), self.rhs.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let lhs = self
            .lhs
            .requires_grad()
            .then(|| sum_to_shape(grad.clone(), &self.lhs.shape()));
        let rhs = self.rhs.requires_grad().then(|| {
            let g = if self.negate_rhs {
                grad.mapv(|v| -v)
            } else {
                grad.clone()
            };
            sum_to_shape(g, &self.rhs.shape())
        });
        vec![lhs, rhs]
    }
}

struct Mul {
    lhs: Tensor,
    rhs: Tensor,
    lhs_val: Arc<CArray>,
    rhs_val: Arc<CArray>,
}

impl BackwardOp for Mul {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.lhs.clone(), self.rhs.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let lhs = self.lhs.requires_grad().then(|| {
            let g = grad * &self.rhs_val.mapv(|b| b.conj());
            sum_to_shape(g, self.lhs_val.shape())
        });
        let rhs = self.rhs.requires_grad().then(|| {
            let g = grad * &self.lhs_val.mapv(|a| a.conj());
            sum_to_shape(g, self.rhs_val.shape())
        });
        vec![lhs, rhs]
    }
}

struct Div {
    lhs: Tensor,
    rhs: Tensor,
    lhs_val: Arc<CArray>,
    rhs_val: Arc<CArray>,
}

impl BackwardOp for Div {
    fn name(&self) -> &'static str {
        "div"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.lhs.clone(), self.rhs.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let lhs = self.lhs.requires_grad().then(|| {
            let g = grad * &self.rhs_val.mapv(|b| b.inv().conj());
            sum_to_shape(g, self.lhs_val.shape())
        });
        let rhs = self.rhs.requires_grad().then(|| {
            // d(a/b)/db = -a/b²
            let g = grad * &self.lhs_val.mapv(|a| a.conj());
            let g = g * &self.rhs_val.mapv(|b| (-(b * b).inv()).conj());
            sum_to_shape(g, self.rhs_val.shape())
        });
        vec![lhs, rhs]
    }
}

struct Scale {
    input: Tensor,
    factor: Complex64,
}

impl BackwardOp for Scale {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let factor = self.factor.conj();
        vec![Some(grad.mapv(|g| g * factor))]
    }
}

struct Exp {
    input: Tensor,
    out_val: Arc<CArray>,
}

impl BackwardOp for Exp {
    fn name(&self) -> &'static str {
        "exp"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = grad.clone();
        g.zip_mut_with(&self.out_val, |g, w| *g *= w.conj());
        vec![Some(g)]
    }
}

struct Conj {
    input: Tensor,
}

impl BackwardOp for Conj {
    fn name(&self) -> &'static str {
        "conj"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        vec![Some(grad.mapv(|g| g.conj()))]
    }
}

struct Abs2 {
    input: Tensor,
    in_val: Arc<CArray>,
}

impl BackwardOp for Abs2 {
    fn name(&self) -> &'static str {
        "abs2"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = grad.clone();
        g.zip_mut_with(&self.in_val, |g, z| *g = z * (2.0 * g.re));
        vec![Some(g)]
    }
}

struct RealPart {
    input: Tensor,
}

impl BackwardOp for RealPart {
    fn name(&self) -> &'static str {
        "real"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        vec![Some(grad.mapv(|g| real(g.re)))]
    }
}

struct Trig {
    input: Tensor,
    in_val: Arc<CArray>,
    sine: bool,
}

impl BackwardOp for Trig {
    fn name(&self) -> &'static str {
        if self.sine {
            "sin"
        } else {
            "cos"
        }
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = grad.clone();
        let sine = self.sine;
        g.zip_mut_with(&self.in_val, |g, x| {
            let slope = if sine { x.re.cos() } else { -x.re.sin() };
            *g = real(g.re * slope);
        });
        vec![Some(g)]
    }
}

struct MaskedSqrt {
    input: Tensor,
    out_val: Arc<CArray>,
}

impl BackwardOp for MaskedSqrt {
    fn name(&self) -> &'static str {
        "masked_sqrt"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = grad.clone();
        g.zip_mut_with(&self.out_val, |g, w| {
            *g = if w.re > 0.0 {
                real(0.5 * g.re / w.re)
            } else {
                ZERO
            };
        });
        vec![Some(g)]
    }
}

struct Reshape {
    input: Tensor,
    in_shape: Vec<usize>,
}

impl BackwardOp for Reshape {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        vec![Some(reshape_owned(grad, &self.in_shape))]
    }
}

struct Permute {
    input: Tensor,
    inverse: Vec<usize>,
}

impl BackwardOp for Permute {
    fn name(&self) -> &'static str {
        "permute"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let g = grad
            .view()
            .permuted_axes(IxDyn(&self.inverse))
            .as_standard_layout()
            .into_owned();
        vec![Some(g)]
    }
}

struct SumAll {
    input: Tensor,
    in_shape: Vec<usize>,
}

impl BackwardOp for SumAll {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let g = grad.iter().next().copied().unwrap_or(ZERO);
        vec![Some(ArrayD::from_elem(IxDyn(&self.in_shape), g))]
    }
}

struct SumAxis {
    input: Tensor,
    axis: usize,
    in_shape: Vec<usize>,
}

impl BackwardOp for SumAxis {
    fn name(&self) -> &'static str {
        "sum_axis"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = ArrayD::zeros(IxDyn(&self.in_shape));
        for mut lane in g.axis_iter_mut(Axis(self.axis)) {
            lane.assign(grad);
        }
        vec![Some(g)]
    }
}

struct Select {
    input: Tensor,
    axis: usize,
    index: usize,
    in_shape: Vec<usize>,
}

impl BackwardOp for Select {
    fn name(&self) -> &'static str {
        "select"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut g = ArrayD::zeros(IxDyn(&self.in_shape));
        g.index_axis_mut(Axis(self.axis), self.index).assign(grad);
        vec![Some(g)]
    }
}

struct Stack {
    inputs: Vec<Tensor>,
    in_shapes: Vec<Vec<usize>>,
    axis: usize,
}

impl BackwardOp for Stack {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn parents(&self) -> Vec<Tensor> {
        self.inputs.clone()
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        self.inputs
            .iter()
            .zip(&self.in_shapes)
            .enumerate()
            .map(|(i, (input, shape))| {
                input.requires_grad().then(|| {
                    sum_to_shape(grad.index_axis(Axis(self.axis), i).to_owned(), shape)
                })
            })
            .collect()
    }
}

struct Spectral {
    input: Tensor,
    inverse: bool,
}

impl BackwardOp for Spectral {
    fn name(&self) -> &'static str {
        if self.inverse {
            "ifft2"
        } else {
            "fft2"
        }
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let ndim = grad.ndim();
        let n = (grad.shape()[ndim - 1] * grad.shape()[ndim - 2]) as f64;
        // Adjoint of the unnormalized forward DFT is N * IDFT; adjoint of
        // the scaled inverse is DFT / N.
        let g = if self.inverse {
            fft2(grad, false).mapv(|v| v / n)
        } else {
            fft2(grad, true).mapv(|v| v * n)
        };
        vec![Some(g)]
    }
}

struct Embed {
    input: Tensor,
    start: [usize; 2],
    inner: [usize; 2],
}

impl BackwardOp for Embed {
    fn name(&self) -> &'static str {
        "embed"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        vec![Some(window_array(grad, self.start, self.inner))]
    }
}

struct Window {
    input: Tensor,
    start: [usize; 2],
    outer: [usize; 2],
}

impl BackwardOp for Window {
    fn name(&self) -> &'static str {
        "window"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        vec![Some(embed_array(grad, self.outer, self.start))]
    }
}

struct Interpolate {
    input: Tensor,
    axis: usize,
    taps: Taps,
    n_in: usize,
}

impl BackwardOp for Interpolate {
    fn name(&self) -> &'static str {
        "interpolate"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let mut shape = grad.shape().to_vec();
        shape[self.axis] = self.n_in;
        let mut g = ArrayD::zeros(IxDyn(&shape));
        for (i, row) in self.taps.iter().enumerate() {
            let source = grad.index_axis(Axis(self.axis), i);
            for &(j, w) in row {
                g.index_axis_mut(Axis(self.axis), j)
                    .scaled_add(real(w), &source);
            }
        }
        vec![Some(g)]
    }
}

struct Diagonal {
    input: Tensor,
    n: usize,
}

impl BackwardOp for Diagonal {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn parents(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }

    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>> {
        let ndim = grad.ndim() + 1;
        let mut shape = grad.shape().to_vec();
        shape.push(self.n);
        let mut g = ArrayD::zeros(IxDyn(&shape));
        for k in 0..self.n {
            let source = grad.index_axis(Axis(ndim - 2), k);
            g.index_axis_mut(Axis(ndim - 1), k)
                .index_axis_move(Axis(ndim - 2), k)
                .assign(&source);
        }
        vec![Some(g)]
    }
}
