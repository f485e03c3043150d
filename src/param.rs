//! Named element parameters.
//!
//! A `Param` wraps a leaf [`Tensor`]. Trainable params collect gradients
//! during `backward`; an optimizer reads [`Param::grad`] and writes through
//! [`Param::set_value`] between evaluations. Cloning a `Param` shares the
//! underlying leaf.

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;

use crate::autodiff::{CArray, Tensor};
use crate::error::{OpticsError, OpticsResult};

#[derive(Clone, Debug)]
pub struct Param {
    name: String,
    tensor: Tensor,
    real: bool,
}

impl Param {
    /// Real scalar parameter.
    pub fn scalar(name: impl Into<String>, value: f64, trainable: bool) -> Self {
        Self::real(name, ArrayD::from_elem(IxDyn(&[]), value), trainable)
    }

    /// Real array parameter.
    pub fn real(name: impl Into<String>, value: ArrayD<f64>, trainable: bool) -> Self {
        Self {
            name: name.into(),
            tensor: Tensor::leaf(value.mapv(|v| Complex64::new(v, 0.0)), trainable),
            real: true,
        }
    }

    /// Complex array parameter.
    pub fn complex(name: impl Into<String>, value: CArray, trainable: bool) -> Self {
        Self {
            name: name.into(),
            tensor: Tensor::leaf(value, trainable),
            real: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_trainable(&self) -> bool {
        self.tensor.requires_grad()
    }

    pub fn is_real(&self) -> bool {
        self.real
    }

    /// Graph handle used in forward computations.
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn shape(&self) -> Vec<usize> {
        self.tensor.shape()
    }

    /// Current value.
    pub fn value(&self) -> CArray {
        (*self.tensor.value()).clone()
    }

    /// Current value of a real parameter.
    pub fn real_value(&self) -> ArrayD<f64> {
        self.tensor.to_real()
    }

    /// Scalar value (first element).
    pub fn item(&self) -> f64 {
        self.tensor.item().re
    }

    /// Accumulated gradient; real parameters get the real projection.
    pub fn grad(&self) -> Option<CArray> {
        let grad = self.tensor.grad()?;
        if self.real {
            Some(grad.mapv(|g| Complex64::new(g.re, 0.0)))
        } else {
            Some(grad)
        }
    }

    /// Gradient of a real parameter as real numbers.
    pub fn real_grad(&self) -> Option<ArrayD<f64>> {
        self.tensor.grad().map(|g| g.mapv(|v| v.re))
    }

    /// Overwrite the value. The shape is fixed at construction and real
    /// parameters reject values with an imaginary part.
    pub fn set_value(&self, value: CArray) -> OpticsResult<()> {
        if self.real && value.iter().any(|v| v.im != 0.0) {
            return Err(OpticsError::invalid(
                "value",
                format!("parameter `{}` is real", self.name),
            ));
        }
        self.tensor.set_value(value)
    }

    /// Overwrite a real value.
    pub fn set_real(&self, value: ArrayD<f64>) -> OpticsResult<()> {
        self.tensor.set_value(value.mapv(|v| Complex64::new(v, 0.0)))
    }

    /// Overwrite a scalar value.
    pub fn set_scalar(&self, value: f64) -> OpticsResult<()> {
        let shape = self.shape();
        self.set_real(ArrayD::from_elem(IxDyn(&shape), value))
    }

    pub fn zero_grad(&self) {
        self.tensor.zero_grad();
    }
}
