//! Reverse-mode differentiation over complex tensors.
//!
//! Every tensor produced by an operation remembers the operation and its
//! parents; [`Tensor::backward`] walks that graph in reverse topological
//! order. Gradients use the convention `g = dL/dRe(z) + i dL/dIm(z)` for a
//! real scalar loss `L`, so a holomorphic op `w = f(z)` has adjoint
//! `conj(f'(z)) * g_w` and a real-valued leaf reads `Re(g)`.

mod broadcast;
mod fft;
mod ops;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::trace;
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use parking_lot::{Mutex, RwLock};

use crate::error::{OpticsError, OpticsResult};

pub(crate) use broadcast::{broadcast_shape, zip_broadcast};
pub(crate) use ops::Taps;

/// Complex array stored by every tensor.
pub type CArray = ArrayD<Complex64>;

/// A node that can route an output gradient to its parents.
pub(crate) trait BackwardOp: Send + Sync {
    fn name(&self) -> &'static str;
    fn parents(&self) -> Vec<Tensor>;
    /// One entry per parent, `None` where the parent needs no gradient.
    fn backward(&self, grad: &CArray) -> Vec<Option<CArray>>;
}

struct Inner {
    id: usize,
    value: RwLock<Arc<CArray>>,
    grad: Mutex<Option<CArray>>,
    requires_grad: bool,
    grad_fn: Option<Box<dyn BackwardOp>>,
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Shared handle to a complex array and its place in the gradient graph.
#[derive(Clone)]
pub struct Tensor(Arc<Inner>);

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.0.id)
            .field("shape", &self.shape())
            .field("requires_grad", &self.0.requires_grad)
            .field("op", &self.0.grad_fn.as_ref().map(|op| op.name()))
            .finish()
    }
}

impl Tensor {
    fn make(value: Arc<CArray>, requires_grad: bool, grad_fn: Option<Box<dyn BackwardOp>>) -> Self {
        Tensor(Arc::new(Inner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            value: RwLock::new(value),
            grad: Mutex::new(None),
            requires_grad,
            grad_fn,
        }))
    }

    /// Tensor that never receives a gradient.
    pub fn constant(value: CArray) -> Self {
        Self::make(Arc::new(value), false, None)
    }

    /// Leaf tensor; gradients accumulate on it when `requires_grad` is set.
    pub fn leaf(value: CArray, requires_grad: bool) -> Self {
        Self::make(Arc::new(value), requires_grad, None)
    }

    /// Constant from real values.
    pub fn from_real(value: ArrayD<f64>) -> Self {
        Self::constant(value.mapv(|v| Complex64::new(v, 0.0)))
    }

    /// Zero-dimensional real constant.
    pub fn scalar(value: f64) -> Self {
        Self::complex_scalar(Complex64::new(value, 0.0))
    }

    /// Zero-dimensional complex constant.
    pub fn complex_scalar(value: Complex64) -> Self {
        Self::constant(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Record the result of an operation. Results whose parents all lack
    /// gradients are stored as constants.
    pub(crate) fn from_op(value: CArray, op: impl BackwardOp + 'static) -> Self {
        if op.parents().iter().any(Tensor::requires_grad) {
            Self::make(Arc::new(value), true, Some(Box::new(op)))
        } else {
            Self::constant(value)
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.0.id
    }

    /// Current value.
    pub fn value(&self) -> Arc<CArray> {
        self.0.value.read().clone()
    }

    /// Real parts of the current value.
    pub fn to_real(&self) -> ArrayD<f64> {
        self.value().mapv(|v| v.re)
    }

    /// First element; the value of a zero-dimensional tensor.
    pub fn item(&self) -> Complex64 {
        self.value()
            .iter()
            .next()
            .copied()
            .unwrap_or_else(|| Complex64::new(0.0, 0.0))
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.value.read().shape().to_vec()
    }

    pub fn ndim(&self) -> usize {
        self.0.value.read().ndim()
    }

    pub fn len(&self) -> usize {
        self.0.value.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn requires_grad(&self) -> bool {
        self.0.requires_grad
    }

    pub fn is_leaf(&self) -> bool {
        self.0.grad_fn.is_none()
    }

    /// Accumulated gradient of a leaf.
    pub fn grad(&self) -> Option<CArray> {
        self.0.grad.lock().clone()
    }

    pub fn zero_grad(&self) {
        *self.0.grad.lock() = None;
    }

    /// Replace the value of a leaf. Shapes must match.
    pub fn set_value(&self, value: CArray) -> OpticsResult<()> {
        if !self.is_leaf() {
            return Err(OpticsError::NotDifferentiable(
                "only leaf tensors can be assigned".into(),
            ));
        }
        let mut slot = self.0.value.write();
        if slot.shape() != value.shape() {
            return Err(OpticsError::shape(slot.shape(), value.shape()));
        }
        *slot = Arc::new(value);
        Ok(())
    }

    /// Same value, cut from the graph.
    pub fn detach(&self) -> Tensor {
        Self::make(self.value(), false, None)
    }

    /// Back-propagate from a zero-dimensional tensor, differentiating its
    /// real part.
    pub fn backward(&self) -> OpticsResult<()> {
        if self.ndim() != 0 {
            return Err(OpticsError::NotDifferentiable(format!(
                "backward() needs a scalar root, got shape {:?}",
                self.shape()
            )));
        }
        self.backward_with(ArrayD::from_elem(IxDyn(&[]), Complex64::new(1.0, 0.0)))
    }

    /// Back-propagate a seed gradient of the same shape as `self`.
    pub fn backward_with(&self, seed: CArray) -> OpticsResult<()> {
        if seed.shape() != self.shape().as_slice() {
            return Err(OpticsError::shape(self.shape(), seed.shape()));
        }
        if !self.requires_grad() {
            return Err(OpticsError::NotDifferentiable(
                "root does not depend on any tensor that requires a gradient".into(),
            ));
        }

        let order = self.topological_order();
        let mut pending: HashMap<usize, CArray> = HashMap::new();
        pending.insert(self.id(), seed);

        for node in order.iter().rev() {
            let Some(grad) = pending.remove(&node.id()) else {
                continue;
            };
            match &node.0.grad_fn {
                None => node.accumulate_grad(grad),
                Some(op) => {
                    trace!("backward through {}", op.name());
                    for (parent, parent_grad) in op.parents().into_iter().zip(op.backward(&grad)) {
                        let Some(parent_grad) = parent_grad else {
                            continue;
                        };
                        if !parent.requires_grad() {
                            continue;
                        }
                        match pending.entry(parent.id()) {
                            Entry::Occupied(mut slot) => *slot.get_mut() += &parent_grad,
                            Entry::Vacant(slot) => {
                                slot.insert(parent_grad);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn accumulate_grad(&self, grad: CArray) {
        let mut slot = self.0.grad.lock();
        match slot.as_mut() {
            Some(existing) => *existing += &grad,
            None => *slot = Some(grad),
        }
    }

    /// Tensors requiring gradients reachable from `self`, parents first.
    fn topological_order(&self) -> Vec<Tensor> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(self.clone(), false)];
        while let Some((tensor, expanded)) = stack.pop() {
            if expanded {
                order.push(tensor);
                continue;
            }
            if !visited.insert(tensor.id()) {
                continue;
            }
            stack.push((tensor.clone(), true));
            if let Some(op) = &tensor.0.grad_fn {
                for parent in op.parents() {
                    if parent.requires_grad() && !visited.contains(&parent.id()) {
                        stack.push((parent, false));
                    }
                }
            }
        }
        order
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl From<&Tensor> for Tensor {
    fn from(value: &Tensor) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_constant_folding() {
        let a = Tensor::scalar(2.0);
        let b = Tensor::scalar(3.0);
        let out = a.mul(&b).unwrap();
        assert!(!out.requires_grad());
        assert!(out.is_leaf());
        assert!(out.backward().is_err());
    }

    #[test]
    fn test_shared_parent_accumulates() {
        // L = x*x + x  =>  dL/dx = 2x + 1
        let x = Tensor::leaf(array![c(3.0, 0.0)].into_dyn(), true);
        let loss = x.mul(&x).unwrap().add(&x).unwrap().sum().real();
        loss.backward().unwrap();
        assert_abs_diff_eq!(x.grad().unwrap()[[0]].re, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_of_squared_modulus() {
        // L = |z|^2  =>  g = 2z
        let z = Tensor::leaf(array![c(1.5, -2.0)].into_dyn(), true);
        z.abs2().sum().backward().unwrap();
        let g = z.grad().unwrap()[[0]];
        assert_abs_diff_eq!(g.re, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g.im, -4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_needs_scalar_root() {
        let x = Tensor::leaf(array![c(1.0, 0.0), c(2.0, 0.0)].into_dyn(), true);
        assert!(matches!(
            x.scale_real(2.0).backward(),
            Err(OpticsError::NotDifferentiable(_))
        ));
    }

    #[test]
    fn test_set_value_only_on_leaves() {
        let x = Tensor::leaf(array![c(1.0, 0.0)].into_dyn(), true);
        let y = x.scale_real(2.0);
        assert!(y.set_value(array![c(0.0, 0.0)].into_dyn()).is_err());
        assert!(x.set_value(array![c(0.0, 0.0), c(0.0, 0.0)].into_dyn()).is_err());
        x.set_value(array![c(5.0, 0.0)].into_dyn()).unwrap();
        assert_eq!(x.item(), c(5.0, 0.0));
    }

    #[test]
    fn test_zero_grad() {
        let x = Tensor::leaf(array![c(1.0, 0.0)].into_dyn(), true);
        x.abs2().sum().backward().unwrap();
        x.abs2().sum().backward().unwrap();
        assert_abs_diff_eq!(x.grad().unwrap()[[0]].re, 4.0, epsilon = 1e-12);
        x.zero_grad();
        assert!(x.grad().is_none());
    }
}
