//! Two-port beam splitters.
//!
//! A splitter takes one or two input fields and returns two output fields,
//! so it is applied directly rather than through a single-path
//! [`System`](crate::system::System).

use std::f64::consts::PI;

use ndarray::arr2;
use num_complex::Complex64;

use super::polarization::matrix_2x2;
use super::Placement;
use crate::autodiff::Tensor;
use crate::config::GridPolicy;
use crate::error::{ensure_finite, OpticsError, OpticsResult};
use crate::field::{Field, FieldKind};
use crate::grid::Grid;
use crate::param::Param;

/// Lossless beam splitter with mixing angle `θ` and phases `φ₀, φ_r, φ_t`.
///
/// Transfer matrix:
/// `e^(iφ₀) [[sin θ e^(iφ_r), cos θ e^(-iφ_t)], [cos θ e^(iφ_t), -sin θ e^(-iφ_r)]]`
#[derive(Debug, Clone)]
pub struct BeamSplitter {
    placement: Placement,
    theta: Param,
    phi_0: Param,
    phi_r: Param,
    phi_t: Param,
}

impl BeamSplitter {
    /// Create new beam splitter.
    pub fn new(
        grid: Grid,
        theta: f64,
        phi_0: f64,
        phi_r: f64,
        phi_t: f64,
        z: f64,
    ) -> OpticsResult<Self> {
        ensure_finite("theta", theta)?;
        ensure_finite("phi_0", phi_0)?;
        ensure_finite("phi_r", phi_r)?;
        ensure_finite("phi_t", phi_t)?;
        Ok(Self {
            placement: Placement::new(grid, z)?,
            theta: Param::scalar("theta", theta, false),
            phi_0: Param::scalar("phi_0", phi_0, false),
            phi_r: Param::scalar("phi_r", phi_r, false),
            phi_t: Param::scalar("phi_t", phi_t, false),
        })
    }

    /// 50:50 splitter without extra phases.
    pub fn balanced(grid: Grid, z: f64) -> OpticsResult<Self> {
        Self::new(grid, PI / 4.0, 0.0, 0.0, 0.0, z)
    }

    /// Make the mixing angle and the three phases trainable.
    pub fn trainable(mut self) -> Self {
        let retrain = |p: &Param| Param::scalar(p.name(), p.item(), true);
        self.theta = retrain(&self.theta);
        self.phi_0 = retrain(&self.phi_0);
        self.phi_r = retrain(&self.phi_r);
        self.phi_t = retrain(&self.phi_t);
        self
    }

    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub fn grid(&self) -> &Grid {
        self.placement.grid()
    }

    pub fn z(&self) -> &Param {
        self.placement.z()
    }

    pub fn trainable_parameters(&self) -> Vec<Param> {
        [&self.theta, &self.phi_0, &self.phi_r, &self.phi_t, self.placement.z()]
            .into_iter()
            .filter(|p| p.is_trainable())
            .cloned()
            .collect()
    }

    /// `[2, 2]` transfer matrix.
    pub fn transfer_matrix(&self) -> OpticsResult<Tensor> {
        let phase = |p: &Param, sign: f64| p.tensor().scale(Complex64::new(0.0, sign)).exp();
        let (s, c) = (self.theta.tensor().sin(), self.theta.tensor().cos());
        let global = phase(&self.phi_0, 1.0);
        let m = matrix_2x2(
            s.mul(&phase(&self.phi_r, 1.0))?,
            c.mul(&phase(&self.phi_t, -1.0))?,
            c.mul(&phase(&self.phi_t, 1.0))?,
            s.mul(&phase(&self.phi_r, -1.0))?.neg(),
        )?;
        m.mul(&global)
    }

    /// Split `field`, optionally mixed with a second input on the other port.
    ///
    /// Both inputs must be coherent or polarized, share a kind and data shape,
    /// and sit on the splitter grid. Outputs carry the first input's metadata.
    pub fn forward(&self, field: &Field, other: Option<&Field>) -> OpticsResult<(Field, Field)> {
        let first = self.placement.conform(field, GridPolicy::Strict)?;
        check_kind(&first)?;
        let m = self.transfer_matrix()?;
        let entry = |i: usize, j: usize| m.select(0, i)?.select(0, j);
        let u = first.data();
        let (out0, out1) = match other {
            None => (u.mul(&entry(0, 0)?)?, u.mul(&entry(1, 0)?)?),
            Some(second) => {
                let second = self.placement.conform(second, GridPolicy::Strict)?;
                if second.kind() != first.kind() || second.data().shape() != u.shape() {
                    return Err(OpticsError::shape(
                        format!("{:?} input with data {:?}", first.kind(), u.shape()),
                        format!("{:?} input with data {:?}", second.kind(), second.data().shape()),
                    ));
                }
                let v = second.data();
                (
                    u.mul(&entry(0, 0)?)?.add(&v.mul(&entry(0, 1)?)?)?,
                    u.mul(&entry(1, 0)?)?.add(&v.mul(&entry(1, 1)?)?)?,
                )
            }
        };
        Ok((first.with_data(out0), first.with_data(out1)))
    }
}

fn check_kind(field: &Field) -> OpticsResult<()> {
    match field.kind() {
        FieldKind::Coherent | FieldKind::Polarized => Ok(()),
        kind => Err(OpticsError::invalid(
            "field",
            format!("beam splitters need coherent or polarized fields, got {:?}", kind),
        )),
    }
}

/// Routes the x component to output 0 and the y component to output 1.
#[derive(Debug, Clone)]
pub struct PolarizingBeamSplitter {
    placement: Placement,
}

impl PolarizingBeamSplitter {
    /// Create new polarizing beam splitter.
    pub fn new(grid: Grid, z: f64) -> OpticsResult<Self> {
        Ok(Self {
            placement: Placement::new(grid, z)?,
        })
    }

    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub fn grid(&self) -> &Grid {
        self.placement.grid()
    }

    pub fn z(&self) -> &Param {
        self.placement.z()
    }

    pub fn trainable_parameters(&self) -> Vec<Param> {
        let z = self.placement.z();
        if z.is_trainable() {
            vec![z.clone()]
        } else {
            Vec::new()
        }
    }

    /// Split a polarized field into its x and y parts.
    pub fn forward(&self, field: &Field) -> OpticsResult<(Field, Field)> {
        let field = self.placement.conform(field, GridPolicy::Strict)?;
        if field.kind() != FieldKind::Polarized {
            return Err(OpticsError::invalid(
                "field",
                format!("polarizing beam splitters need a polarized field, got {:?}", field.kind()),
            ));
        }
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let x_only = Tensor::constant(arr2(&[[one, zero], [zero, zero]]).into_dyn());
        let y_only = Tensor::constant(arr2(&[[zero, zero], [zero, one]]).into_dyn());
        Ok((field.apply_jones(&x_only)?, field.apply_jones(&y_only)?))
    }
}
