//! Jones-matrix optics for polarized fields.

use std::f64::consts::PI;

use ndarray::{arr2, Array2, ArrayD, IxDyn};
use num_complex::Complex64;

use super::Placement;
use crate::autodiff::Tensor;
use crate::error::{OpticsError, OpticsResult};
use crate::grid::Grid;
use crate::param::Param;

/// Uniform angle or a per-point `[Nx, Ny]` map, in radians.
#[derive(Debug, Clone, PartialEq)]
pub enum Angle {
    Uniform(f64),
    Map(Array2<f64>),
}

impl From<f64> for Angle {
    fn from(v: f64) -> Self {
        Angle::Uniform(v)
    }
}

impl From<Array2<f64>> for Angle {
    fn from(v: Array2<f64>) -> Self {
        Angle::Map(v)
    }
}

impl Angle {
    fn into_param(self, name: &str, grid: &Grid) -> OpticsResult<Param> {
        let values = match self {
            Angle::Uniform(v) => ArrayD::from_elem(IxDyn(&[]), v),
            Angle::Map(map) => {
                let [nx, ny] = grid.shape();
                if map.dim() != (nx, ny) {
                    return Err(OpticsError::shape([nx, ny], map.shape()));
                }
                map.into_dyn()
            }
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(OpticsError::invalid("angle", "must be finite"));
        }
        Ok(Param::real(name, values, false))
    }
}

#[derive(Debug, Clone)]
pub enum JonesKind {
    LinearPolarizer { angle: Param },
    LeftCircular,
    RightCircular,
    Waveplate { retardance: Param, angle: Param },
    Matrix(Param),
}

/// Polarization optic described by a 2x2 Jones matrix.
///
/// With fast axis angle `θ` (`c = cos θ`, `s = sin θ`):
/// linear polarizer `[[c², cs], [cs, s²]]`; waveplate with `e = exp(iφ)`
/// `[[c² + e s², cs(1 - e)], [cs(1 - e), s² + e c²]]`.
#[derive(Debug, Clone)]
pub struct PolarizationOptic {
    placement: Placement,
    kind: JonesKind,
}

impl PolarizationOptic {
    fn with_kind(grid: Grid, kind: JonesKind, z: f64) -> OpticsResult<Self> {
        Ok(Self {
            placement: Placement::new(grid, z)?,
            kind,
        })
    }

    pub fn linear_polarizer(grid: Grid, angle: impl Into<Angle>, z: f64) -> OpticsResult<Self> {
        let angle = angle.into().into_param("angle", &grid)?;
        Self::with_kind(grid, JonesKind::LinearPolarizer { angle }, z)
    }

    pub fn left_circular(grid: Grid, z: f64) -> OpticsResult<Self> {
        Self::with_kind(grid, JonesKind::LeftCircular, z)
    }

    pub fn right_circular(grid: Grid, z: f64) -> OpticsResult<Self> {
        Self::with_kind(grid, JonesKind::RightCircular, z)
    }

    pub fn waveplate(
        grid: Grid,
        retardance: impl Into<Angle>,
        angle: impl Into<Angle>,
        z: f64,
    ) -> OpticsResult<Self> {
        let retardance = retardance.into().into_param("retardance", &grid)?;
        let angle = angle.into().into_param("angle", &grid)?;
        Self::with_kind(grid, JonesKind::Waveplate { retardance, angle }, z)
    }

    pub fn quarter_waveplate(grid: Grid, angle: impl Into<Angle>, z: f64) -> OpticsResult<Self> {
        Self::waveplate(grid, PI / 2.0, angle, z)
    }

    pub fn half_waveplate(grid: Grid, angle: impl Into<Angle>, z: f64) -> OpticsResult<Self> {
        Self::waveplate(grid, PI, angle, z)
    }

    /// Arbitrary Jones matrix, `[2, 2]` or `[2, 2, Nx, Ny]`.
    pub fn jones(grid: Grid, matrix: ArrayD<Complex64>, z: f64) -> OpticsResult<Self> {
        let [nx, ny] = grid.shape();
        match matrix.shape() {
            [2, 2] => {}
            [2, 2, a, b] if [*a, *b] == [nx, ny] => {}
            other => {
                return Err(OpticsError::shape(
                    format!("[2, 2] or [2, 2, {}, {}]", nx, ny),
                    other,
                ))
            }
        }
        Self::with_kind(grid, JonesKind::Matrix(Param::complex("jones", matrix, false)), z)
    }

    /// Make every angle, retardance or matrix entry trainable.
    pub fn trainable(mut self) -> Self {
        let retrain = |p: &Param| -> Param {
            if p.is_real() {
                Param::real(p.name(), p.real_value(), true)
            } else {
                Param::complex(p.name(), p.value(), true)
            }
        };
        self.kind = match &self.kind {
            JonesKind::LinearPolarizer { angle } => JonesKind::LinearPolarizer {
                angle: retrain(angle),
            },
            JonesKind::Waveplate { retardance, angle } => JonesKind::Waveplate {
                retardance: retrain(retardance),
                angle: retrain(angle),
            },
            JonesKind::Matrix(m) => JonesKind::Matrix(retrain(m)),
            fixed => fixed.clone(),
        };
        self
    }

    pub fn trainable_z(mut self) -> Self {
        self.placement = self.placement.trainable_z();
        self
    }

    pub fn kind(&self) -> &JonesKind {
        &self.kind
    }

    pub(crate) fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn parameters(&self) -> Vec<Param> {
        match &self.kind {
            JonesKind::LinearPolarizer { angle } => vec![angle.clone()],
            JonesKind::Waveplate { retardance, angle } => vec![retardance.clone(), angle.clone()],
            JonesKind::Matrix(m) => vec![m.clone()],
            JonesKind::LeftCircular | JonesKind::RightCircular => Vec::new(),
        }
    }

    /// Jones matrix, `[2, 2]` or `[2, 2, Nx, Ny]`.
    pub fn jones_matrix(&self) -> OpticsResult<Tensor> {
        match &self.kind {
            JonesKind::LinearPolarizer { angle } => {
                let (c, s) = cos_sin(angle);
                let cs = c.mul(&s)?;
                matrix_2x2(c.mul(&c)?, cs.clone(), cs, s.mul(&s)?)
            }
            JonesKind::LeftCircular => Ok(circular(1.0)),
            JonesKind::RightCircular => Ok(circular(-1.0)),
            JonesKind::Waveplate { retardance, angle } => {
                let (c, s) = cos_sin(angle);
                let e = retardance.tensor().scale(Complex64::i()).exp();
                let (c2, s2) = (c.mul(&c)?, s.mul(&s)?);
                let off = c.mul(&s)?.mul(&Tensor::scalar(1.0).sub(&e)?)?;
                matrix_2x2(
                    c2.add(&e.mul(&s2)?)?,
                    off.clone(),
                    off,
                    s2.add(&e.mul(&c2)?)?,
                )
            }
            JonesKind::Matrix(m) => Ok(m.tensor().clone()),
        }
    }
}

fn cos_sin(angle: &Param) -> (Tensor, Tensor) {
    (angle.tensor().cos(), angle.tensor().sin())
}

pub(super) fn matrix_2x2(m00: Tensor, m01: Tensor, m10: Tensor, m11: Tensor) -> OpticsResult<Tensor> {
    let top = Tensor::stack(&[m00, m01], 0)?;
    let bottom = Tensor::stack(&[m10, m11], 0)?;
    Tensor::stack(&[top, bottom], 0)
}

/// `½[[1, -i h], [i h, 1]]`, `h = 1` for left and `-1` for right handedness.
fn circular(handedness: f64) -> Tensor {
    let h = Complex64::new(0.0, 0.5 * handedness);
    let half = Complex64::new(0.5, 0.0);
    Tensor::constant(arr2(&[[half, -h], [h, half]]).into_dyn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn assert_matrix(actual: &ArrayD<Complex64>, expected: [[Complex64; 2]; 2]) {
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(actual[[i, j]].re, expected[i][j].re, epsilon = 1e-12);
                assert_abs_diff_eq!(actual[[i, j]].im, expected[i][j].im, epsilon = 1e-12);
            }
        }
    }

    fn grid() -> Grid {
        Grid::square(3, 1.0).unwrap()
    }

    #[test]
    fn test_quarter_waveplate_at_45_degrees() {
        let plate = PolarizationOptic::quarter_waveplate(grid(), PI / 4.0, 0.0).unwrap();
        let m = plate.jones_matrix().unwrap().value();
        assert_matrix(
            &m,
            [[c(0.5, 0.5), c(0.5, -0.5)], [c(0.5, -0.5), c(0.5, 0.5)]],
        );
    }

    #[test]
    fn test_waveplate_with_zero_retardance_is_identity() {
        let plate = PolarizationOptic::waveplate(grid(), 0.0, 0.3, 0.0).unwrap();
        let m = plate.jones_matrix().unwrap().value();
        assert_matrix(&m, [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(1.0, 0.0)]]);
    }

    #[test]
    fn test_circular_polarizers() {
        let left = PolarizationOptic::left_circular(grid(), 0.0).unwrap();
        assert_matrix(
            &left.jones_matrix().unwrap().value(),
            [[c(0.5, 0.0), c(0.0, -0.5)], [c(0.0, 0.5), c(0.5, 0.0)]],
        );
        let right = PolarizationOptic::right_circular(grid(), 0.0).unwrap();
        assert_matrix(
            &right.jones_matrix().unwrap().value(),
            [[c(0.5, 0.0), c(0.0, 0.5)], [c(0.0, -0.5), c(0.5, 0.0)]],
        );
    }

    #[test]
    fn test_malus_law() {
        let g = grid();
        let mut data = ArrayD::zeros(IxDyn(&[2, 3, 3]));
        data.index_axis_mut(ndarray::Axis(0), 0).fill(c(1.0, 0.0));
        let field = Field::polarized(Tensor::constant(data), g, 1e-6, 0.0).unwrap();
        for theta in [0.0, 0.3, PI / 4.0, 1.2, PI / 2.0] {
            let polarizer = PolarizationOptic::linear_polarizer(g, theta, 0.0).unwrap();
            let out = field.apply_jones(&polarizer.jones_matrix().unwrap()).unwrap();
            let intensity = out.intensity().unwrap().to_real();
            assert_abs_diff_eq!(intensity[[1, 1]], theta.cos().powi(2), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spatially_varying_angle() {
        let g = grid();
        let angles = Array2::from_shape_fn((3, 3), |(i, _)| i as f64 * PI / 4.0);
        let polarizer = PolarizationOptic::linear_polarizer(g, angles, 0.0).unwrap();
        let m = polarizer.jones_matrix().unwrap().value();
        assert_eq!(m.shape(), &[2, 2, 3, 3]);
        assert_abs_diff_eq!(m[[0, 0, 0, 1]].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m[[0, 0, 2, 1]].re, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m[[1, 1, 2, 1]].re, 1.0, epsilon = 1e-12);
        assert!(PolarizationOptic::linear_polarizer(g, Array2::zeros((2, 2)), 0.0).is_err());
    }

    #[test]
    fn test_polarizer_angle_gradient() {
        // x-polarized input: transmitted power cos²θ · N dA, dP/dθ = -sin 2θ · N dA
        let g = grid();
        let mut data = ArrayD::zeros(IxDyn(&[2, 3, 3]));
        data.index_axis_mut(ndarray::Axis(0), 0).fill(c(1.0, 0.0));
        let field = Field::polarized(Tensor::constant(data), g, 1e-6, 0.0).unwrap();
        let theta = 0.4;
        let polarizer = PolarizationOptic::linear_polarizer(g, theta, 0.0)
            .unwrap()
            .trainable();
        let power = field
            .apply_jones(&polarizer.jones_matrix().unwrap())
            .unwrap()
            .power()
            .unwrap();
        power.backward().unwrap();
        let params = polarizer.parameters();
        let grad = params[0].real_grad().unwrap();
        assert_abs_diff_eq!(grad.sum(), -(2.0 * theta).sin() * 9.0, epsilon = 1e-10);
    }
}
