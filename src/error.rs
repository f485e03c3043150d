//! Error hierarchy for field construction, propagation and composition.

use thiserror::Error;

/// Root error type for all photonfield failures.
#[derive(Error, Debug)]
pub enum OpticsError {
    /// A constructor or operation received a value outside its domain
    /// (non-positive spacing, wavelength or waist, negative mode index, ...).
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Array dimensions disagree with a grid or with another operand.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Two entities being combined live on incompatible grids.
    #[error("grid mismatch:\n  field grid:   {field}\n  element grid: {element}")]
    GridMismatch { field: String, element: String },

    /// Backward pass requested from a root that cannot seed one.
    #[error("not differentiable: {0}")]
    NotDifferentiable(String),

    /// Configuration failed validation.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type OpticsResult<T> = Result<T, OpticsError>;

impl OpticsError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> OpticsResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OpticsError::invalid(
            name,
            format!("must be finite and positive, got {}", value),
        ))
    }
}

/// Fails with `InvalidParameter` unless `value` is finite.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> OpticsResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(OpticsError::invalid(name, format!("must be finite, got {}", value)))
    }
}
