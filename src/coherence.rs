//! Partially coherent sources.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::autodiff::Tensor;
use crate::error::OpticsResult;
use crate::field::Field;
use crate::grid::Grid;
use crate::profiles::{gaussian_schell_model, gaussian_schell_modes};

/// Representation used for a partially coherent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoherenceStrategy {
    /// Full mutual coherence `Γ`, `[Nx, Ny, Nx, Ny]`.
    MutualCoherence,
    /// Weighted coherent modes, `[M, Nx, Ny]`.
    ModeExpansion { max_modes: usize },
}

impl Field {
    /// Gaussian Schell-model source in the chosen representation.
    pub fn partially_coherent(
        grid: Grid,
        waist: f64,
        coherence_width: f64,
        wavelength: impl Into<Tensor>,
        z: impl Into<Tensor>,
        strategy: CoherenceStrategy,
    ) -> OpticsResult<Field> {
        match strategy {
            CoherenceStrategy::MutualCoherence => {
                let gamma = gaussian_schell_model(&grid, waist, coherence_width)?;
                Field::mutual_coherence(Tensor::constant(gamma), grid, wavelength, z)
            }
            CoherenceStrategy::ModeExpansion { max_modes } => {
                let expansion = gaussian_schell_modes(&grid, waist, coherence_width, max_modes)?;
                debug!(
                    "Gaussian Schell source with {} modes, smallest weight {:e}",
                    expansion.orders.len(),
                    expansion.weights.iter().last().copied().unwrap_or(0.0)
                );
                Field::mode_expansion(
                    Tensor::constant(expansion.modes.into_dyn()),
                    Tensor::from_real(expansion.weights.into_dyn()),
                    grid,
                    wavelength,
                    z,
                )
            }
        }
    }
}
