//! Profile generators.
//!
//! Pure functions of a [`Grid`](crate::grid::Grid) and shape parameters.
//! Profiles are centred on the physical origin, so a grid offset shifts the
//! window, not the profile.

mod hermite_gaussian;
mod shapes;
mod spatial_coherence;
mod special;

pub use hermite_gaussian::{gaussian, hermite, hermite_gaussian, laguerre, laguerre_gaussian};
pub use shapes::{checkerboard, circle, rectangle, square};
pub use spatial_coherence::{gaussian_schell_model, gaussian_schell_modes, schell_model, SchellModes};
pub use special::{
    airy, binary_grating, blazed_grating, lens_phase, plane_wave_phase, random_phase,
    sinc, sinusoidal_grating, spherical_wave_phase,
};
