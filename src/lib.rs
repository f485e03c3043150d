//! Differentiable Wave-Optics Simulation
//!
//! Scalar, polarized and partially coherent fields on discretized grids,
//! propagated with the angular spectrum method through lenses, modulators,
//! apertures, polarization optics and detectors. Every operation records a
//! reverse-mode graph so losses can be differentiated with respect to
//! element parameters and positions.

pub mod autodiff;
pub mod coherence;
pub mod config;
pub mod elements;
pub mod error;
pub mod field;
pub mod grid;
mod interpolation;
pub mod param;
pub mod profiles;
pub mod propagation;
pub mod spectrum;
pub mod system;
pub mod visualization;

pub use autodiff::{CArray, Tensor};
pub use coherence::CoherenceStrategy;
pub use config::{GridPolicy, Interpolation, OpticsConfig, PropagationConfig};
pub use elements::{
    Aperture, BeamSplitter, Detector, DetectorKind, Element, ElementOutput, Lens, ModulationKind,
    Modulator, PolarizationOptic, PolarizingBeamSplitter,
};
pub use error::{OpticsError, OpticsResult};
pub use field::{real_data, Field, FieldKind};
pub use grid::Grid;
pub use param::Param;
pub use propagation::AngularSpectrum;
pub use spectrum::ChannelPlan;
pub use system::System;
pub use visualization::{Quantity, VisualizationData};
