//! Optical elements.
//!
//! [`Element`] is a closed set of variants. Every element sits on a grid at
//! an axial position `z` (a [`Param`], trainable on request) and either
//! transforms a field or, for detectors, turns it into a measurement.
//! Two-port splitters live beside the enum and are applied directly.

mod aperture;
mod beam_splitter;
mod detector;
mod lens;
mod modulator;
mod polarization;

pub use aperture::Aperture;
pub use beam_splitter::{BeamSplitter, PolarizingBeamSplitter};
pub use detector::{Detector, DetectorKind};
pub use lens::Lens;
pub use modulator::{ModulationKind, Modulator};
pub use polarization::{Angle, JonesKind, PolarizationOptic};

use log::warn;

use crate::autodiff::Tensor;
use crate::config::GridPolicy;
use crate::error::{ensure_finite, OpticsError, OpticsResult};
use crate::field::Field;
use crate::grid::Grid;
use crate::param::Param;

/// Grid and axial position shared by every element.
#[derive(Debug, Clone)]
pub struct Placement {
    grid: Grid,
    z: Param,
}

impl Placement {
    pub fn new(grid: Grid, z: f64) -> OpticsResult<Self> {
        ensure_finite("z", z)?;
        Ok(Self {
            grid,
            z: Param::scalar("z", z, false),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn z(&self) -> &Param {
        &self.z
    }

    /// Replace `z` with a trainable parameter holding the same value.
    pub fn trainable_z(self) -> Self {
        Self {
            z: Param::scalar("z", self.z.item(), true),
            ..self
        }
    }

    /// Bring `field` onto this grid according to `policy`.
    pub(crate) fn conform(&self, field: &Field, policy: GridPolicy) -> OpticsResult<Field> {
        if field.grid().is_compatible(&self.grid) {
            return Ok(field.clone());
        }
        match policy {
            GridPolicy::Strict => Err(OpticsError::GridMismatch {
                field: field.grid().describe(),
                element: self.grid.describe(),
            }),
            GridPolicy::Resample(method) => {
                warn!(
                    "resampling field onto element grid ({:?}): [{}] -> [{}]",
                    method,
                    field.grid().describe(),
                    self.grid.describe()
                );
                field.resample(&self.grid, method)
            }
        }
    }
}

/// Result of applying an element.
#[derive(Debug, Clone)]
pub enum ElementOutput {
    Field(Field),
    Measurement(Tensor),
}

impl ElementOutput {
    pub fn into_field(self) -> Option<Field> {
        match self {
            ElementOutput::Field(field) => Some(field),
            ElementOutput::Measurement(_) => None,
        }
    }

    pub fn into_measurement(self) -> Option<Tensor> {
        match self {
            ElementOutput::Measurement(m) => Some(m),
            ElementOutput::Field(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Element {
    Lens(Lens),
    Modulator(Modulator),
    Aperture(Aperture),
    PolarizationOptic(PolarizationOptic),
    Detector(Detector),
}

impl Element {
    fn placement(&self) -> &Placement {
        match self {
            Element::Lens(e) => e.placement(),
            Element::Modulator(e) => e.placement(),
            Element::Aperture(e) => e.placement(),
            Element::PolarizationOptic(e) => e.placement(),
            Element::Detector(e) => e.placement(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Element::Lens(_) => "Lens",
            Element::Modulator(_) => "Modulator",
            Element::Aperture(_) => "Aperture",
            Element::PolarizationOptic(_) => "PolarizationOptic",
            Element::Detector(_) => "Detector",
        }
    }

    pub fn grid(&self) -> &Grid {
        self.placement().grid()
    }

    pub fn z(&self) -> &Param {
        self.placement().z()
    }

    /// Current axial position.
    pub fn z_value(&self) -> f64 {
        self.z().item()
    }

    pub fn is_detector(&self) -> bool {
        matches!(self, Element::Detector(_))
    }

    /// Trainable parameters, `z` last.
    pub fn trainable_parameters(&self) -> Vec<Param> {
        let mut params = match self {
            Element::Lens(e) => e.parameters(),
            Element::Modulator(e) => e.parameters(),
            Element::Aperture(_) => Vec::new(),
            Element::PolarizationOptic(e) => e.parameters(),
            Element::Detector(e) => e.parameters(),
        };
        params.push(self.z().clone());
        params.retain(Param::is_trainable);
        params
    }

    /// Apply with the strict grid policy.
    pub fn forward(&self, field: &Field) -> OpticsResult<ElementOutput> {
        self.forward_with_policy(field, GridPolicy::Strict)
    }

    pub fn forward_with_policy(&self, field: &Field, policy: GridPolicy) -> OpticsResult<ElementOutput> {
        let field = self.placement().conform(field, policy)?;
        match self {
            Element::Detector(d) => Ok(ElementOutput::Measurement(d.measure(&field)?)),
            _ => Ok(ElementOutput::Field(self.transform(&field)?)),
        }
    }

    /// Field transform of a non-detector element; the field must already be
    /// on the element grid.
    pub fn modulate(&self, field: &Field) -> OpticsResult<Field> {
        field.ensure_grid(self.grid())?;
        self.transform(field)
    }

    fn transform(&self, field: &Field) -> OpticsResult<Field> {
        match self {
            Element::Lens(e) => field.modulate(&e.mask(field)?),
            Element::Modulator(e) => field.modulate(&e.mask()),
            Element::Aperture(e) => field.modulate(&e.mask()),
            Element::PolarizationOptic(e) => field.apply_jones(&e.jones_matrix()?),
            Element::Detector(_) => Err(OpticsError::invalid(
                "element",
                "detectors measure fields and do not modulate them",
            )),
        }
    }
}

impl From<Lens> for Element {
    fn from(e: Lens) -> Self {
        Element::Lens(e)
    }
}

impl From<Modulator> for Element {
    fn from(e: Modulator) -> Self {
        Element::Modulator(e)
    }
}

impl From<Aperture> for Element {
    fn from(e: Aperture) -> Self {
        Element::Aperture(e)
    }
}

impl From<PolarizationOptic> for Element {
    fn from(e: PolarizationOptic) -> Self {
        Element::PolarizationOptic(e)
    }
}

impl From<Detector> for Element {
    fn from(e: Detector) -> Self {
        Element::Detector(e)
    }
}
