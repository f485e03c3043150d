//! Ordered optical systems.

use log::{debug, trace};

use crate::autodiff::Tensor;
use crate::config::{self, GridPolicy};
use crate::elements::{Element, ElementOutput};
use crate::error::{OpticsError, OpticsResult};
use crate::field::Field;
use crate::param::Param;

/// Elements ordered along the optical axis.
///
/// Order is by current `z`, ties broken by insertion order. A system keeps
/// no state between calls.
#[derive(Debug, Clone)]
pub struct System {
    elements: Vec<Element>,
    grid_policy: GridPolicy,
}

impl System {
    /// Create new system with the grid policy of the active config.
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            grid_policy: config::current().grid_policy,
        }
    }

    pub fn with_grid_policy(mut self, policy: GridPolicy) -> Self {
        self.grid_policy = policy;
        self
    }

    pub fn grid_policy(&self) -> GridPolicy {
        self.grid_policy
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in axial order.
    pub fn elements(&self) -> Vec<&Element> {
        let mut ordered: Vec<&Element> = self.elements.iter().collect();
        // z may be trained, so order is taken at call time
        ordered.sort_by(|a, b| a.z_value().total_cmp(&b.z_value()));
        ordered
    }

    pub fn trainable_parameters(&self) -> Vec<Param> {
        self.elements()
            .into_iter()
            .flat_map(Element::trainable_parameters)
            .collect()
    }

    /// Field at `target_z`, applying every non-detector element on the way.
    pub fn propagate_to(&self, field: &Field, target_z: f64) -> OpticsResult<Field> {
        if !target_z.is_finite() {
            return Err(OpticsError::invalid("target_z", "must be finite"));
        }
        let start = scalar_z(field)?;
        if target_z < start {
            if let Some(blocking) = self
                .elements()
                .into_iter()
                .find(|e| e.z_value() > target_z && e.z_value() < start)
            {
                return Err(OpticsError::invalid(
                    "target_z",
                    format!(
                        "cannot propagate backwards from z = {} to z = {} through {} at z = {}",
                        start,
                        target_z,
                        blocking.name(),
                        blocking.z_value()
                    ),
                ));
            }
            debug!("free-space back-propagation from z = {} to z = {}", start, target_z);
            return field.propagate_to_z(target_z);
        }

        let mut current = field.clone();
        for element in self
            .elements()
            .into_iter()
            .filter(|e| e.z_value() >= start && e.z_value() <= target_z)
        {
            current = current.propagate_to_z(element.z().tensor())?;
            if element.is_detector() {
                trace!("passing detector at z = {}", element.z_value());
                continue;
            }
            debug!("applying {} at z = {}", element.name(), element.z_value());
            current = element
                .forward_with_policy(&current, self.grid_policy)?
                .into_field()
                .ok_or_else(|| OpticsError::invalid("element", "expected a field from a non-detector"))?;
        }
        current.propagate_to_z(target_z)
    }

    pub fn measure_at_z(&self, field: &Field, z: f64) -> OpticsResult<Field> {
        self.propagate_to(field, z)
    }

    pub fn measure_intensity_at_z(&self, field: &Field, z: f64) -> OpticsResult<Tensor> {
        self.propagate_to(field, z)?.intensity()
    }

    /// Run the field through every element at or after its plane. Stops at
    /// the first detector and returns its measurement; otherwise returns
    /// the field at the last element.
    pub fn forward(&self, field: &Field) -> OpticsResult<ElementOutput> {
        let start = scalar_z(field)?;
        let mut current = field.clone();
        for element in self.elements().into_iter().filter(|e| e.z_value() >= start) {
            current = current.propagate_to_z(element.z().tensor())?;
            debug!("forward through {} at z = {}", element.name(), element.z_value());
            match element.forward_with_policy(&current, self.grid_policy)? {
                ElementOutput::Field(out) => current = out,
                measurement => return Ok(measurement),
            }
        }
        Ok(ElementOutput::Field(current))
    }
}

fn scalar_z(field: &Field) -> OpticsResult<f64> {
    let z = field.z();
    if z.len() != 1 {
        return Err(OpticsError::invalid(
            "z",
            format!("systems need a field at a single plane, got z of shape {:?}", z.shape()),
        ));
    }
    Ok(z.item().re)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Aperture, Detector, Lens};
    use crate::field::real_data;
    use crate::grid::Grid;
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayD, IxDyn};

    fn grid() -> Grid {
        Grid::square(16, 2e-6).unwrap()
    }

    fn plane_wave(z: f64) -> Field {
        Field::new(real_data(ArrayD::ones(IxDyn(&[16, 16]))), grid(), 1e-6, z).unwrap()
    }

    #[test]
    fn test_elements_sorted_stably_by_z() {
        let system = System::new(vec![
            Aperture::circular(grid(), 8e-6, 0.2).unwrap().into(),
            Lens::new(grid(), 0.1, 0.1).unwrap().into(),
            Detector::power(grid(), 0.1).unwrap().into(),
        ]);
        let names: Vec<_> = system.elements().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Lens", "Detector", "Aperture"]);
    }

    #[test]
    fn test_empty_system_is_free_space() {
        let system = System::new(Vec::new());
        let out = system.propagate_to(&plane_wave(0.0), 1e-3).unwrap();
        assert_abs_diff_eq!(out.z().item().re, 1e-3);
        assert_abs_diff_eq!(
            out.power().unwrap().item().re,
            plane_wave(0.0).power().unwrap().item().re,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_element_at_start_plane_is_applied() {
        let system = System::new(vec![Aperture::circular(grid(), 5e-6, 0.0).unwrap().into()]);
        let out = system.propagate_to(&plane_wave(0.0), 0.0).unwrap();
        // 16 samples of the 2 um grid lie within r <= 5 um
        let open = out.intensity().unwrap().to_real().sum();
        assert_abs_diff_eq!(open, 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_backward_propagation_through_element_is_rejected() {
        let system = System::new(vec![Lens::new(grid(), 0.1, 0.5).unwrap().into()]);
        assert!(matches!(
            system.propagate_to(&plane_wave(1.0), 0.0),
            Err(OpticsError::InvalidParameter { name: "target_z", .. })
        ));
        // nothing strictly between 1.0 and 0.7
        assert!(system.propagate_to(&plane_wave(1.0), 0.7).is_ok());
    }

    #[test]
    fn test_forward_stops_at_detector() {
        let system = System::new(vec![
            Aperture::circular(grid(), 8e-6, 0.0).unwrap().into(),
            Detector::power(grid(), 1e-4).unwrap().into(),
            Lens::new(grid(), 0.1, 2e-4).unwrap().into(),
        ]);
        let out = system.forward(&plane_wave(0.0)).unwrap();
        let reading = out.into_measurement().unwrap();
        assert_eq!(reading.shape(), vec![16, 16]);
    }

    #[test]
    fn test_detectors_are_transparent_in_propagate_to() {
        let with = System::new(vec![Detector::power(grid(), 1e-4).unwrap().into()]);
        let without = System::new(Vec::new());
        let a = with.measure_intensity_at_z(&plane_wave(0.0), 2e-4).unwrap().to_real();
        let b = without.measure_intensity_at_z(&plane_wave(0.0), 2e-4).unwrap().to_real();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_batched_z_is_rejected() {
        let system = System::new(Vec::new());
        let data = real_data(ArrayD::ones(IxDyn(&[2, 16, 16])));
        let z = Tensor::from_real(ndarray::array![0.0, 1.0].into_dyn());
        let field = Field::new(data, grid(), 1e-6, &z).unwrap();
        assert!(system.propagate_to(&field, 1.0).is_err());
    }
}
