//! Scoped simulation configuration.
//!
//! There is no process-global mutable store. Defaults are read from a
//! thread-local stack of scopes: [`scoped`] pushes a configuration and the
//! returned guard pops it when dropped. With no scope entered,
//! [`OpticsConfig::default`] applies.

use std::cell::RefCell;
use std::fs;
use std::marker::PhantomData;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{OpticsError, OpticsResult};

/// Interpolation used when a field is resampled onto another grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

/// Policy for applying an element to a field defined on a different grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridPolicy {
    /// Fail with `GridMismatch`.
    Strict,
    /// Resample the field onto the element grid first.
    Resample(Interpolation),
}

/// Angular-spectrum propagation settings carried by each field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Zero padding on each side, in multiples of the grid size per axis.
    /// `(0, 0)` propagates on the bare grid (periodic boundary).
    pub pad_factor: [usize; 2],
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self { pad_factor: [0, 0] }
    }
}

/// Runtime configuration consulted by constructors that are not given
/// explicit values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsConfig {
    /// Grid spacing used by `Grid::from_config`.
    /// Default: 10 µm in both directions.
    pub default_spacing: [f64; 2],

    /// Wavelength used by `Field::from_config`.
    /// Default: 700 nm.
    pub default_wavelength: f64,

    /// Propagation settings given to new fields.
    pub propagation: PropagationConfig,

    /// What elements do with fields on a different grid.
    /// Default: `Strict`.
    pub grid_policy: GridPolicy,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            default_spacing: [10e-6, 10e-6],
            default_wavelength: 700e-9,
            propagation: PropagationConfig::default(),
            grid_policy: GridPolicy::Strict,
        }
    }
}

impl OpticsConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> OpticsResult<()> {
        for &spacing in &self.default_spacing {
            if !(spacing.is_finite() && spacing > 0.0) {
                return Err(OpticsError::Config(format!(
                    "default_spacing must be positive, got {:?}",
                    self.default_spacing
                )));
            }
        }
        if !(self.default_wavelength.is_finite() && self.default_wavelength > 0.0) {
            return Err(OpticsError::Config(format!(
                "default_wavelength must be positive, got {}",
                self.default_wavelength
            )));
        }
        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, filepath: &str) -> OpticsResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(filepath, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(filepath: &str) -> OpticsResult<Self> {
        let json = fs::read_to_string(filepath)?;
        let cfg: Self = serde_json::from_str(&json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

thread_local! {
    static SCOPES: RefCell<Vec<OpticsConfig>> = RefCell::new(Vec::new());
}

/// The configuration of the innermost active scope on this thread.
pub fn current() -> OpticsConfig {
    SCOPES.with(|scopes| scopes.borrow().last().cloned().unwrap_or_default())
}

/// Enter a configuration scope. The scope ends when the guard is dropped.
pub fn scoped(cfg: OpticsConfig) -> OpticsResult<ConfigGuard> {
    cfg.validate()?;
    let depth = SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        scopes.push(cfg);
        scopes.len()
    });
    debug!("entered config scope at depth {}", depth);
    Ok(ConfigGuard {
        depth,
        _not_send: PhantomData,
    })
}

/// Run `f` inside a configuration scope.
pub fn with_config<R>(cfg: OpticsConfig, f: impl FnOnce() -> R) -> OpticsResult<R> {
    let _guard = scoped(cfg)?;
    Ok(f())
}

/// Exit marker for a configuration scope.
///
/// Dropping a guard also closes any scopes entered after it.
pub struct ConfigGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| scopes.borrow_mut().truncate(self.depth - 1));
        debug!("left config scope at depth {}", self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outside_scope() {
        assert_eq!(current(), OpticsConfig::default());
    }

    #[test]
    fn test_nested_scopes_restore() {
        let mut outer = OpticsConfig::default();
        outer.default_wavelength = 1550e-9;
        let mut inner = outer.clone();
        inner.grid_policy = GridPolicy::Resample(Interpolation::Bilinear);

        {
            let _a = scoped(outer.clone()).unwrap();
            assert_eq!(current().default_wavelength, 1550e-9);
            {
                let _b = scoped(inner.clone()).unwrap();
                assert_eq!(current(), inner);
            }
            assert_eq!(current(), outer);
        }
        assert_eq!(current(), OpticsConfig::default());
    }

    #[test]
    fn test_with_config_returns_value() {
        let mut cfg = OpticsConfig::default();
        cfg.default_spacing = [1e-6, 2e-6];
        let spacing = with_config(cfg, || current().default_spacing).unwrap();
        assert_eq!(spacing, [1e-6, 2e-6]);
        assert_eq!(current().default_spacing, [10e-6, 10e-6]);
    }

    #[test]
    fn test_invalid_scope_rejected() {
        let mut cfg = OpticsConfig::default();
        cfg.default_wavelength = -1.0;
        assert!(matches!(scoped(cfg), Err(OpticsError::Config(_))));
        assert_eq!(current(), OpticsConfig::default());
    }

    #[test]
    fn test_config_save_load() {
        let mut cfg = OpticsConfig::default();
        cfg.propagation.pad_factor = [2, 1];
        cfg.grid_policy = GridPolicy::Resample(Interpolation::Nearest);
        let path = std::env::temp_dir().join("photonfield_test_config.json");
        let path = path.to_str().unwrap();

        cfg.save(path).unwrap();
        let loaded = OpticsConfig::load(path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
