//! Ring configuration.
//!
//! Every field has a default; a JSON config file only needs to name what it
//! overrides.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::render::pyramid::PyramidOptions;

/// Tunables for the ring geometry, motion and render budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Arc distance between adjacent siblings, as a fraction of the viewport's short side
    pub node_spacing_fraction: f32,
    /// Node circle radius, as a fraction of the viewport's short side
    pub node_radius_fraction: f32,
    /// Upper bound on nodes the visible window may hold
    pub max_visible_nodes: usize,
    /// Per-frame velocity multiplier during momentum
    pub momentum_decay: f32,
    /// Momentum stops once |velocity| drops below this (radians/frame)
    pub momentum_min_velocity: f32,
    /// Snap-to-magnifier animation length
    pub snap_duration_ms: f64,
    /// Skip snap animation and jump straight to the target
    pub reduced_motion: bool,
    /// Frame budget reported by `perf:render`
    pub render_budget_ms: f64,
    pub pyramid: PyramidOptions,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            node_spacing_fraction: 0.11,
            node_radius_fraction: 0.035,
            max_visible_nodes: 21,
            momentum_decay: 0.95,
            momentum_min_velocity: 0.001,
            snap_duration_ms: 200.0,
            reduced_motion: false,
            render_budget_ms: 16.0,
            pyramid: PyramidOptions::default(),
        }
    }
}

impl RingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: RingConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let cfg = Self::from_json_str(&text)?;
        log::debug!("Loaded ring config from {}", path.as_ref().display());
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.node_spacing_fraction > 0.0 && self.node_spacing_fraction.is_finite()) {
            return Err(ConfigError::Invalid(
                "node_spacing_fraction must be positive".into(),
            ));
        }
        if !(self.momentum_decay > 0.0 && self.momentum_decay < 1.0) {
            return Err(ConfigError::Invalid(
                "momentum_decay must lie in (0, 1)".into(),
            ));
        }
        if self.max_visible_nodes == 0 {
            return Err(ConfigError::Invalid("max_visible_nodes must be > 0".into()));
        }
        if self.pyramid.arcs.is_empty() {
            return Err(ConfigError::Invalid("pyramid needs at least one arc".into()));
        }
        if !(self.pyramid.node_radius_fraction > 0.0 && self.pyramid.node_radius_fraction.is_finite()) {
            return Err(ConfigError::Invalid(
                "pyramid.node_radius_fraction must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let cfg = RingConfig::from_json_str(r#"{"momentum_decay": 0.9, "reduced_motion": true}"#)
            .unwrap();
        assert!((cfg.momentum_decay - 0.9).abs() < 1e-6);
        assert!(cfg.reduced_motion);
        assert_eq!(cfg.max_visible_nodes, 21);
        assert_eq!(cfg.pyramid, PyramidOptions::default());
    }

    #[test]
    fn test_rejects_bad_decay() {
        let err = RingConfig::from_json_str(r#"{"momentum_decay": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = RingConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
