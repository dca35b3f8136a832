//! Animator configuration
//!
//! All tunables for the level animator in one serde-friendly struct. The
//! numbers are tuned defaults rather than hard requirements; presets cover
//! the common variations.
//!
//! ```toml
//! velocity_reset_threshold = 0.15
//! skip_threshold_ms = 20.0
//!
//! [tiers.large]
//! stiffness = 100.0
//! damping = 20.0
//!
//! [diagnostics]
//! enabled = true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::spring::{SpringParams, StepLimits, TierTable, TierThresholds};

/// Diagnostics recorder settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Start with per-tick logging enabled
    pub enabled: bool,
    /// Number of recent tick samples kept in memory
    pub capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 512,
        }
    }
}

/// Configuration for one level animator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Jumps larger than this zero the inherited velocity
    pub velocity_reset_threshold: f64,
    /// Velocity clamp in units per second
    pub max_velocity: f64,
    /// Settle distance to target
    pub settle_distance: f64,
    /// Settle velocity
    pub settle_velocity: f64,
    /// Largest frame delta fed to the integrator
    pub max_frame_delta_ms: f64,
    /// Frame rate assumed for the first tick after a start
    pub nominal_fps: u32,
    /// Publish gap above which the UI side interpolates instead of snapping
    pub skip_threshold_ms: f64,
    pub thresholds: TierThresholds,
    pub tiers: TierTable,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl AnimatorConfig {
    /// Tuned defaults for a 60-120 Hz display
    pub fn standard() -> Self {
        Self {
            velocity_reset_threshold: 0.15,
            max_velocity: 10.0,
            settle_distance: 0.005,
            settle_velocity: 0.5,
            max_frame_delta_ms: 50.0,
            nominal_fps: 120,
            skip_threshold_ms: 20.0,
            thresholds: TierThresholds::default(),
            tiers: TierTable::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }

    /// Stiffer springs for quick, key-repeat heavy indicators
    pub fn snappy() -> Self {
        Self {
            tiers: TierTable {
                large: SpringParams::new(220.0, 30.0),
                medium: SpringParams::new(160.0, 25.5),
                small: SpringParams::new(90.0, 19.0),
            },
            ..Self::standard()
        }
    }

    /// Softer springs for ambient indicators such as brightness
    pub fn relaxed() -> Self {
        Self {
            tiers: TierTable {
                large: SpringParams::new(64.0, 16.0),
                medium: SpringParams::new(45.0, 13.5),
                small: SpringParams::new(20.0, 9.0),
            },
            ..Self::standard()
        }
    }

    /// Parse from TOML and validate
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every value is finite and in range
    pub fn validate(&self) -> Result<()> {
        for (name, params) in [
            ("large", self.tiers.large),
            ("medium", self.tiers.medium),
            ("small", self.tiers.small),
        ] {
            ensure_positive(&format!("tiers.{}.stiffness", name), params.stiffness)?;
            ensure_positive(&format!("tiers.{}.damping", name), params.damping)?;
        }

        ensure_fraction("thresholds.large", self.thresholds.large)?;
        ensure_fraction("thresholds.medium", self.thresholds.medium)?;
        if self.thresholds.medium >= self.thresholds.large {
            return Err(ConfigError::Invalid(format!(
                "thresholds.medium ({}) must be below thresholds.large ({})",
                self.thresholds.medium, self.thresholds.large
            )));
        }

        ensure_fraction("velocity_reset_threshold", self.velocity_reset_threshold)?;
        ensure_fraction("settle_distance", self.settle_distance)?;
        ensure_positive("settle_velocity", self.settle_velocity)?;
        ensure_positive("max_velocity", self.max_velocity)?;
        ensure_positive("max_frame_delta_ms", self.max_frame_delta_ms)?;
        ensure_positive("skip_threshold_ms", self.skip_threshold_ms)?;

        if self.nominal_fps == 0 {
            return Err(ConfigError::Invalid("nominal_fps must be non-zero".into()));
        }
        if self.diagnostics.capacity == 0 {
            return Err(ConfigError::Invalid(
                "diagnostics.capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Replace every out-of-range value with its `standard()` counterpart
    ///
    /// Animators run whatever config they are given, so fields that never
    /// went through [`validate`](Self::validate) are repaired here. Each
    /// replacement is logged. Underdamped tiers are kept but warned about.
    pub fn sanitized(mut self) -> Self {
        let standard = Self::standard();

        for (name, params, fallback) in [
            ("large", &mut self.tiers.large, standard.tiers.large),
            ("medium", &mut self.tiers.medium, standard.tiers.medium),
            ("small", &mut self.tiers.small, standard.tiers.small),
        ] {
            if !is_positive(params.stiffness) || !is_positive(params.damping) {
                tracing::warn!(
                    "AnimatorConfig: tiers.{} {:?} is invalid, using {:?}",
                    name,
                    *params,
                    fallback
                );
                *params = fallback;
            } else if params.is_underdamped() {
                tracing::warn!(
                    "AnimatorConfig: tiers.{} is underdamped (ratio {:.2}) and will overshoot",
                    name,
                    params.damping_ratio()
                );
            }
        }

        let thresholds = self.thresholds;
        if !is_fraction(thresholds.large)
            || !is_fraction(thresholds.medium)
            || thresholds.medium >= thresholds.large
        {
            tracing::warn!(
                "AnimatorConfig: thresholds {:?} are invalid, using {:?}",
                thresholds,
                standard.thresholds
            );
            self.thresholds = standard.thresholds;
        }

        repair(
            "velocity_reset_threshold",
            &mut self.velocity_reset_threshold,
            standard.velocity_reset_threshold,
            is_fraction,
        );
        repair(
            "settle_distance",
            &mut self.settle_distance,
            standard.settle_distance,
            is_fraction,
        );
        repair(
            "settle_velocity",
            &mut self.settle_velocity,
            standard.settle_velocity,
            is_positive,
        );
        repair(
            "max_velocity",
            &mut self.max_velocity,
            standard.max_velocity,
            is_positive,
        );
        repair(
            "max_frame_delta_ms",
            &mut self.max_frame_delta_ms,
            standard.max_frame_delta_ms,
            is_positive,
        );
        repair(
            "skip_threshold_ms",
            &mut self.skip_threshold_ms,
            standard.skip_threshold_ms,
            is_positive,
        );

        if self.nominal_fps == 0 {
            tracing::warn!(
                "AnimatorConfig: nominal_fps is zero, using {}",
                standard.nominal_fps
            );
            self.nominal_fps = standard.nominal_fps;
        }
        if self.diagnostics.capacity == 0 {
            self.diagnostics.capacity = standard.diagnostics.capacity;
        }
        self
    }

    pub fn step_limits(&self) -> StepLimits {
        StepLimits {
            max_velocity: self.max_velocity,
            settle_distance: self.settle_distance,
            settle_velocity: self.settle_velocity,
        }
    }

    /// Frame delta clamp in seconds
    pub fn max_frame_delta(&self) -> f64 {
        self.max_frame_delta_ms / 1000.0
    }

    /// Nominal frame period in seconds
    pub fn nominal_frame_delta(&self) -> f64 {
        1.0 / f64::from(self.nominal_fps.max(1))
    }

    /// Publish gap that triggers catch-up; out-of-range values give 20 ms
    pub fn skip_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.skip_threshold_ms / 1000.0)
            .unwrap_or(Duration::from_millis(20))
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_fraction(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

fn repair(name: &str, value: &mut f64, fallback: f64, valid: fn(f64) -> bool) {
    if !valid(*value) {
        tracing::warn!(
            "AnimatorConfig: {} = {} is out of range, using {}",
            name,
            *value,
            fallback
        );
        *value = fallback;
    }
}

fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if is_positive(value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be a positive finite number, got {}",
            name, value
        )))
    }
}

fn ensure_fraction(name: &str, value: f64) -> Result<()> {
    if is_fraction(value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}
