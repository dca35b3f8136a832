//! Spring physics for level indicators
//!
//! Semi-implicit Euler integration of a unit-mass damped spring on the
//! normalized `[0, 1]` range. Parameters are picked per target change from
//! three tiers, so a small nudge eases in gently while a full sweep stays
//! quick.

use serde::{Deserialize, Serialize};

/// Stiffness and damping for one spring tier (unit mass)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
}

impl SpringParams {
    pub fn new(stiffness: f64, damping: f64) -> Self {
        Self { stiffness, damping }
    }

    /// Parameters for jumps larger than 30% of the range
    pub fn large() -> Self {
        Self::new(100.0, 20.0)
    }

    /// Parameters for jumps between 10% and 30%
    pub fn medium() -> Self {
        Self::new(70.0, 17.0)
    }

    /// Parameters for jumps under 10%
    pub fn small() -> Self {
        Self::new(30.0, 11.0)
    }

    /// Critical damping for this stiffness at unit mass
    pub fn critical_damping(&self) -> f64 {
        2.0 * self.stiffness.sqrt()
    }

    /// Damping ratio (1.0 = critically damped)
    pub fn damping_ratio(&self) -> f64 {
        self.damping / self.critical_damping()
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.damping < self.critical_damping() - 0.01
    }

    /// Check if the spring is critically damped (no oscillation, fastest settling)
    pub fn is_critically_damped(&self) -> bool {
        (self.damping - self.critical_damping()).abs() <= 0.01
    }

    /// Check if the spring is overdamped (slow settling, no oscillation)
    pub fn is_overdamped(&self) -> bool {
        self.damping > self.critical_damping() + 0.01
    }
}

/// Spring preset selected from the size of a target jump
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpringTier {
    Large,
    Medium,
    #[default]
    Small,
}

impl SpringTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpringTier::Large => "large",
            SpringTier::Medium => "medium",
            SpringTier::Small => "small",
        }
    }
}

/// Jump-size boundaries between tiers, as fractions of the full range
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Jumps strictly above this use [`SpringTier::Large`]
    pub large: f64,
    /// Jumps at or above this (and not large) use [`SpringTier::Medium`]
    pub medium: f64,
}

impl TierThresholds {
    pub fn select(&self, jump: f64) -> SpringTier {
        let jump = jump.abs();
        if jump > self.large {
            SpringTier::Large
        } else if jump >= self.medium {
            SpringTier::Medium
        } else {
            SpringTier::Small
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            large: 0.30,
            medium: 0.10,
        }
    }
}

/// Parameters for every tier
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub large: SpringParams,
    pub medium: SpringParams,
    pub small: SpringParams,
}

impl TierTable {
    pub fn params(&self, tier: SpringTier) -> SpringParams {
        match tier {
            SpringTier::Large => self.large,
            SpringTier::Medium => self.medium,
            SpringTier::Small => self.small,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            large: SpringParams::large(),
            medium: SpringParams::medium(),
            small: SpringParams::small(),
        }
    }
}

/// Safety bounds applied on every integration step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepLimits {
    /// Velocity clamp in units per second
    pub max_velocity: f64,
    /// Settle when `|position - target|` is below this...
    pub settle_distance: f64,
    /// ...and `|velocity|` is below this
    pub settle_velocity: f64,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            max_velocity: 10.0,
            settle_distance: 0.005,
            settle_velocity: 0.5,
        }
    }
}

/// Integrator state for one indicator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringState {
    pub position: f64,
    pub velocity: f64,
    pub target: f64,
    pub settled: bool,
}

impl SpringState {
    /// A spring at rest on `value`
    pub fn at_rest(value: f64) -> Self {
        let value = clamp_unit(value);
        Self {
            position: value,
            velocity: 0.0,
            target: value,
            settled: true,
        }
    }

    /// Check if the spring is within both settle tolerances
    pub fn is_within_settle(&self, limits: &StepLimits) -> bool {
        (self.position - self.target).abs() < limits.settle_distance
            && self.velocity.abs() < limits.settle_velocity
    }

    /// Advance one step of `dt` seconds
    ///
    /// `F = -k·(x - target) - c·v` with unit mass, then
    /// `v' = v + F·dt` and `x' = x + v'·dt`. The result is clamped to
    /// `[0, 1]` and snapped onto the target once it settles.
    pub fn step(self, params: SpringParams, limits: &StepLimits, dt: f64) -> Self {
        let mut next = Self {
            position: clamp_unit(self.position),
            target: clamp_unit(self.target),
            ..self
        };

        if next.is_within_settle(limits) {
            return next.settle();
        }
        if dt <= 0.0 || !dt.is_finite() {
            next.settled = false;
            return next;
        }

        let spring_force = -params.stiffness * (next.position - next.target);
        let damping_force = -params.damping * next.velocity;
        let acceleration = spring_force + damping_force;

        // Must tolerate a negative or NaN limit
        let max_velocity = limits.max_velocity.abs();
        let velocity = (next.velocity + acceleration * dt)
            .max(-max_velocity)
            .min(max_velocity);
        let position = next.position + velocity * dt;

        next.position = clamp_unit(position);
        next.velocity = velocity;
        // Pinned on a range edge: drop the component pushing further out
        if (next.position <= 0.0 && velocity < 0.0) || (next.position >= 1.0 && velocity > 0.0) {
            next.velocity = 0.0;
        }

        if next.is_within_settle(limits) {
            next.settle()
        } else {
            next.settled = false;
            next
        }
    }

    fn settle(mut self) -> Self {
        self.position = self.target;
        self.velocity = 0.0;
        self.settled = true;
        self
    }
}

/// Clamp to the normalized range; NaN collapses to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
