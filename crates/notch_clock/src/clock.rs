//! Frame clock abstraction
//!
//! A frame clock invokes a tick callback at a regular cadence until the
//! callback asks it to stop. Clocks park when idle and resume on the next
//! [`FrameClock::start`].

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Control flow returned by a tick callback
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControlFlow {
    /// Keep ticking
    #[default]
    Continue,
    /// Park the clock until the next `start()`
    Exit,
}

/// Tick callback, invoked with the instant of the frame being produced
pub type TickFn = Arc<dyn Fn(Instant) -> ControlFlow + Send + Sync>;

/// A periodic clock that drives a tick callback
///
/// # Contract
///
/// - `start` is idempotent. Calling it while the clock runs only replaces
///   the callback.
/// - A `start` that races with a tick returning [`ControlFlow::Exit`] is
///   never lost: the clock produces at least one more tick.
/// - Once `stop` returns, no further ticks fire until the next `start`.
pub trait FrameClock: Send + Sync {
    /// Start ticking (or keep ticking) with the given callback
    fn start(&self, tick: TickFn);

    /// Stop ticking, waiting out any tick in flight on another thread
    fn stop(&self);

    /// Whether the clock is currently producing ticks
    fn is_running(&self) -> bool;
}

/// Frame pacing configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    /// Tick rate when pacing with the built-in timer
    pub target_fps: u32,
    /// Tick rate used after the display signal became unavailable
    pub fallback_fps: u32,
}

impl ClockConfig {
    pub fn new(target_fps: u32, fallback_fps: u32) -> Self {
        Self {
            target_fps: target_fps.max(1),
            fallback_fps: fallback_fps.max(1),
        }
    }

    /// Frame period at `target_fps`
    pub fn frame_period(&self) -> Duration {
        period_for(self.target_fps)
    }

    /// Frame period at `fallback_fps`
    pub fn fallback_period(&self) -> Duration {
        period_for(self.fallback_fps)
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            target_fps: 120,
            fallback_fps: 60,
        }
    }
}

pub(crate) fn period_for(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(fps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClockConfig::default();
        assert_eq!(config.target_fps, 120);
        assert_eq!(config.fallback_fps, 60);
        assert_eq!(config.frame_period(), Duration::from_micros(8_333));
        assert_eq!(config.fallback_period(), Duration::from_micros(16_666));
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        let config = ClockConfig::new(0, 0);
        assert_eq!(config.target_fps, 1);
        assert_eq!(config.frame_period(), Duration::from_secs(1));
    }
}
