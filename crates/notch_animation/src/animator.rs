//! Level animator
//!
//! Drives one HUD level bar (volume, brightness, ...). Target changes may
//! come from any thread; the physics runs on the frame clock; the displayed
//! value belongs to the UI context.
//!
//! ```ignore
//! let clock = Arc::new(ThreadClock::new(ClockConfig::default())?);
//! let (volume, mut displayed) = Animator::new(AnimatorConfig::standard(), clock);
//!
//! // Key handler thread
//! volume.set_target(0.65);
//!
//! // UI thread, on wake
//! displayed.process(Instant::now());
//! bar.set_fraction(displayed.value());
//! ```
//!
//! # State ownership
//!
//! - `AnimatorState` is written only by the clock tick. `set_target` touches
//!   it only through a single [`TargetCommand`] slot behind a short lock.
//! - [`PublishedValue`] is written only by the UI context, fed through the
//!   one-way [`Publisher`] mailbox.
//! - The clock parks once the spring settles. The next accepted
//!   `set_target` starts it again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use notch_clock::{ControlFlow, FrameClock, TickFn};
use parking_lot::Mutex;

use crate::config::AnimatorConfig;
use crate::diagnostics::{tracing_sink, DiagnosticsRecorder, LogSink, TickInput};
use crate::publisher::{channel, PublishedValue, Publisher, WakeCallback};
use crate::spring::{clamp_unit, SpringState, SpringTier, StepLimits};

/// Physics-side state of one indicator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatorState {
    pub target: f64,
    pub position: f64,
    /// Units per second
    pub velocity: f64,
    pub settled: bool,
    pub target_change_count_since_last_tick: u32,
    /// Tier chosen by the most recently applied target change
    pub tier: SpringTier,
}

impl AnimatorState {
    fn at_rest(value: f64) -> Self {
        let value = clamp_unit(value);
        Self {
            target: value,
            position: value,
            velocity: 0.0,
            settled: true,
            target_change_count_since_last_tick: 0,
            tier: SpringTier::default(),
        }
    }
}

/// Pending target, written by `set_target` and consumed by the tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCommand {
    pub target: f64,
    pub tier: SpringTier,
    /// Set if any change since the last tick was a large jump
    pub reset_velocity: bool,
    /// Bumped by every accepted change
    pub version: u64,
    /// Accepted changes since the last tick
    pub changes: u32,
}

struct Physics {
    state: AnimatorState,
    last_tick: Option<Instant>,
    applied_version: u64,
}

struct AnimatorCore {
    config: AnimatorConfig,
    limits: StepLimits,
    command: Mutex<TargetCommand>,
    /// Latest physics position, read by `set_target` for tier selection
    position: AtomicU64,
    physics: Mutex<Physics>,
    publisher: Publisher,
    diagnostics: DiagnosticsRecorder,
    ticks: AtomicU64,
}

impl AnimatorCore {
    fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    fn tick(&self, now: Instant) -> ControlFlow {
        let mut physics = self.physics.lock();

        let max_delta = self.config.max_frame_delta();
        let frame_delta = match physics.last_tick {
            Some(previous) => now
                .saturating_duration_since(previous)
                .as_secs_f64()
                .min(max_delta),
            None => self.config.nominal_frame_delta().min(max_delta),
        };
        physics.last_tick = Some(now);

        let command = {
            let mut command = self.command.lock();
            let taken = *command;
            command.reset_velocity = false;
            command.changes = 0;
            taken
        };

        if command.version != physics.applied_version {
            physics.applied_version = command.version;
            let state = &mut physics.state;
            state.target = command.target;
            state.tier = command.tier;
            state.settled = false;
            if command.reset_velocity {
                state.velocity = 0.0;
            }
            tracing::trace!(
                "Animator: target {:.4} (tier={}, reset_velocity={})",
                command.target,
                command.tier.as_str(),
                command.reset_velocity
            );
        }
        physics.state.target_change_count_since_last_tick = command.changes;

        let state = physics.state;
        let next = SpringState {
            position: state.position,
            velocity: state.velocity,
            target: state.target,
            settled: state.settled,
        }
        .step(self.config.tiers.params(state.tier), &self.limits, frame_delta);

        physics.state.position = next.position;
        physics.state.velocity = next.velocity;
        physics.state.target = next.target;
        physics.state.settled = next.settled;
        physics.state.target_change_count_since_last_tick = 0;
        if next.settled {
            // The next start begins with a nominal frame
            physics.last_tick = None;
        }
        drop(physics);

        self.position
            .store(next.position.to_bits(), Ordering::Release);
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.publisher.publish(next.position);

        if self.diagnostics.is_enabled() {
            self.diagnostics.record(&TickInput {
                now,
                frame_delta,
                target: next.target,
                previous_position: state.position,
                position: next.position,
                velocity: next.velocity,
                tier: state.tier,
                target_changes: command.changes,
                settled: next.settled,
            });
        }

        if next.settled {
            tracing::trace!("Animator: settled at {:.4}", next.position);
            ControlFlow::Exit
        } else {
            ControlFlow::Continue
        }
    }
}

/// Builder for [`Animator`]
pub struct AnimatorBuilder {
    config: AnimatorConfig,
    initial: f64,
    wake: Option<WakeCallback>,
    sink: Option<LogSink>,
}

impl AnimatorBuilder {
    pub fn new(config: AnimatorConfig) -> Self {
        Self {
            config,
            initial: 0.0,
            wake: None,
            sink: None,
        }
    }

    /// Level shown before the first target change
    pub fn initial(mut self, value: f64) -> Self {
        self.initial = value;
        self
    }

    /// Callback fired from the physics thread whenever a value is enqueued
    pub fn wake<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wake = Some(Arc::new(callback));
        self
    }

    pub fn wake_callback(mut self, callback: Option<WakeCallback>) -> Self {
        self.wake = callback;
        self
    }

    /// Destination for diagnostics lines (defaults to `tracing`)
    pub fn diagnostics_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Create the animator and its UI-side displayed value
    ///
    /// The clock must be dedicated to this animator. Out-of-range config
    /// values are replaced by their defaults (see
    /// [`AnimatorConfig::sanitized`]).
    pub fn build(self, clock: Arc<dyn FrameClock>) -> (Animator, PublishedValue) {
        let config = self.config.sanitized();
        let initial = if self.initial.is_finite() {
            clamp_unit(self.initial)
        } else {
            0.0
        };

        let (publisher, displayed) = channel(
            initial,
            config.skip_threshold(),
            config.settle_distance,
            self.wake,
        );
        let diagnostics = DiagnosticsRecorder::new(
            &config.diagnostics,
            self.sink.unwrap_or_else(tracing_sink),
        );

        let core = Arc::new(AnimatorCore {
            limits: config.step_limits(),
            config,
            command: Mutex::new(TargetCommand {
                target: initial,
                tier: SpringTier::default(),
                reset_velocity: false,
                version: 0,
                changes: 0,
            }),
            position: AtomicU64::new(initial.to_bits()),
            physics: Mutex::new(Physics {
                state: AnimatorState::at_rest(initial),
                last_tick: None,
                applied_version: 0,
            }),
            publisher,
            diagnostics,
            ticks: AtomicU64::new(0),
        });

        let tick_core = Arc::clone(&core);
        let tick: TickFn = Arc::new(move |now| tick_core.tick(now));

        (Animator { core, clock, tick }, displayed)
    }
}

/// Spring-driven level animator for one indicator
pub struct Animator {
    core: Arc<AnimatorCore>,
    clock: Arc<dyn FrameClock>,
    tick: TickFn,
}

impl Animator {
    /// Create an animator resting at 0.0
    pub fn new(config: AnimatorConfig, clock: Arc<dyn FrameClock>) -> (Self, PublishedValue) {
        AnimatorBuilder::new(config).build(clock)
    }

    pub fn builder(config: AnimatorConfig) -> AnimatorBuilder {
        AnimatorBuilder::new(config)
    }

    /// Request a new level
    ///
    /// Non-finite values are ignored and others are clamped to `[0, 1]`.
    /// Re-sending the current target does nothing. Safe to call from any
    /// thread, at any rate.
    pub fn set_target(&self, value: f64) {
        if !value.is_finite() {
            tracing::trace!("Animator: ignoring non-finite target {}", value);
            return;
        }
        let target = clamp_unit(value);

        {
            let mut command = self.core.command.lock();
            if (command.target - target).abs() <= f64::EPSILON {
                return;
            }
            let jump = (target - self.core.position()).abs();
            command.target = target;
            command.tier = self.core.config.thresholds.select(jump);
            command.reset_velocity |= jump > self.core.config.velocity_reset_threshold;
            command.version = command.version.wrapping_add(1);
            command.changes = command.changes.saturating_add(1);
        }

        self.clock.start(Arc::clone(&self.tick));
    }

    /// The most recently requested target
    pub fn target(&self) -> f64 {
        self.core.command.lock().target
    }

    /// Latest physics position (not necessarily displayed yet)
    pub fn position(&self) -> f64 {
        self.core.position()
    }

    /// Target changes accepted since the last tick
    pub fn pending_target_changes(&self) -> u32 {
        self.core.command.lock().changes
    }

    /// Copy of the physics state
    pub fn snapshot(&self) -> AnimatorState {
        self.core.physics.lock().state
    }

    /// Whether the clock is currently ticking this animator
    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Ticks processed since creation
    pub fn tick_count(&self) -> u64 {
        self.core.ticks.load(Ordering::Relaxed)
    }

    /// Values overwritten in the mailbox before the UI picked them up
    pub fn coalesced_count(&self) -> u64 {
        self.core.publisher.coalesced_count()
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.core.config
    }

    /// Developer-only: toggle per-tick diagnostics lines
    pub fn enable_diagnostic_logging(&self, enabled: bool) {
        self.core.diagnostics.set_enabled(enabled);
    }

    /// Developer-only: clear recorded diagnostics
    pub fn reset_diagnostics(&self) {
        self.core.diagnostics.reset();
    }

    pub fn diagnostics(&self) -> &DiagnosticsRecorder {
        &self.core.diagnostics
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.clock.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notch_clock::ManualClock;
    use std::time::Duration;

    fn manual(fps: u32) -> (Arc<ManualClock>, Animator, PublishedValue) {
        let clock = ManualClock::shared(fps);
        let (animator, displayed) =
            Animator::new(AnimatorConfig::standard(), clock.clone() as Arc<dyn FrameClock>);
        (clock, animator, displayed)
    }

    /// Step the clock and let the UI keep up every tick
    fn run_in_lockstep(clock: &ManualClock, displayed: &mut PublishedValue, max: usize) -> usize {
        let mut ticks = 0;
        while ticks < max && clock.step() {
            displayed.process(clock.now());
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn test_starts_idle() {
        let (clock, animator, displayed) = manual(120);
        assert!(!animator.is_running());
        assert!(!clock.step());
        assert_eq!(displayed.value(), 0.0);
        assert!(animator.snapshot().settled);
    }

    #[test]
    fn test_scenario_a_half_jump_from_rest() {
        let (clock, animator, mut displayed) = manual(120);
        animator.set_target(0.5);

        let ticks = run_in_lockstep(&clock, &mut displayed, 1000);

        // ~84 ticks with the standard large tier at 120 Hz
        assert!(ticks <= 120, "took {} ticks", ticks);
        assert!((displayed.value() - 0.5).abs() < 0.005);
        let state = animator.snapshot();
        assert_eq!(state.tier, SpringTier::Large);
        assert!(state.velocity.abs() < 0.5);
        assert!(!animator.is_running());
    }

    #[test]
    fn test_scenario_b_rapid_changes_are_counted() {
        let (clock, animator, mut displayed) = manual(120);
        animator.enable_diagnostic_logging(true);

        animator.set_target(0.1);
        animator.set_target(0.2);
        assert_eq!(animator.pending_target_changes(), 2);
        clock.step();
        animator.set_target(0.3);
        clock.step();

        run_in_lockstep(&clock, &mut displayed, 1000);

        let samples = animator.diagnostics().samples();
        assert!(samples.iter().any(|s| s.target_changes > 1));
        assert_eq!(samples[0].target_changes, 2);
        assert_eq!(samples[1].target_changes, 1);
        assert!((displayed.value() - 0.3).abs() < 0.005);
    }

    #[test]
    fn test_scenario_c_target_clamped_before_integration() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(1.5);

        assert_eq!(animator.target(), 1.0);
        assert_eq!(animator.snapshot().position, 0.0);

        clock.step();
        let state = animator.snapshot();
        assert_eq!(state.target, 1.0);
        assert!(state.position > 0.0 && state.position <= 1.0);

        animator.set_target(-3.0);
        assert_eq!(animator.target(), 0.0);
    }

    #[test]
    fn test_scenario_d_blocked_ui_interpolates() {
        let (clock, animator, mut displayed) = manual(120);
        animator.set_target(1.0);

        run_in_lockstep(&clock, &mut displayed, 5);
        let last = displayed.value();

        // UI blocked for 100 ms while physics keeps ticking
        for _ in 0..12 {
            clock.step();
        }
        let internal = animator.position();
        assert!(internal > last);

        assert!(displayed.process(clock.now()));
        let moved = displayed.value() - last;
        assert!(moved > 0.0);
        assert!(moved <= 0.5 * (internal - last) + 1e-12);
        assert_eq!(displayed.stats().interpolated, 1);

        // A UI that processes again straight away keeps halving the gap
        let halfway = displayed.value();
        assert!(displayed.process(clock.now()));
        assert!(displayed.value() - halfway <= 0.5 * (internal - halfway) + 1e-12);
        assert!(displayed.value() < internal);

        // Still converges afterwards
        run_in_lockstep(&clock, &mut displayed, 1000);
        while displayed.process(clock.now()) {}
        assert!((displayed.value() - 1.0).abs() < 0.005);
    }

    #[test]
    fn test_idle_shutdown_and_restart() {
        let (clock, animator, mut displayed) = manual(120);
        animator.set_target(0.4);
        run_in_lockstep(&clock, &mut displayed, 1000);

        let ticks = animator.tick_count();
        assert!(!animator.is_running());
        for _ in 0..10 {
            assert!(!clock.step());
        }
        assert_eq!(animator.tick_count(), ticks);

        animator.set_target(0.6);
        assert!(animator.is_running());
        assert_eq!(clock.start_count(), 2);
        run_in_lockstep(&clock, &mut displayed, 1000);
        assert_eq!(displayed.value(), 0.6);
    }

    #[test]
    fn test_repeated_target_is_noop() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(0.8);
        for _ in 0..5 {
            clock.step();
        }
        let before = animator.snapshot();

        animator.set_target(0.8);
        animator.set_target(0.8);
        assert_eq!(animator.pending_target_changes(), 0);
        assert_eq!(clock.start_count(), 1);

        clock.step();
        let after = animator.snapshot();
        // Velocity carried on, not reset
        assert!(after.velocity >= before.velocity * 0.5);
        assert!(after.velocity > 0.0);
    }

    #[test]
    fn test_repeat_after_settle_does_not_restart() {
        let (clock, animator, mut displayed) = manual(120);
        animator.set_target(0.2);
        run_in_lockstep(&clock, &mut displayed, 1000);

        animator.set_target(0.2);
        assert!(!animator.is_running());
        assert_eq!(clock.start_count(), 1);
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(f64::NAN);
        animator.set_target(f64::INFINITY);
        animator.set_target(f64::NEG_INFINITY);

        assert_eq!(animator.target(), 0.0);
        assert!(!animator.is_running());
        assert!(!clock.step());
    }

    #[test]
    fn test_large_jump_resets_velocity() {
        let clock = ManualClock::shared(120);
        let (animator, _displayed) = Animator::builder(AnimatorConfig::standard())
            .initial(1.0)
            .build(clock.clone() as Arc<dyn FrameClock>);

        animator.set_target(0.0);
        for _ in 0..10 {
            clock.step();
        }
        assert!(animator.snapshot().velocity < -2.0);

        // Reverse by more than 15%: inherited downward momentum is dropped
        animator.set_target(1.0);
        clock.step();
        assert!(animator.snapshot().velocity > 0.0);
    }

    #[test]
    fn test_small_jump_keeps_velocity() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(1.0);
        for _ in 0..10 {
            clock.step();
        }
        let moving = animator.snapshot();
        assert!(moving.velocity > 2.0);

        animator.set_target(moving.position + 0.12);
        clock.step();
        let state = animator.snapshot();
        assert_eq!(state.tier, SpringTier::Medium);
        assert!(state.velocity > 2.0);
    }

    #[test]
    fn test_frame_delta_is_clamped() {
        let (clock, animator, _displayed) = manual(120);
        animator.enable_diagnostic_logging(true);
        animator.set_target(1.0);

        clock.step();
        // Display reconfiguration: two seconds without a frame
        clock.advance(Duration::from_secs(2));
        clock.step();

        let samples = animator.diagnostics().samples();
        assert!((samples[0].frame_delta_ms - 1000.0 / 120.0).abs() < 1e-9);
        assert!((samples[1].frame_delta_ms - 50.0).abs() < 1e-9);
        let state = animator.snapshot();
        assert!(state.position.is_finite() && state.position <= 1.0);
    }

    #[test]
    fn test_every_tier_converges() {
        for (from, to) in [(0.0, 1.0), (0.5, 0.7), (0.5, 0.55), (0.9, 0.1)] {
            let clock = ManualClock::shared(120);
            let (animator, mut displayed) = Animator::builder(AnimatorConfig::standard())
                .initial(from)
                .build(clock.clone() as Arc<dyn FrameClock>);

            animator.set_target(to);
            let ticks = run_in_lockstep(&clock, &mut displayed, 1000);

            assert!(ticks <= 150, "{} -> {} took {} ticks", from, to, ticks);
            assert!((displayed.value() - to).abs() < 0.005);
        }
    }

    #[test]
    fn test_large_jump_is_damped() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(1.0);

        let mut distances = Vec::new();
        while clock.step() {
            distances.push((1.0 - animator.position()).abs());
        }

        for pair in distances.windows(2).skip(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_diagnostics_lines_reach_sink() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_lines = Arc::clone(&lines);
        let clock = ManualClock::shared(120);
        let (animator, _displayed) = Animator::builder(AnimatorConfig::standard())
            .diagnostics_sink(Arc::new(move |line: &str| sink_lines.lock().push(line.into())))
            .build(clock.clone() as Arc<dyn FrameClock>);

        animator.set_target(0.5);
        clock.step();
        assert!(lines.lock().is_empty());

        animator.enable_diagnostic_logging(true);
        clock.step();
        clock.step();
        assert_eq!(lines.lock().len(), 2);

        animator.reset_diagnostics();
        assert_eq!(animator.diagnostics().sample_count(), 0);
    }

    #[test]
    fn test_wake_fires_per_tick() {
        let wakes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&wakes);
        let clock = ManualClock::shared(120);
        let (animator, _displayed) = Animator::builder(AnimatorConfig::standard())
            .wake(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(clock.clone() as Arc<dyn FrameClock>);

        animator.set_target(0.3);
        for _ in 0..4 {
            clock.step();
        }
        assert_eq!(wakes.load(Ordering::SeqCst), 4);
        assert_eq!(animator.coalesced_count(), 3);
    }

    #[test]
    fn test_negative_max_velocity_does_not_panic() {
        let clock = ManualClock::shared(120);
        let config = AnimatorConfig {
            max_velocity: -1.0,
            ..AnimatorConfig::standard()
        };
        let (animator, mut displayed) =
            Animator::new(config, clock.clone() as Arc<dyn FrameClock>);
        assert_eq!(animator.config().max_velocity, 10.0);

        animator.set_target(0.7);
        run_in_lockstep(&clock, &mut displayed, 1000);
        assert_eq!(displayed.value(), 0.7);
    }

    #[test]
    fn test_infinite_skip_threshold_does_not_panic() {
        let clock = ManualClock::shared(120);
        let config = AnimatorConfig {
            skip_threshold_ms: f64::INFINITY,
            ..AnimatorConfig::standard()
        };
        let (animator, mut displayed) =
            Animator::new(config, clock.clone() as Arc<dyn FrameClock>);
        assert_eq!(animator.config().skip_threshold_ms, 20.0);

        animator.set_target(0.3);
        run_in_lockstep(&clock, &mut displayed, 1000);
        assert_eq!(displayed.value(), 0.3);
    }

    #[test]
    fn test_drop_stops_clock() {
        let (clock, animator, _displayed) = manual(120);
        animator.set_target(0.9);
        assert!(clock.is_running());
        drop(animator);
        assert!(!clock.is_running());
    }
}
