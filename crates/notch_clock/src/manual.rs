//! Deterministic frame clock for tests
//!
//! [`ManualClock`] never ticks on its own. Each [`ManualClock::step`]
//! delivers exactly one tick at the clock's synthetic "now", then advances
//! time by one frame period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::{period_for, ControlFlow, FrameClock, TickFn};

struct ManualState {
    now: Instant,
    period: Duration,
    running: bool,
    epoch: u64,
    tick: Option<TickFn>,
    ticks: u64,
    starts: u64,
}

/// A frame clock advanced by hand
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Create a manual clock with the given frames per second
    pub fn with_fps(fps: u32) -> Self {
        Self::with_period(period_for(fps))
    }

    /// Create a manual clock with an explicit frame period
    pub fn with_period(period: Duration) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                period,
                running: false,
                epoch: 0,
                tick: None,
                ticks: 0,
                starts: 0,
            }),
        }
    }

    /// Convenience for sharing with an animator
    pub fn shared(fps: u32) -> Arc<Self> {
        Arc::new(Self::with_fps(fps))
    }

    /// Deliver one tick if running
    ///
    /// Returns `false` when the clock is stopped and nothing was delivered.
    pub fn step(&self) -> bool {
        let (tick, now, epoch) = {
            let state = self.state.lock();
            match (&state.tick, state.running) {
                (Some(tick), true) => (Arc::clone(tick), state.now, state.epoch),
                _ => return false,
            }
        };

        // The callback may call back into start()/stop()
        let flow = tick(now);

        let mut state = self.state.lock();
        state.ticks += 1;
        let period = state.period;
        state.now += period;
        if flow == ControlFlow::Exit && state.epoch == epoch {
            state.running = false;
        }
        true
    }

    /// Step until the clock stops or `max_ticks` ticks were delivered
    ///
    /// Returns the number of ticks delivered.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut delivered = 0;
        while delivered < max_ticks && self.step() {
            delivered += 1;
        }
        delivered
    }

    /// Move synthetic time forward without ticking
    pub fn advance(&self, by: Duration) {
        self.state.lock().now += by;
    }

    /// The instant the next tick will carry
    pub fn now(&self) -> Instant {
        self.state.lock().now
    }

    /// Total ticks delivered since creation
    pub fn tick_count(&self) -> u64 {
        self.state.lock().ticks
    }

    /// Number of stopped-to-running transitions
    pub fn start_count(&self) -> u64 {
        self.state.lock().starts
    }
}

impl FrameClock for ManualClock {
    fn start(&self, tick: TickFn) {
        let mut state = self.state.lock();
        state.tick = Some(tick);
        state.epoch = state.epoch.wrapping_add(1);
        if !state.running {
            state.running = true;
            state.starts += 1;
        }
    }

    fn stop(&self) {
        self.state.lock().running = false;
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_step_requires_start() {
        let clock = ManualClock::with_fps(120);
        assert!(!clock.step());
        assert_eq!(clock.tick_count(), 0);
    }

    #[test]
    fn test_step_advances_time_by_period() {
        let clock = ManualClock::with_period(Duration::from_millis(10));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_tick = Arc::clone(&seen);
        clock.start(Arc::new(move |now| {
            seen_tick.lock().push(now);
            ControlFlow::Continue
        }));

        let origin = clock.now();
        for _ in 0..3 {
            assert!(clock.step());
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], origin);
        assert_eq!(seen[2] - seen[0], Duration::from_millis(20));
    }

    #[test]
    fn test_exit_stops_clock() {
        let clock = ManualClock::with_fps(60);
        let counter = Arc::new(AtomicU32::new(0));
        let tick_counter = Arc::clone(&counter);
        clock.start(Arc::new(move |_| {
            if tick_counter.fetch_add(1, Ordering::SeqCst) + 1 == 4 {
                ControlFlow::Exit
            } else {
                ControlFlow::Continue
            }
        }));

        assert_eq!(clock.run_until_idle(100), 4);
        assert!(!clock.is_running());
        assert!(!clock.step());
    }

    #[test]
    fn test_start_during_exiting_tick_is_not_lost() {
        let clock = Arc::new(ManualClock::with_fps(60));
        let restart = Arc::clone(&clock);
        let counter = Arc::new(AtomicU32::new(0));
        let tick_counter = Arc::clone(&counter);

        let tick: TickFn = Arc::new(move |_| {
            tick_counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Exit
        });
        let inner = Arc::clone(&tick);
        clock.start(Arc::new(move |now| {
            // Simulates a set_target racing with the settling tick
            restart.start(Arc::clone(&inner));
            inner(now)
        }));

        assert!(clock.step());
        assert!(clock.is_running());
        assert!(clock.step());
        assert!(!clock.is_running());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_start_is_idempotent() {
        let clock = ManualClock::with_fps(120);
        let tick: TickFn = Arc::new(|_| ControlFlow::Continue);
        clock.start(Arc::clone(&tick));
        clock.start(Arc::clone(&tick));
        assert_eq!(clock.start_count(), 1);
        assert!(clock.is_running());
    }
}
