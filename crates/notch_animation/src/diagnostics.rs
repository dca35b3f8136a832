//! Per-tick diagnostics for the level animator
//!
//! Developer-only. While disabled, the only cost on the tick path is one
//! relaxed atomic load. While enabled, each tick becomes a [`TickSample`]
//! kept in a bounded ring buffer. It is also formatted into one line for
//! the [`LogSink`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::DiagnosticsConfig;
use crate::spring::SpringTier;

/// Destination for formatted diagnostics lines
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Sink that forwards lines to `tracing` at debug level
pub fn tracing_sink() -> LogSink {
    Arc::new(|line: &str| {
        tracing::debug!(target: "notch_animation::diagnostics", "{}", line);
    })
}

/// Everything the tick knows about one frame
#[derive(Clone, Copy, Debug)]
pub struct TickInput {
    pub now: Instant,
    /// Frame delta fed to the integrator, in seconds
    pub frame_delta: f64,
    pub target: f64,
    pub previous_position: f64,
    pub position: f64,
    pub velocity: f64,
    pub tier: SpringTier,
    pub target_changes: u32,
    pub settled: bool,
}

/// One recorded tick
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickSample {
    /// Milliseconds since recording started
    pub elapsed_ms: f64,
    pub frame_delta_ms: f64,
    pub fps: f64,
    pub target: f64,
    pub position: f64,
    /// `target - position` after the step
    pub remaining: f64,
    /// Distance moved during this tick
    pub step: f64,
    pub velocity: f64,
    /// Total distance moved since recording started
    pub distance: f64,
    pub target_changes: u32,
    pub tier: SpringTier,
    pub settled: bool,
}

impl TickSample {
    pub fn format_line(&self) -> String {
        format!(
            "t={:>9.2}ms dt={:>6.2}ms fps={:>6.1} target={:.4} pos={:.4} rem={:+.4} \
             step={:+.5} vel={:+.4} dist={:.4} changes={} tier={}{}",
            self.elapsed_ms,
            self.frame_delta_ms,
            self.fps,
            self.target,
            self.position,
            self.remaining,
            self.step,
            self.velocity,
            self.distance,
            self.target_changes,
            self.tier.as_str(),
            if self.settled { " settled" } else { "" }
        )
    }
}

struct RecorderInner {
    started: Option<Instant>,
    distance: f64,
    samples: VecDeque<TickSample>,
    capacity: usize,
}

/// Passive tick observer
pub struct DiagnosticsRecorder {
    enabled: AtomicBool,
    inner: Mutex<RecorderInner>,
    sink: LogSink,
}

impl DiagnosticsRecorder {
    pub fn new(config: &DiagnosticsConfig, sink: LogSink) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            enabled: AtomicBool::new(config.enabled),
            inner: Mutex::new(RecorderInner {
                started: None,
                distance: 0.0,
                samples: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            }),
            sink,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::debug!("DiagnosticsRecorder: enabled={}", enabled);
    }

    /// Clear samples, cumulative distance and the start time
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.started = None;
        inner.distance = 0.0;
        inner.samples.clear();
    }

    /// Record one tick; returns immediately when disabled
    pub fn record(&self, input: &TickInput) {
        if !self.is_enabled() {
            return;
        }

        let sample = {
            let mut inner = self.inner.lock();
            let started = *inner.started.get_or_insert(input.now);
            let step = input.position - input.previous_position;
            inner.distance += step.abs();

            let frame_delta_ms = input.frame_delta * 1000.0;
            let sample = TickSample {
                elapsed_ms: input.now.saturating_duration_since(started).as_secs_f64() * 1000.0,
                frame_delta_ms,
                fps: if input.frame_delta > 0.0 {
                    1.0 / input.frame_delta
                } else {
                    0.0
                },
                target: input.target,
                position: input.position,
                remaining: input.target - input.position,
                step,
                velocity: input.velocity,
                distance: inner.distance,
                target_changes: input.target_changes,
                tier: input.tier,
                settled: input.settled,
            };

            if inner.samples.len() == inner.capacity {
                inner.samples.pop_front();
            }
            inner.samples.push_back(sample);
            sample
        };

        // Emit outside the lock; the sink may block on I/O
        (self.sink)(&sample.format_line());
    }

    /// Recorded samples, oldest first
    pub fn samples(&self) -> Vec<TickSample> {
        self.inner.lock().samples.iter().copied().collect()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Total distance moved since the last reset
    pub fn total_distance(&self) -> f64 {
        self.inner.lock().distance
    }

    /// Export recorded samples as pretty JSON
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.samples())
    }
}
