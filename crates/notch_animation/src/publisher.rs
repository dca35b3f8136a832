//! Cross-thread publisher
//!
//! Hands level values from the physics tick to the UI-bound context
//! without ever blocking the tick.
//!
//! - [`Publisher`] lives on the physics side. Each `publish` overwrites a
//!   single-slot [`Mailbox`] and fires the optional wake callback.
//! - [`PublishedValue`] lives on the UI side and is driven through
//!   `&mut self`. `process` drains the mailbox into the displayed value. When
//!   the UI has fallen behind (the gap since its last publish exceeds the
//!   skip threshold), it closes at most half of the remaining distance
//!   instead of snapping to the late physics value. It keeps doing so for
//!   every following value until the display is within the settle
//!   distance again. The unreached value stays queued, so the UI should
//!   keep calling `process` once per frame while [`PublishedValue::has_pending`]
//!   reports one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::mailbox::Mailbox;
use crate::spring::clamp_unit;

/// Fraction of the remaining distance a lagging UI may close per publish
pub const MAX_CATCH_UP_FRACTION: f64 = 0.5;

/// Callback type for waking up the UI context from the physics thread
///
/// Called after every physics-side enqueue. It should schedule
/// `PublishedValue::process` on the UI event loop (e.g. via an event loop
/// proxy) and return at once.
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

/// Create a connected publisher and displayed value
pub fn channel(
    initial: f64,
    skip_threshold: Duration,
    settle_distance: f64,
    wake: Option<WakeCallback>,
) -> (Publisher, PublishedValue) {
    let mailbox = Arc::new(Mailbox::new());
    let publisher = Publisher {
        mailbox: Arc::clone(&mailbox),
        wake,
        published: AtomicU64::new(0),
        coalesced: AtomicU64::new(0),
    };
    let displayed = PublishedValue {
        mailbox,
        value: clamp_unit(initial),
        last_publish: None,
        catching_up: false,
        skip_threshold,
        settle_distance,
        observers: Vec::new(),
        stats: PublishStats::default(),
    };
    (publisher, displayed)
}

/// Physics-side end of the channel
pub struct Publisher {
    mailbox: Arc<Mailbox>,
    wake: Option<WakeCallback>,
    published: AtomicU64,
    coalesced: AtomicU64,
}

impl Publisher {
    /// Enqueue a value for the UI context; never blocks
    pub fn publish(&self, value: f64) {
        if self.mailbox.put(clamp_unit(value)) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        if let Some(ref wake) = self.wake {
            wake();
        }
    }

    /// Values enqueued so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Values overwritten before the UI context picked them up
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

/// Counters describing how the UI side has been publishing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub direct: u64,
    pub interpolated: u64,
}

/// UI-side displayed level, read by the progress bar renderer
pub struct PublishedValue {
    mailbox: Arc<Mailbox>,
    value: f64,
    last_publish: Option<Instant>,
    /// Set by a late publish, cleared once within the settle distance
    catching_up: bool,
    skip_threshold: Duration,
    settle_distance: f64,
    observers: Vec<Box<dyn FnMut(f64) + Send>>,
    stats: PublishStats,
}

impl PublishedValue {
    /// The value the indicator should currently display
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn last_publish_time(&self) -> Option<Instant> {
        self.last_publish
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Whether the display is still closing a gap left by a late publish
    pub fn is_catching_up(&self) -> bool {
        self.catching_up
    }

    /// Whether a value is waiting to be processed
    pub fn has_pending(&self) -> bool {
        !self.mailbox.is_empty()
    }

    /// Register an observer called with every newly published value
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Drain the mailbox into the displayed value
    ///
    /// Returns `true` if a value was published. Call from the UI context in
    /// response to the wake callback, and once per frame while a value is
    /// pending.
    pub fn process(&mut self, now: Instant) -> bool {
        let Some(internal) = self.mailbox.take() else {
            return false;
        };

        let remaining = internal - self.value;
        let lagging = self
            .last_publish
            .is_some_and(|last| now.saturating_duration_since(last) > self.skip_threshold);
        if lagging {
            self.catching_up = true;
        }

        let next = if self.catching_up && remaining.abs() >= self.settle_distance {
            let limit = remaining.abs() * MAX_CATCH_UP_FRACTION;
            let next = self.value + remaining.clamp(-limit, limit);
            // Left for the next frame unless a newer value already arrived
            self.mailbox.put_if_empty(internal);
            self.stats.interpolated += 1;
            tracing::trace!(
                "PublishedValue: interpolated {:.4} -> {:.4} (internal {:.4})",
                self.value,
                next,
                internal
            );
            next
        } else {
            self.catching_up = false;
            self.stats.direct += 1;
            internal
        };

        self.value = clamp_unit(next);
        self.last_publish = Some(now);
        for observer in self.observers.iter_mut() {
            observer(self.value);
        }
        true
    }
}
