//! Indicator registry
//!
//! One [`Animator`] per indicator kind, created on first use. Each gets a
//! dedicated frame clock from the factory so that an idle indicator never
//! keeps another one ticking.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use notch_clock::FrameClock;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::animator::Animator;
use crate::config::AnimatorConfig;
use crate::publisher::{PublishedValue, WakeCallback};

/// Which HUD level bar an animator drives
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Volume,
    Brightness,
    Custom(String),
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Volume => f.write_str("volume"),
            IndicatorKind::Brightness => f.write_str("brightness"),
            IndicatorKind::Custom(name) => f.write_str(name),
        }
    }
}

/// Creates the frame clock for a newly registered indicator
pub type ClockFactory = Box<dyn Fn(&IndicatorKind) -> Arc<dyn FrameClock> + Send + Sync>;

struct Indicator {
    animator: Arc<Animator>,
    /// Handed to the UI once, by `take_display`
    display: Option<PublishedValue>,
}

pub struct IndicatorRegistry {
    config: AnimatorConfig,
    clocks: ClockFactory,
    wake: Option<WakeCallback>,
    entries: Mutex<FxHashMap<IndicatorKind, Indicator>>,
}

impl IndicatorRegistry {
    pub fn new(config: AnimatorConfig, clocks: ClockFactory) -> Self {
        Self {
            config,
            clocks,
            wake: None,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Wake callback shared by every indicator created afterwards
    pub fn with_wake(mut self, wake: WakeCallback) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Get the animator for `kind`, creating it on first use
    ///
    /// The clock factory runs without the registry lock held. If two
    /// threads race to create the same kind, the first insert wins and the
    /// other animator is dropped after the lock is released.
    pub fn animator(&self, kind: &IndicatorKind) -> Arc<Animator> {
        if let Some(entry) = self.entries.lock().get(kind) {
            return Arc::clone(&entry.animator);
        }

        let clock = (self.clocks)(kind);
        let (animator, display) = Animator::builder(self.config.clone())
            .wake_callback(self.wake.clone())
            .build(clock);
        let animator = Arc::new(animator);

        let mut entries = self.entries.lock();
        match entries.entry(kind.clone()) {
            Entry::Occupied(existing) => Arc::clone(&existing.get().animator),
            Entry::Vacant(slot) => {
                tracing::debug!("IndicatorRegistry: created animator for {}", kind);
                slot.insert(Indicator {
                    animator: Arc::clone(&animator),
                    display: Some(display),
                });
                animator
            }
        }
    }

    /// Take the UI-side displayed value for `kind`
    ///
    /// Creates the indicator if needed. Returns `None` once it has already
    /// been taken.
    pub fn take_display(&self, kind: &IndicatorKind) -> Option<PublishedValue> {
        self.animator(kind);
        self.entries
            .lock()
            .get_mut(kind)
            .and_then(|entry| entry.display.take())
    }

    /// Forward a level change to the indicator's animator
    pub fn set_level(&self, kind: &IndicatorKind, level: f64) {
        self.animator(kind).set_target(level);
    }

    /// Whether any indicator is still animating
    pub fn any_running(&self) -> bool {
        self.entries
            .lock()
            .values()
            .any(|entry| entry.animator.is_running())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
