//! Notch level animation
//!
//! Spring-driven animation of HUD level bars (volume, brightness, ...).
//!
//! # Features
//!
//! - **Spring physics**: Semi-implicit Euler with three stiffness tiers
//!   picked by jump size
//! - **Off-thread ticking**: Physics runs on a [`notch_clock::FrameClock`]
//!   and parks once settled
//! - **UI handoff**: Single-slot lock-free mailbox, with half-way catch-up
//!   when the UI context falls behind
//! - **Diagnostics**: Optional per-tick samples and log lines
//!
//! # Example
//!
//! ```ignore
//! use notch_animation::{Animator, AnimatorConfig};
//! use notch_clock::{ClockConfig, ThreadClock};
//!
//! let clock = Arc::new(ThreadClock::new(ClockConfig::default())?);
//! let (volume, mut displayed) = Animator::builder(AnimatorConfig::standard())
//!     .wake(move || proxy.send_event(UiEvent::LevelChanged))
//!     .build(clock);
//!
//! volume.set_target(0.65);
//! ```

pub mod animator;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mailbox;
pub mod publisher;
pub mod registry;
pub mod spring;

pub use animator::{Animator, AnimatorBuilder, AnimatorState, TargetCommand};
pub use config::{AnimatorConfig, DiagnosticsConfig};
pub use diagnostics::{tracing_sink, DiagnosticsRecorder, LogSink, TickInput, TickSample};
pub use error::{ConfigError, Result};
pub use mailbox::Mailbox;
pub use publisher::{channel, PublishStats, PublishedValue, Publisher, WakeCallback};
pub use registry::{ClockFactory, IndicatorKind, IndicatorRegistry};
pub use spring::{
    clamp_unit, SpringParams, SpringState, SpringTier, StepLimits, TierTable, TierThresholds,
};
