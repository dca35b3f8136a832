//! Notch frame clock
//!
//! Periodic, high-rate tick sources for the HUD level animator.
//!
//! - [`FrameClock`] - The clock contract; ticks park the clock by
//!   returning [`ControlFlow::Exit`]
//! - [`ThreadClock`] - Background worker paced by a display [`FrameSignal`]
//!   or a fixed interval, falling back to the timer when the signal fails
//! - [`ManualClock`] - Single-step test double with synthetic time

mod clock;
mod error;
mod manual;
mod thread;

pub use clock::{ClockConfig, ControlFlow, FrameClock, TickFn};
pub use error::{ClockError, Result};
pub use manual::ManualClock;
pub use thread::{FrameSignal, ThreadClock};
