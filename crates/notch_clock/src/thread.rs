//! Background-thread frame clock
//!
//! [`ThreadClock`] owns one worker thread for its whole life. While the
//! clock is stopped the worker parks on a condvar, so an idle clock costs
//! nothing. While running it either waits on a [`FrameSignal`] (display
//! refresh) or sleeps out a fixed frame interval.
//!
//! ```ignore
//! let clock = ThreadClock::new(ClockConfig::default())?;
//! clock.start(Arc::new(|now| {
//!     // advance physics
//!     ControlFlow::Continue
//! }));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::clock::{ClockConfig, ControlFlow, FrameClock, TickFn};
use crate::error::Result;

/// Source of display refresh events
///
/// Implementations block until the next refresh. Returning an error
/// permanently switches the owning clock to its fixed-interval fallback.
pub trait FrameSignal: Send {
    fn wait_for_frame(&mut self) -> Result<()>;
}

struct Control {
    running: bool,
    shutdown: bool,
    /// A tick is executing on the worker right now
    ticking: bool,
    /// Bumped by every `start()`
    epoch: u64,
    tick: Option<TickFn>,
}

struct Shared {
    control: Mutex<Control>,
    /// Signalled when the clock is started or shut down
    wake: Condvar,
    /// Signalled when an in-flight tick finishes
    tick_done: Condvar,
    fallback_active: AtomicBool,
}

/// Frame clock driven by a dedicated background thread
pub struct ThreadClock {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl ThreadClock {
    /// Create a clock paced by a fixed interval at `config.target_fps`
    pub fn new(config: ClockConfig) -> Result<Self> {
        Self::spawn(config, None)
    }

    /// Create a clock paced by a display refresh signal
    ///
    /// If the signal fails, the clock logs a warning and falls back to a
    /// fixed interval at `config.fallback_fps`.
    pub fn with_signal(config: ClockConfig, signal: Box<dyn FrameSignal>) -> Result<Self> {
        Self::spawn(config, Some(signal))
    }

    fn spawn(config: ClockConfig, signal: Option<Box<dyn FrameSignal>>) -> Result<Self> {
        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                running: false,
                shutdown: false,
                ticking: false,
                epoch: 0,
                tick: None,
            }),
            wake: Condvar::new(),
            tick_done: Condvar::new(),
            fallback_active: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("notch-frame-clock".into())
            .spawn(move || run_worker(worker_shared, config, signal))?;
        let worker_id = handle.thread().id();

        tracing::debug!(
            "ThreadClock: worker spawned (target_fps={}, fallback_fps={})",
            config.target_fps,
            config.fallback_fps
        );

        Ok(Self {
            shared,
            worker: Some(handle),
            worker_id,
        })
    }

    /// Whether the display signal failed and the timer fallback is in use
    pub fn is_using_fallback(&self) -> bool {
        self.shared.fallback_active.load(Ordering::Acquire)
    }
}

impl FrameClock for ThreadClock {
    fn start(&self, tick: TickFn) {
        let mut control = self.shared.control.lock();
        control.tick = Some(tick);
        control.epoch = control.epoch.wrapping_add(1);
        if !control.running {
            control.running = true;
            tracing::trace!("ThreadClock: start");
            self.shared.wake.notify_one();
        }
    }

    fn stop(&self) {
        let mut control = self.shared.control.lock();
        control.running = false;
        // A tick calling stop() on its own thread must not wait for itself
        if thread::current().id() != self.worker_id {
            while control.ticking {
                self.shared.tick_done.wait(&mut control);
            }
        }
    }

    fn is_running(&self) -> bool {
        self.shared.control.lock().running
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        {
            let mut control = self.shared.control.lock();
            control.shutdown = true;
            control.running = false;
            self.shared.wake.notify_one();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    shared: Arc<Shared>,
    config: ClockConfig,
    mut signal: Option<Box<dyn FrameSignal>>,
) {
    let mut frame_period = config.frame_period();

    loop {
        let (tick, epoch) = {
            let mut control = shared.control.lock();
            if !control.running && !control.shutdown {
                tracing::trace!("ThreadClock: parked");
                while !control.running && !control.shutdown {
                    shared.wake.wait(&mut control);
                }
            }
            if control.shutdown {
                break;
            }
            control.ticking = true;
            (control.tick.clone(), control.epoch)
        };

        let frame_start = Instant::now();
        let flow = match tick {
            Some(tick) => tick(frame_start),
            None => ControlFlow::Exit,
        };

        let still_running = {
            let mut control = shared.control.lock();
            control.ticking = false;
            // Only park if nobody called start() while the tick ran
            if flow == ControlFlow::Exit && control.epoch == epoch {
                control.running = false;
            }
            shared.tick_done.notify_all();
            control.running
        };

        if !still_running {
            continue;
        }

        match signal.as_mut() {
            Some(source) => {
                if let Err(err) = source.wait_for_frame() {
                    tracing::warn!(
                        "ThreadClock: frame signal failed ({}), falling back to {} fps timer",
                        err,
                        config.fallback_fps
                    );
                    signal = None;
                    frame_period = config.fallback_period();
                    shared.fallback_active.store(true, Ordering::Release);
                    sleep_remaining(frame_start, frame_period);
                }
            }
            None => sleep_remaining(frame_start, frame_period),
        }
    }

    tracing::debug!("ThreadClock: worker exiting");
}

fn sleep_remaining(frame_start: Instant, period: Duration) {
    let elapsed = frame_start.elapsed();
    if elapsed < period {
        thread::sleep(period - elapsed);
    }
}
