//! Notch HUD CLI
//!
//! Drive the level animator from the terminal: replay a sequence of level
//! changes through a real frame clock and a simulated UI loop, or inspect
//! the effective configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notch_animation::{Animator, AnimatorConfig};
use notch_clock::{ClockConfig, FrameClock, ThreadClock};

/// UI frame period of the simulated main loop
const UI_FRAME: Duration = Duration::from_millis(16);

/// Give up if the animator has not parked by then
const SIMULATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "notch-hud")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Notch HUD level animator driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay level changes through an animator and a simulated UI loop
    Simulate {
        /// Comma separated levels in [0, 1]
        #[arg(short, long, value_delimiter = ',', required = true)]
        targets: Vec<f64>,

        /// Delay between level changes
        #[arg(short, long, default_value = "150")]
        interval_ms: u64,

        /// Block the UI loop once for this long after the first change
        #[arg(short, long)]
        stall_ms: Option<u64>,

        /// Frame clock rate
        #[arg(short, long, default_value = "120")]
        fps: u32,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Built-in preset, used when no file is given
        #[arg(short, long, value_enum, default_value = "standard")]
        preset: Preset,

        /// Record per-tick diagnostics (lines are logged at debug level)
        #[arg(short, long)]
        diagnostics: bool,

        /// Write recorded diagnostics to this file as JSON
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Built-in preset, used when no file is given
        #[arg(short, long, value_enum, default_value = "standard")]
        preset: Preset,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Standard,
    Snappy,
    Relaxed,
}

impl Preset {
    fn config(self) -> AnimatorConfig {
        match self {
            Preset::Standard => AnimatorConfig::standard(),
            Preset::Snappy => AnimatorConfig::snappy(),
            Preset::Relaxed => AnimatorConfig::relaxed(),
        }
    }
}

struct SimulateOptions {
    targets: Vec<f64>,
    interval: Duration,
    stall: Option<Duration>,
    fps: u32,
    config: AnimatorConfig,
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Simulate {
            targets,
            interval_ms,
            stall_ms,
            fps,
            config,
            preset,
            diagnostics,
            export,
        } => {
            let mut config = load_config(config.as_ref(), preset)?;
            if diagnostics || export.is_some() {
                config.diagnostics.enabled = true;
            }
            cmd_simulate(SimulateOptions {
                targets,
                interval: Duration::from_millis(interval_ms),
                stall: stall_ms.map(Duration::from_millis),
                fps,
                config,
                export,
            })
        }

        Commands::Config { config, preset } => cmd_config(config.as_ref(), preset),
    }
}

fn load_config(path: Option<&PathBuf>, preset: Preset) -> Result<AnimatorConfig> {
    match path {
        Some(path) => AnimatorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => Ok(preset.config()),
    }
}

fn cmd_simulate(options: SimulateOptions) -> Result<()> {
    for &target in &options.targets {
        if !target.is_finite() || !(0.0..=1.0).contains(&target) {
            warn!("Level {} is outside [0, 1] and will be clamped", target);
        }
    }

    let clock = ThreadClock::new(ClockConfig::new(options.fps, 60))
        .context("Failed to start frame clock")?;

    // The wake callback stands in for an event loop proxy
    let (wake_tx, wake_rx) = mpsc::sync_channel::<()>(1);
    let (animator, mut displayed) = Animator::builder(options.config)
        .wake(move || {
            let _ = wake_tx.try_send(());
        })
        .build(Arc::new(clock) as Arc<dyn FrameClock>);
    let animator = Arc::new(animator);

    info!(
        "Simulating {} level changes every {:?} at {} fps",
        options.targets.len(),
        options.interval,
        options.fps
    );

    // Key handler thread
    let key_animator = Arc::clone(&animator);
    let targets = options.targets.clone();
    let interval = options.interval;
    let keys = thread::Builder::new()
        .name("notch-keys".into())
        .spawn(move || {
            for target in targets {
                debug!("Key: level {:.3}", target);
                key_animator.set_target(target);
                thread::sleep(interval);
            }
        })
        .context("Failed to spawn key handler thread")?;

    let started = Instant::now();
    let mut stall = options.stall;
    let mut frames = 0u64;
    let mut last_logged = f64::NAN;

    loop {
        match wake_rx.recv_timeout(UI_FRAME) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(duration) = stall.take() {
            info!("UI: blocking main loop for {:?}", duration);
            thread::sleep(duration);
        }

        let now = Instant::now();
        if displayed.process(now) {
            frames += 1;
            let value = displayed.value();
            if (value - last_logged).abs() >= 0.001 || last_logged.is_nan() {
                info!(
                    "[{:>7.1}ms] displayed {:.4} (target {:.4})",
                    now.duration_since(started).as_secs_f64() * 1000.0,
                    value,
                    animator.target()
                );
                last_logged = value;
            }
        }

        if keys.is_finished() && !animator.is_running() && !displayed.has_pending() {
            break;
        }
        if started.elapsed() > SIMULATION_TIMEOUT {
            anyhow::bail!("Animator did not settle within {:?}", SIMULATION_TIMEOUT);
        }
    }

    keys.join()
        .map_err(|_| anyhow::anyhow!("Key handler thread panicked"))?;

    let stats = displayed.stats();
    info!(
        "Done in {:.1}ms: {} ticks, {} UI updates ({} direct, {} interpolated), {} coalesced",
        started.elapsed().as_secs_f64() * 1000.0,
        animator.tick_count(),
        frames,
        stats.direct,
        stats.interpolated,
        animator.coalesced_count()
    );
    info!("Final level {:.4}", displayed.value());

    let diagnostics = animator.diagnostics();
    if diagnostics.is_enabled() {
        info!(
            "Diagnostics: {} samples, total distance {:.4}",
            diagnostics.sample_count(),
            diagnostics.total_distance()
        );
    }

    if let Some(path) = options.export {
        let json = diagnostics
            .export_json()
            .context("Failed to serialize diagnostics")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Diagnostics written to {}", path.display());
    }

    Ok(())
}

fn cmd_config(path: Option<&PathBuf>, preset: Preset) -> Result<()> {
    let config = load_config(path, preset)?;
    let text = config
        .to_toml_string()
        .context("Failed to serialize config")?;
    print!("{}", text);
    Ok(())
}
