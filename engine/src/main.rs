//! lexiquest-engine: replay a scripted session headlessly.
//!
//! Reads a script of level, input and camera-frame commands, drives the
//! engine on a calloop timer and prints every resulting event as an
//! s-expression on stdout.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use clap::Parser;
use tracing::{error, info};

use lexiquest_engine::config::{EngineConfig, DEFAULT_TICK_MS};
use lexiquest_engine::replay::{ReplayRunner, Script};

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Seconds between status log lines.
const STATUS_INTERVAL_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(name = "lexiquest-engine", about = "LexiQuest input and match engine (scripted replay)")]
struct Cli {
    /// Replay script to run
    #[arg(long)]
    script: Option<PathBuf>,

    /// Engine configuration plist (overrides the built-in presets)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection tick in milliseconds (overrides the config)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Playback speed; 2.0 runs the script twice as fast as real time
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Also print hand-move and pose-progress events
    #[arg(long)]
    trace_events: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

/// Runner plus loop bookkeeping, owned by the event loop.
struct ReplayState {
    runner: ReplayRunner,
    trace_events: bool,
    running: bool,
    error: Option<anyhow::Error>,
}

impl ReplayState {
    fn emit(&self, lines: &[String]) {
        for line in lines {
            if self.trace_events || !is_high_frequency(line) {
                println!("{}", line);
            }
        }
    }
}

fn is_high_frequency(line: &str) -> bool {
    line.contains(":event :hand-move") || line.contains(":event :pose-progress")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("lexiquest-engine {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexiquest_engine=info".into()),
        )
        .init();

    info!("lexiquest-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let script_path = cli.script.context("--script is required")?;
    if !(cli.speed > 0.0) {
        anyhow::bail!("--speed must be positive, got {}", cli.speed);
    }

    let mut config = EngineConfig::default();
    if let Some(path) = &cli.config {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        config
            .apply_str(&text)
            .with_context(|| format!("applying config {}", path.display()))?;
        info!("config loaded from {}", path.display());
    }
    if let Some(tick) = cli.tick_ms {
        if tick == 0 {
            anyhow::bail!("--tick-ms must be positive");
        }
        config.tick_ms = tick;
    }
    if config.tick_ms == 0 {
        config.tick_ms = DEFAULT_TICK_MS;
    }

    let script = Script::load(&script_path)?;
    info!(
        "script {}: {} commands, {:.0}ms scripted time",
        script_path.display(),
        script.commands.len(),
        script.duration_ms()
    );

    run(config, script, cli.speed, cli.trace_events)
}

fn run(config: EngineConfig, script: Script, speed: f64, trace_events: bool) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<ReplayState>::try_new()?;
    let handle = event_loop.handle();

    let tick = Duration::from_secs_f64(config.tick_ms as f64 / 1000.0 / speed);
    let mut state = ReplayState {
        runner: ReplayRunner::new(config, script),
        trace_events,
        running: true,
        error: None,
    };

    // Scripted input plus one detection tick per firing.
    handle
        .insert_source(Timer::from_duration(tick), move |_, _, state| {
            match state.runner.advance() {
                Ok(lines) => state.emit(&lines),
                Err(e) => {
                    state.error = Some(e);
                    state.running = false;
                    return TimeoutAction::Drop;
                }
            }
            if state.runner.is_finished() {
                state.running = false;
                return TimeoutAction::Drop;
            }
            TimeoutAction::ToDuration(tick)
        })
        .map_err(|e| anyhow::anyhow!("failed to insert replay timer: {}", e.error))?;

    // Periodic status logging
    let status_interval = Duration::from_secs(STATUS_INTERVAL_SECS);
    handle
        .insert_source(Timer::from_duration(status_interval), move |_, _, state| {
            info!("status: {}", state.runner.engine().status_sexp());
            TimeoutAction::ToDuration(status_interval)
        })
        .map_err(|e| anyhow::anyhow!("failed to insert status timer: {}", e.error))?;

    // Signal handling via libc
    install_signal_handlers();

    info!("replay started (tick {:?})", tick);
    while state.running {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            break;
        }
        event_loop.dispatch(Some(tick), &mut state)?;
    }

    let engine = state.runner.engine();
    if let (Some(result), Some(earned)) = (engine.result(), engine.rewards()) {
        info!(
            "result: {} stars, score {}, {} mistakes, {} coins, {} xp",
            result.stars, result.score, result.mistakes, earned.coins, earned.xp
        );
    }

    // Gesture input always stops before exit so the camera is released.
    let lines = state.runner.shutdown();
    state.emit(&lines);

    match state.error.take() {
        Some(e) => {
            error!("replay failed: {:#}", e);
            Err(e)
        }
        None => Ok(()),
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}
