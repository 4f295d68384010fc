//! `binsort` – servo controller for the waste-sorting bin.
//!
//! ```text
//! binsort [feed]    read classifier detections from stdin (default)
//! binsort manual    interactive shell, one sequence per command
//! ```
//!
//! Startup loads `~/.binsort/config.toml` (writing the defaults on first
//! run), acquires both PWM channels (falling back to simulation when the
//! hardware is missing), homes the router and then hands over to the
//! selected front end.  Ctrl-C releases the servos before exiting.

mod audio;
mod config;
mod feed;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use binsort_hal::{ActuatorDriver, ThreadSleeper};
use binsort_kernel::{
    DispatchMode, DispatchOutcome, Feedback, LogFeedback, SortingController, ThreadedFeedback,
};
use binsort_types::SortError;

use crate::audio::PlayerFeedback;
use crate::config::{AudioConfig, Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Feed,
    Manual,
}

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); BINSORT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("BINSORT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let mode = match std::env::args().nth(1).as_deref() {
        None | Some("feed") => Mode::Feed,
        Some("manual") => Mode::Manual,
        Some("-h" | "--help" | "help") => {
            print_usage();
            return;
        }
        Some(other) => {
            eprintln!("{} '{}'", "Unknown mode:".red(), other.yellow());
            print_usage();
            std::process::exit(2);
        }
    };

    print_banner();
    let cfg = load_config();

    let controller = match build_controller(&cfg, mode) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}: {}", "Cannot start controller".red().bold(), e);
            std::process::exit(1);
        }
    };
    // Released on every exit path from here on.
    let _lifecycle = controller.guard();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // A blocking stdin read cannot observe the flag, so the handler releases
    // the servos itself and exits.
    {
        let controller = Arc::clone(&controller);
        let shutdown = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            println!("{}", "⚠  Ctrl-C received – releasing servos …".yellow().bold());
            shutdown.store(true, Ordering::SeqCst);
            controller.shutdown();
            println!("{}", "  ✓ Servos released. Exiting.".green());
            std::process::exit(130);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; servos are only released on normal exit");
        }
    }

    controller.init();

    match mode {
        Mode::Feed => {
            println!(
                "  Reading detections from stdin ({} per cycle, blank line ends a cycle).\n",
                "<label> <confidence>".bold()
            );
            let stats = feed::run(&controller, std::io::stdin().lock(), &shutdown);
            controller.wait_idle();
            info!(?stats, "detection feed closed");
            println!(
                "\n  {} cycles, {} sorted, {} dropped while busy, {} rejected.",
                stats.cycles, stats.dispatched, stats.busy, stats.rejected
            );
        }
        Mode::Manual => {
            println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
            repl::run(&controller, &shutdown);
            controller.wait_idle();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn build_controller(cfg: &Config, mode: Mode) -> Result<SortingController, SortError> {
    let mut settings = cfg.controller_settings();
    // A blocking feed would leave later cycles buffered in the pipe and
    // replay them once the sequence ends.  Offloading keeps the reader
    // draining stdin so cycles that arrive mid-sequence are dropped.
    if mode == Mode::Feed && settings.mode != DispatchMode::Offload {
        info!("feed mode runs sequences on the mover thread");
        settings.mode = DispatchMode::Offload;
    }
    // Refuse bad settings before any PWM channel is exported.
    settings.calibration.validate()?;

    let driver = ActuatorDriver::acquire(&cfg.router.pwm(), &cfg.gate.pwm(), cfg.simulate);
    SortingController::new(
        driver,
        Arc::new(ThreadSleeper),
        build_feedback(&cfg.audio),
        settings,
    )
}

fn build_feedback(audio: &AudioConfig) -> Arc<dyn Feedback> {
    if !audio.enabled {
        return Arc::new(LogFeedback);
    }
    let player = PlayerFeedback::new(audio.player.clone(), audio.sounds_dir.clone());
    match ThreadedFeedback::spawn(Box::new(player)) {
        Ok(feedback) => Arc::new(feedback),
        Err(e) => {
            warn!(error = %e, "audio disabled");
            Arc::new(LogFeedback)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn print_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Completed(report) => {
            let started = report.started_at.with_timezone(&chrono::Local).format("%H:%M:%S");
            println!(
                "  {} {} sorted in {:.1}s (started {})",
                "✓".green().bold(),
                report.category.label().bold(),
                report.elapsed.as_secs_f32(),
                started
            );
            if report.faults > 0 {
                println!(
                    "    {} {} servo command(s) failed, see log",
                    "⚠".yellow(),
                    report.faults
                );
            }
        }
        DispatchOutcome::Offloaded => println!("  {} sequence started", "→".cyan()),
        DispatchOutcome::Busy => println!("  {}", "mechanism busy, detection dropped".yellow()),
        DispatchOutcome::Rejected => println!("  {}", "label cannot be sorted".red()),
        DispatchOutcome::NotReady => println!("  {}", "controller not ready".red()),
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___  _      ____          __ "#.bold().green());
    println!("{}", r#"  / _ )(_)__  / __/__  ____/ /_"#.bold().green());
    println!("{}", r#" / _  / / _ \_\ \/ _ \/ __/ __/"#.bold().green());
    println!("{}", r#"/____/_/_//_/___/\___/_/  \__/ "#.bold().green());
    println!();
    println!(
        "  {} {}",
        "BinSort".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Waste-sorting servo controller");
    println!();
}

fn print_usage() {
    println!("{}", "Usage:".bold());
    println!("  binsort [feed]   read '<label> <confidence>' lines from stdin");
    println!("  binsort manual   interactive shell");
    println!();
    println!("{}", "Environment:".bold());
    println!("  BINSORT_SIMULATE=1         never touch the PWM hardware");
    println!("  BINSORT_MIN_CONFIDENCE=x   detection threshold (0.0 – 1.0)");
    println!("  BINSORT_PWM_CHIP=n         sysfs pwmchip for both servos");
    println!("  BINSORT_LOG_FORMAT=json    JSON log output");
}
