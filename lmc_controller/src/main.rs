//! # LMC Controller Binary
//!
//! Runs the controller against the simulated board, with the host serial
//! link on stdin/stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Default machine, carriages 800 steps above their endstops
//! lmc_controller
//!
//! # Custom machine description
//! lmc_controller --config config/machine.toml --sim-offset 2000
//!
//! # Verbose JSON logging
//! lmc_controller -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use lmc_common::config::load_config;
use lmc_common::hal::Clock;
use lmc_common::machine::MachineConfig;
use lmc_controller::Controller;
use lmc_hal::{SimBoard, SimClock, StdClock, StdioLink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Longest sleep between polls when nothing is due.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// LMC Controller - coordinated stepper motion over a serial line protocol
#[derive(Parser, Debug)]
#[command(name = "lmc_controller")]
#[command(version)]
#[command(about = "Five-axis stepper motion controller (simulated board, stdin/stdout link)")]
#[command(long_about = None)]
struct Args {
    /// Machine configuration (TOML). Built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initial distance of every simulated carriage above its endstop [steps]
    #[arg(long, default_value_t = 800)]
    sim_offset: i64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("FATAL: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("LMC controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            info!("Loading machine config from {}", path.display());
            load_config(path)?
        }
        None => MachineConfig::default(),
    };

    let wall = StdClock::new();
    let board_clock = SimClock::new();
    let board = SimBoard::from_config(&config, board_clock.clone(), args.sim_offset);
    let mut controller = Controller::new(config, board, wall, StdioLink::spawn())?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) && !controller.link_mut().is_closed() {
        board_clock.advance_to(controller.clock().now_us());
        controller.poll();

        let now = controller.clock().now_us();
        let wait = controller.next_wakeup_us().saturating_sub(now);
        if wait > 0 {
            std::thread::sleep(Duration::from_micros(wait).min(MAX_IDLE_SLEEP));
        }
    }

    info!("LMC controller shutdown complete");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments. Logs go to stderr so
/// the protocol stream on stdout stays clean.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
