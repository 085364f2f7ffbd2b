//! ValveBox service — main entry point.
//!
//! Host build of the controller: the core runs against the simulated
//! plant and commands arrive on stdin as `<topic> <payload>` lines, the
//! same pairs a message bus transport would deliver.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                      │
//! │                                                               │
//! │  SimulatedPlant     LogEventSink   JsonFileConfig   Monotonic  │
//! │  (Digital+Analog)   (EventSink)    (ConfigPort)     (Clock)    │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ───────────────────     │
//! │                                                               │
//! │   stdin thread ──▶ Ingress ──▶ ┌─────────────────────────┐    │
//! │                                │ ControlService           │    │
//! │                                │ Fleet · Pump · Limits    │    │
//! │                                └─────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use valvebox::adapters::json_config::JsonFileConfig;
use valvebox::adapters::log_sink::LogEventSink;
use valvebox::adapters::sim::SimulatedPlant;
use valvebox::adapters::time::MonotonicClock;
use valvebox::app::ports::{Clock, ConfigPort};
use valvebox::app::service::{ControlService, Ingress};
use valvebox::config::SystemConfig;

#[derive(Parser, Debug)]
#[command(name = "valvebox", version, about = "Ball valve and pump controller")]
struct Cli {
    /// JSON configuration file; written with defaults when missing
    #[arg(short, long, env = "VALVEBOX_CONFIG", default_value = "conf/default.json")]
    config: PathBuf,

    /// Simulated full-stroke valve travel time (milliseconds)
    #[arg(long, default_value_t = 4_000)]
    travel_ms: u64,

    /// Log a status line for every valve this often (seconds, 0 = never)
    #[arg(long, default_value_t = 30)]
    status_secs: u64,

    /// Stop after this many ticks (runs forever when omitted)
    #[arg(long)]
    max_ticks: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_target(false)
        .init();

    info!("ValveBox v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let store = JsonFileConfig::new(&cli.config);
    let config = match store.load() {
        Ok(cfg) => {
            info!("Config loaded from {}", cli.config.display());
            cfg
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 2. Core + adapters ────────────────────────────────────
    let mut service = ControlService::new(&config).context("building control service")?;
    let mut plant = SimulatedPlant::new(&config, cli.travel_ms);
    let mut sink = LogEventSink::new();
    let clock = MonotonicClock::new();

    for topic in service.subscriptions() {
        info!("Listening on {}", topic);
    }
    spawn_stdin_reader(service.ingress()).context("spawning stdin reader")?;
    service.start(&mut sink);

    // ── 3. Service loop ───────────────────────────────────────
    let interval = Duration::from_millis(u64::from(config.loop_interval_ms));
    let status_every_ms = cli.status_secs * 1000;
    let mut last_status_ms = 0;

    loop {
        service.tick(&mut plant, &clock, &mut sink);
        plant.step(u64::from(config.loop_interval_ms));

        let now = clock.now_ms();
        if status_every_ms > 0 && now.saturating_sub(last_status_ms) >= status_every_ms {
            last_status_ms = now;
            for s in service.valve_status(now) {
                info!(
                    "STATUS | {} {:?} | position={:?} | timed_out={} | remaining={}ms",
                    s.name, s.state, s.position, s.timed_out, s.remaining_ms
                );
            }
        }

        if cli.max_ticks.is_some_and(|max| service.tick_count() >= max) {
            info!("Stopping after {} ticks ({} events)", service.tick_count(), sink.emitted());
            return Ok(());
        }
        thread::sleep(interval);
    }
}

/// Feed `<topic> <payload>` lines from stdin into the service queues.
fn spawn_stdin_reader(ingress: Ingress) -> std::io::Result<()> {
    thread::Builder::new()
        .name("stdin-ingress".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                if let Err(e) = ingress.deliver(topic, payload) {
                    warn!("Ignored '{}': {}", line, e);
                }
            }
            info!("stdin closed, no further commands");
        })?;
    Ok(())
}
