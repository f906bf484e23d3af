//! Temperature Relay Controller: main entry point
//!
//! Hexagonal architecture with a fixed-interval tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FileBus              JsonSettingsStore     LogEventSink        │
//! │  (Bus+Service)        (SettingsPort)        (EventSink)         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Retry guard · Condition tracker · Relay arbiter       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```text
//! temprelay --bus /run/temprelay/bus.json --settings /data/temprelay.json \
//!           --service /run/temprelay/service.json [--debug]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use temprelay::adapters::file_bus::FileBus;
use temprelay::adapters::log_sink::LogEventSink;
use temprelay::adapters::settings_store::JsonSettingsStore;
use temprelay::app::events::AppEvent;
use temprelay::app::ports::{EventSink, SettingsPort};
use temprelay::app::service::AppService;
use temprelay::config::SystemConfig;
use temprelay::diagnostics;
use temprelay::error::Error;

// ── Command line ──────────────────────────────────────────────

#[derive(Debug, PartialEq)]
struct Args {
    bus: PathBuf,
    settings: Option<PathBuf>,
    service: Option<PathBuf>,
    debug: bool,
}

#[derive(Debug, PartialEq)]
enum ArgError {
    Help,
    Missing(String),
    Unknown(String),
}

const USAGE: &str =
    "Usage: temprelay [--bus PATH] [--settings PATH] [--service PATH] [--debug]";

/// Parse the arguments after the program name.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, ArgError> {
    let mut parsed = Args {
        bus: PathBuf::from("bus.json"),
        settings: None,
        service: None,
        debug: false,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bus" => parsed.bus = value_of(&arg, &mut args)?,
            "--settings" => parsed.settings = Some(value_of(&arg, &mut args)?),
            "--service" => parsed.service = Some(value_of(&arg, &mut args)?),
            "--debug" => parsed.debug = true,
            "--help" | "-h" => return Err(ArgError::Help),
            _ => return Err(ArgError::Unknown(arg)),
        }
    }

    Ok(parsed)
}

fn value_of(flag: &str, args: &mut impl Iterator<Item = String>) -> Result<PathBuf, ArgError> {
    args.next()
        .map(PathBuf::from)
        .ok_or_else(|| ArgError::Missing(flag.to_owned()))
}

// ── Logging ───────────────────────────────────────────────────

/// Route `log` records through `tracing-subscriber`. `RUST_LOG` wins over
/// `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .compact()
        .init();
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(ArgError::Help) => {
            eprintln!("{USAGE}");
            std::process::exit(0);
        }
        Err(ArgError::Missing(flag)) => {
            eprintln!("Missing value for {flag}\n{USAGE}");
            std::process::exit(2);
        }
        Err(ArgError::Unknown(arg)) => {
            eprintln!("Unknown argument: {arg}\n{USAGE}");
            std::process::exit(2);
        }
    };
    init_logging(args.debug);
    diagnostics::install_panic_handler();

    info!("temprelay v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Settings (or in-memory defaults) ───────────────────
    let mut settings = match &args.settings {
        Some(path) => JsonSettingsStore::open(path)
            .map_err(Error::from)
            .with_context(|| format!("opening settings {}", path.display()))?,
        None => {
            warn!("No --settings given, running with defaults and no persistence");
            JsonSettingsStore::in_memory()
        }
    };
    let config = match settings.load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 2. Bus adapter ────────────────────────────────────────
    let mut bus = FileBus::open(&args.bus, args.service.clone())
        .map_err(Error::from)
        .with_context(|| format!("opening bus snapshot {}", args.bus.display()))?;
    let mut sink = LogEventSink::new();

    // ── 3. Application service ────────────────────────────────
    let mut app = AppService::new(config.clone());
    app.start(&mut bus, &settings, &mut sink);

    info!(
        "Ready. Tick every {} ms, retry limit {}",
        config.tick_interval_ms, config.retry_limit
    );

    // ── 4. Tick loop ──────────────────────────────────────────
    let tick = Duration::from_millis(u64::from(config.tick_interval_ms));
    let status_every =
        (u64::from(config.status_interval_secs) * 1000 / u64::from(config.tick_interval_ms)).max(1);
    let mut status_counter: u64 = 0;

    loop {
        std::thread::sleep(tick);

        // Notifications are applied whole, before the tick runs.
        let mut commands = bus.refresh().unwrap_or_else(|e| {
            warn!("Bus refresh failed: {}", e);
            Vec::new()
        });
        match settings.reload() {
            Ok(changes) => commands.extend(changes),
            Err(e) => warn!("Settings reload failed: {}", e),
        }
        for cmd in commands {
            app.handle_command(cmd, &mut bus, &mut settings, &mut sink);
        }

        if let Err(e) = app.tick(&mut bus, &mut sink) {
            if e.is_fatal() {
                error!("Internal fault: {}, exiting", e);
                std::process::exit(1);
            }
            warn!("Tick failed: {}", e);
        }

        status_counter += 1;
        if status_counter >= status_every {
            status_counter = 0;
            sink.emit(&AppEvent::Status(app.build_status()));
            info!("METRICS | {}", app.metrics().to_json());
        }
    }
}
