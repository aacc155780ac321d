//! Facesync daemon: scores cardholder reference photos and syncs the
//! results to the cardholder-management API.
//!
//! Each cycle reads the cardholders whose biometric data changed inside the
//! rolling window, scores their primary photo, re-crops it around the face
//! when the update policy allows, and pushes score/photo state upstream.
//!
//! ## Usage
//!
//! ```bash
//! facesync              # Run in foreground, polling
//! facesync --once       # Process one batch and exit
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::path::PathBuf;
use std::thread;
use tracing::{error, info};

use facesync::config::Config;
use facesync::db::Database;
use facesync::faces::UltraFaceDetector;
use facesync::photos::DirPhotoStore;
use facesync::logging;
use facesync::sync::{HttpSyncClient, RunSummary, SyncPipeline};

/// Daemon options from the command line.
struct Options {
    /// Poll interval between batches (seconds)
    poll_interval: u64,
    /// Run one batch and exit
    once: bool,
    /// Config path override
    config_path: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            once: false,
            config_path: None,
        }
    }
}

fn main() -> Result<()> {
    let options = parse_args();

    let _ = logging::init(None);

    info!("facesync starting...");

    let config = match &options.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    config.validate().context("invalid configuration")?;
    info!("Config loaded");

    let detector = UltraFaceDetector::new();
    let store = DirPhotoStore::new(&config.photos);
    let api = HttpSyncClient::new(&config.api);

    if options.once {
        info!("Running in single-shot mode");
        let summary = run_batch(&config, &detector, &store, &api)?;
        println!("{summary}");
    } else {
        info!(
            "Running in daemon mode, polling every {} seconds",
            options.poll_interval
        );
        loop {
            match run_batch(&config, &detector, &store, &api) {
                Ok(summary) => info!(%summary, "run complete"),
                Err(e) => error!(error = %e, "batch failed"),
            }
            thread::sleep(std::time::Duration::from_secs(options.poll_interval));
        }
    }

    info!("facesync stopped");
    Ok(())
}

fn run_batch(
    config: &Config,
    detector: &UltraFaceDetector,
    store: &DirPhotoStore,
    api: &HttpSyncClient,
) -> Result<RunSummary> {
    // The connection only lives for the batch read; image and HTTP work
    // happen after it is released.
    let since = Utc::now() - Duration::hours(config.pipeline.recent_window_hours);
    let records = {
        let db = Database::open(&config.database.path).context("failed to open record store")?;
        db.fetch_recent_records(since)
            .context("failed to read recent records")?
    };

    if records.is_empty() {
        info!("no recent photo updates");
        return Ok(RunSummary::default());
    }

    info!(count = records.len(), "processing recent records");
    let pipeline = SyncPipeline::new(detector, store, api, config);
    Ok(pipeline.process_batch(&records))
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                options.once = true;
            }
            "--interval" | "-i" => {
                if i + 1 < args.len() {
                    if let Ok(interval) = args[i + 1].parse() {
                        options.poll_interval = interval;
                    }
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    options.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--version" | "-V" => {
                println!("facesync {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn print_help() {
    println!(
        r#"facesync - Cardholder reference-photo quality scoring and sync

USAGE:
    facesync [OPTIONS]

OPTIONS:
    --once, -1          Process one batch and exit
    --interval, -i N    Poll interval in seconds (default: 300)
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    FACESYNC_CONFIG     Path to config file (overrides default location)
    FACESYNC_LOG        Log level (trace, debug, info, warn, error)

Each cycle scores the primary photo of every cardholder whose biometric
data changed inside the rolling window, re-crops it around the detected
face when the update policy allows, and pushes the score and photo state
to the cardholder API.

Config file location: $XDG_CONFIG_HOME/facesync/config.toml"#
    );
}
