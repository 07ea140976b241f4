//! Subscriber setup: console output plus an optional JSON-lines event log
//!
//! The console honours `RUST_LOG`, `--verbose` and `logging.level`. The event
//! log only receives the `repomirror::event` target and is not gated by the
//! console level, so every action record and run summary reaches it.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

/// Target carried by per-action and summary records
pub const EVENT_TARGET: &str = "repomirror::event";

/// Build the subscriber without installing it
pub fn build_subscriber(
    verbose: bool,
    logging: &LoggingConfig,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console: Box<dyn Layer<Registry> + Send + Sync> = if logging.format == "json" {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .compact()
            .with_ansi(logging.color)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let event_layer = match &logging.event_log {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open event log: {:?}", path))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter_fn(|meta| meta.target() == EVENT_TARGET)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(event_layer))
}

/// Install the subscriber for the whole process
pub fn init(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    build_subscriber(verbose, logging)?.init();
    Ok(())
}
