//! Periodic runner - repeats the sync pass on a fixed interval
//!
//! Fatal errors of a single pass are logged and the loop keeps going; the next
//! tick starts a fresh pass with fresh counters.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::sync::{SyncEngine, SyncReport};

/// Parse duration strings like "30s", "30m", "1h", "2d" or raw seconds
pub fn parse_interval(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    let seconds = if let Some(value) = duration_str.strip_suffix('s') {
        value.parse::<u64>().context("Invalid seconds value")?
    } else if let Some(value) = duration_str.strip_suffix('m') {
        value.parse::<u64>().map(|v| v * 60).context("Invalid minutes value")?
    } else if let Some(value) = duration_str.strip_suffix('h') {
        value.parse::<u64>().map(|v| v * 3600).context("Invalid hours value")?
    } else if let Some(value) = duration_str.strip_suffix('d') {
        value.parse::<u64>().map(|v| v * 86400).context("Invalid days value")?
    } else {
        duration_str
            .parse::<u64>()
            .context("Invalid duration format. Use format like '30m', '1h', '2d'")?
    };

    if seconds == 0 {
        anyhow::bail!("Sync interval must be greater than zero");
    }

    Ok(Duration::from_secs(seconds))
}

/// Runs the sync engine every `interval` until Ctrl+C
pub struct Daemon {
    engine: SyncEngine,
    interval: Duration,
}

impl Daemon {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Foreground loop; the first pass starts immediately
    pub async fn run(&self) -> Result<()> {
        info!("Starting repomirror daemon with interval {:?}", self.interval);

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping daemon");
                    break;
                }
                _ = timer.tick() => {
                    debug!("Starting scheduled sync pass");
                    match self.engine.run().await {
                        Ok(report) => log_pass(&report),
                        Err(e) => error!("Scheduled sync failed: {}", e),
                    }
                }
            }
        }

        info!("Daemon loop exiting");
        Ok(())
    }
}

fn log_pass(report: &SyncReport) {
    info!(
        "Scheduled sync finished in {:.2}s: {} succeeded, {} errors",
        report.duration.as_secs_f64(),
        report.stats.succeeded(),
        report.stats.errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_suffixes() {
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_interval(" 1H ").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("600").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_parse_interval_rejects_garbage() {
        assert!(parse_interval("soon").is_err());
        assert!(parse_interval("m").is_err());
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("").is_err());
    }
}
