//! Polling of log files written by live node processes.
//!
//! Logs may be missing or only partially written when a check starts, so
//! collection retries with a fixed pause. The retry budget is the only
//! timeout; nothing here blocks indefinitely.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};

use super::log_parser::parse_peer_series;
use super::types::PeerSeries;

/// Bounded retry settings for peer-series collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of read attempts
    pub max_attempts: u32,
    /// Pause between attempts
    pub interval: Duration,
    /// Stop early once this many samples were parsed
    pub min_samples: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(5),
            min_samples: 8,
        }
    }
}

/// Reads a node log until enough `Idle (N peers)` samples are present
#[derive(Debug, Clone, Default)]
pub struct RetryingCollector {
    policy: RetryPolicy,
}

impl RetryingCollector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Collect the peer series of `node_tag` from `log_path`.
    ///
    /// Returns whatever was parsed by the last successful read once the
    /// budget runs out, which may be empty. Deciding whether an empty series
    /// is a failure is left to the caller.
    pub fn collect(&self, log_path: &Path, node_tag: &str) -> PeerSeries {
        let mut series = PeerSeries::default();

        for attempt in 1..=self.policy.max_attempts {
            match fs::read(log_path) {
                Ok(bytes) => {
                    series = parse_peer_series(&String::from_utf8_lossy(&bytes), node_tag);
                    log::debug!(
                        "{}: attempt {}/{} parsed {} samples",
                        log_path.display(),
                        attempt,
                        self.policy.max_attempts,
                        series.len()
                    );
                    if series.len() >= self.policy.min_samples {
                        break;
                    }
                }
                Err(e) => {
                    // File may not exist yet
                    log::debug!(
                        "{}: attempt {}/{} read failed: {}",
                        log_path.display(),
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                }
            }

            if attempt < self.policy.max_attempts && !self.policy.interval.is_zero() {
                thread::sleep(self.policy.interval);
            }
        }

        if series.len() < self.policy.min_samples {
            log::warn!(
                "{}: only {} of {} wanted samples after {} attempts",
                log_path.display(),
                series.len(),
                self.policy.min_samples,
                self.policy.max_attempts
            );
        }

        series
    }
}

/// Wait until `log_path` grows past its current size, i.e. the node is still logging.
///
/// Polls at most `max_polls` times, `interval` apart. Returns `Ok(false)` when
/// the file never grew.
pub fn wait_for_log_growth(log_path: &Path, interval: Duration, max_polls: u32) -> Result<bool> {
    let initial = file_size(log_path)?;

    for _ in 0..max_polls {
        thread::sleep(interval);
        if file_size(log_path)? > initial {
            return Ok(true);
        }
    }

    log::warn!(
        "{} did not grow past {} bytes after {} polls",
        log_path.display(),
        initial,
        max_polls
    );
    Ok(false)
}

fn file_size(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path)
        .with_context(|| format!("Failed to stat log file: {}", path.display()))?;
    Ok(meta.len())
}
