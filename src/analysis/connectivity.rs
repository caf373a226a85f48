//! Peer connectivity over time for a single node.
//!
//! Building the report and asserting the isolation invariant are separate
//! steps so each can be tested on its own.

use serde::{Deserialize, Serialize};

use super::sparkline;
use super::stats::{fraction_equal, SeriesStats};
use super::types::{DiagnosticError, PeerSeries};

/// Default upper bound for the fraction of samples reporting exactly one peer
pub const DEFAULT_ISOLATION_THRESHOLD: f64 = 0.5;

/// Connectivity summary of one node's peer series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub node: String,
    pub log_path: String,
    pub samples: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub stats: SeriesStats,
    pub one_peer_samples: usize,
    pub zero_peer_samples: usize,
    pub one_peer_fraction: f64,
    pub zero_peer_fraction: f64,
    pub sparkline: String,
}

impl ConnectivityReport {
    pub fn from_series(
        node: impl Into<String>,
        log_path: impl Into<String>,
        series: &PeerSeries,
        sparkline_width: usize,
    ) -> Self {
        let counts = series.peer_counts();

        Self {
            node: node.into(),
            log_path: log_path.into(),
            samples: counts.len(),
            first_timestamp: series.first_timestamp().map(str::to_string),
            last_timestamp: series.last_timestamp().map(str::to_string),
            stats: SeriesStats::from_values(&counts),
            one_peer_samples: counts.iter().filter(|&&c| c == 1).count(),
            zero_peer_samples: counts.iter().filter(|&&c| c == 0).count(),
            one_peer_fraction: fraction_equal(&counts, 1),
            zero_peer_fraction: fraction_equal(&counts, 0),
            sparkline: sparkline::render_counts(&counts, sparkline_width),
        }
    }

    /// Fail when no samples were collected or when more than `threshold` of
    /// the samples report exactly one peer. The boundary itself passes.
    pub fn check(&self, threshold: f64) -> Result<(), DiagnosticError> {
        if self.samples == 0 {
            return Err(DiagnosticError::EmptySeries {
                node: self.node.clone(),
                path: self.log_path.clone(),
            });
        }

        if self.one_peer_fraction > threshold {
            return Err(DiagnosticError::Isolated {
                node: self.node.clone(),
                ones: self.one_peer_samples,
                total: self.samples,
                percent: self.one_peer_fraction * 100.0,
                limit: threshold * 100.0,
            });
        }

        Ok(())
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.check(threshold).is_ok()
    }
}
