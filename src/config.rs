use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::collector::RetryPolicy;
use crate::analysis::connectivity::DEFAULT_ISOLATION_THRESHOLD;
use crate::analysis::log_scanner::DEFAULT_LOG_EXTENSION;
use crate::analysis::sparkline::DEFAULT_WIDTH;
use crate::analysis::types::NodeKind;

/// Diagnostics configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logs: LogsConfig,
    pub ports: PortsConfig,
    pub peers: PeersConfig,
    pub report: ReportConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.logs.extension.trim_start_matches('.').is_empty() {
            return Err(ValidationError::InvalidLogs(
                "extension cannot be empty".to_string(),
            ));
        }

        if self.peers.node_tag.trim().is_empty() {
            return Err(ValidationError::InvalidPeers(
                "node_tag cannot be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.peers.isolation_threshold) {
            return Err(ValidationError::InvalidPeers(format!(
                "isolation_threshold must be between 0.0 and 1.0, got {}",
                self.peers.isolation_threshold
            )));
        }
        if self.peers.min_samples == 0 {
            return Err(ValidationError::InvalidPeers(
                "min_samples must be at least 1".to_string(),
            ));
        }
        if self.peers.max_attempts == 0 {
            return Err(ValidationError::InvalidPeers(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.peers.nodes.iter().any(|n| n.trim().is_empty()) {
            return Err(ValidationError::InvalidPeers(
                "node names cannot be empty".to_string(),
            ));
        }

        if self.report.sparkline_width == 0 {
            return Err(ValidationError::InvalidReport(
                "sparkline_width must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Expected node kinds as typed labels
    pub fn expected_node_kinds(&self) -> Vec<NodeKind> {
        self.ports.expected_node_kinds.iter().map(NodeKind::new).collect()
    }
}

/// Where node logs live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub extension: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            extension: DEFAULT_LOG_EXTENSION.to_string(),
        }
    }
}

/// Address discovery settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Node kinds expected to report external addresses
    pub expected_node_kinds: Vec<String>,
}

/// Peer connectivity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    /// Bracketed tag whose `Idle (N peers)` lines are sampled
    pub node_tag: String,
    /// Nodes to sample; each logs to `<dir>/<name>.<extension>`
    pub nodes: Vec<String>,
    pub isolation_threshold: f64,
    pub min_samples: usize,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
}

impl PeersConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            interval: self.retry_interval,
            min_samples: self.min_samples,
        }
    }
}

impl Default for PeersConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            node_tag: "Container-2000".to_string(),
            nodes: vec!["Collator2000-01".to_string(), "Collator2000-02".to_string()],
            isolation_threshold: DEFAULT_ISOLATION_THRESHOLD,
            min_samples: policy.min_samples,
            max_attempts: policy.max_attempts,
            retry_interval: policy.interval,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub sparkline_width: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sparkline_width: DEFAULT_WIDTH,
            output_dir: None,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid logs configuration: {0}")]
    InvalidLogs(String),
    #[error("Invalid peers configuration: {0}")]
    InvalidPeers(String),
    #[error("Invalid report configuration: {0}")]
    InvalidReport(String),
}
