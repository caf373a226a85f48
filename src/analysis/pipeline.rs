//! End-to-end diagnostics runs over a cluster log directory.
//!
//! Each run first computes a result value and only then, in a separate call,
//! turns violations into errors.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};

use super::collector::{RetryPolicy, RetryingCollector};
use super::connectivity::ConnectivityReport;
use super::log_parser::discover_all;
use super::log_scanner::scan_log_dir;
use super::ports::{build_port_ownership, check_port_collisions};
use super::types::*;

/// Result of the address discovery and port checks over one directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortScan {
    pub discoveries: Vec<FileDiscovery>,
    pub ownership: PortOwnership,
    pub collisions: CollisionReport,
    /// Expected node kinds that did not report any address
    pub missing_kinds: Vec<NodeKind>,
}

impl PortScan {
    pub fn ensure_clean(&self) -> Result<(), DiagnosticError> {
        self.collisions.ensure_clean()
    }
}

/// Run discovery and port checks over already loaded log files
pub fn scan_ports_in(files: &[LogFile], expected_kinds: &[NodeKind]) -> PortScan {
    let discoveries = discover_all(files);
    let ownership = build_port_ownership(&discoveries);
    let collisions = check_port_collisions(&discoveries);

    let seen: BTreeSet<&NodeKind> = discoveries.iter().flat_map(|d| d.addresses.keys()).collect();
    let missing_kinds: Vec<NodeKind> = expected_kinds
        .iter()
        .filter(|k| !seen.contains(k))
        .cloned()
        .collect();
    for kind in &missing_kinds {
        log::warn!("No external address discovered for expected node kind [{}]", kind);
    }

    log::info!(
        "Scanned {} files: {} ports, {} collisions",
        discoveries.len(),
        ownership.len(),
        collisions.len()
    );

    PortScan {
        discoveries,
        ownership,
        collisions,
        missing_kinds,
    }
}

/// Load every log file of `dir` and run the port checks
pub fn scan_ports(dir: &Path, extension: &str, expected_kinds: &[NodeKind]) -> Result<PortScan> {
    let files = scan_log_dir(dir, extension)?;
    Ok(scan_ports_in(&files, expected_kinds))
}

/// Node whose peer series should be collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTarget {
    pub name: String,
    pub log_path: PathBuf,
}

impl PeerTarget {
    /// Target for the conventional `<dir>/<name>.<extension>` log location
    pub fn in_dir(dir: &Path, name: &str, extension: &str) -> Self {
        Self {
            name: name.to_string(),
            log_path: dir.join(format!("{}.{}", name, extension.trim_start_matches('.'))),
        }
    }
}

/// Collect and summarize the peer series of every target, in order
pub fn collect_connectivity(
    targets: &[PeerTarget],
    node_tag: &str,
    policy: RetryPolicy,
    sparkline_width: usize,
) -> Vec<ConnectivityReport> {
    let collector = RetryingCollector::new(policy);

    targets
        .iter()
        .map(|target| {
            let series = collector.collect(&target.log_path, node_tag);
            log::info!("{}: collected {} peer samples", target.name, series.len());
            ConnectivityReport::from_series(
                target.name.clone(),
                target.log_path.display().to_string(),
                &series,
                sparkline_width,
            )
        })
        .collect()
}

/// Fail on the first node that has no samples or is mostly isolated
pub fn check_connectivity(reports: &[ConnectivityReport], threshold: f64) -> Result<(), DiagnosticError> {
    reports.iter().try_for_each(|r| r.check(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_target_path() {
        let target = PeerTarget::in_dir(Path::new("/tmp/zombie-1"), "Collator2000-01", ".log");
        assert_eq!(target.log_path, PathBuf::from("/tmp/zombie-1/Collator2000-01.log"));
    }

    #[test]
    fn test_missing_expected_kinds() {
        let files = vec![LogFile {
            id: FileId::new("a.log"),
            content: "t [Orchestrator] Discovered new external address for our node: /ip4/1.1.1.1/tcp/1\n"
                .to_string(),
        }];
        let scan = scan_ports_in(&files, &[NodeKind::new("Orchestrator"), NodeKind::new("Container-2000")]);
        assert_eq!(scan.missing_kinds, vec![NodeKind::new("Container-2000")]);
        assert!(scan.ensure_clean().is_ok());
    }

    #[test]
    fn test_empty_scan_is_clean() {
        let scan = PortScan::default();
        assert!(scan.discoveries.is_empty());
        assert!(scan.ownership.is_empty());
        assert!(scan.ensure_clean().is_ok());
        assert_eq!(scan, scan_ports_in(&[], &[]));
    }
}
