//! Report generation for cluster diagnostics.
//!
//! Generates both JSON and human-readable text reports. Reports are always
//! produced, whether or not a check failed, so failures can be triaged from
//! them.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::connectivity::ConnectivityReport;
use super::listeners::{Listener, ProcessPorts};
use super::pipeline::PortScan;
use super::types::CollisionReport;

/// Report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub log_dir: String,
}

impl ReportMetadata {
    pub fn now(log_dir: &Path) -> Self {
        Self {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            log_dir: log_dir.display().to_string(),
        }
    }
}

/// Everything computed by one diagnostics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub metadata: ReportMetadata,
    pub ports: Option<PortScan>,
    pub connectivity: Vec<ConnectivityReport>,
    /// Isolation threshold the connectivity section is judged against
    pub isolation_threshold: f64,
}

/// Discovered addresses per file and node kind
pub fn address_lines(scan: &PortScan) -> Vec<String> {
    let mut lines = Vec::new();

    for discovery in &scan.discoveries {
        lines.push(format!("{}:", discovery.file));
        if discovery.is_empty() {
            lines.push("  (no discovered addresses)".to_string());
            continue;
        }
        for (kind, addrs) in &discovery.addresses {
            lines.push(format!("  [{}]", kind));
            for addr in addrs {
                lines.push(format!("    {}", addr));
            }
        }
    }

    lines
}

/// Port -> owners table, collisions and missing node kinds
pub fn port_lines(scan: &PortScan) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("Ports in use: {}", scan.ownership.len()));
    for (port, owners) in &scan.ownership.owners {
        let labels: Vec<String> = owners.iter().map(|o| o.to_string()).collect();
        lines.push(format!("  {:>5}: {}", port, labels.join(", ")));
    }

    let shared: Vec<String> = scan
        .ownership
        .shared_ports()
        .map(|(port, owners)| format!("{} ({} owners)", port, owners.len()))
        .collect();
    if shared.is_empty() {
        lines.push("Shared ports: none".to_string());
    } else {
        lines.push(format!("Shared ports: {}", shared.join(", ")));
    }

    if scan.collisions.is_clean() {
        lines.push("Port collisions: none".to_string());
    } else {
        lines.push(format!("Port collisions: {}", scan.collisions.len()));
        for collision in &scan.collisions.collisions {
            lines.push(format!("  - {}", collision));
        }
    }

    if !scan.missing_kinds.is_empty() {
        let kinds: Vec<String> = scan.missing_kinds.iter().map(|k| k.to_string()).collect();
        lines.push(format!("Expected node kinds without addresses: {}", kinds.join(", ")));
    }

    lines
}

/// Peer-count summary and sparkline of one node
pub fn connectivity_lines(report: &ConnectivityReport) -> Vec<String> {
    let name = &report.node;
    let st = &report.stats;

    vec![
        format!("[{}] peers over time ({} samples)", name, report.samples),
        format!(
            "[{}] window: {}  ->  {}",
            name,
            report.first_timestamp.as_deref().unwrap_or("(unknown start)"),
            report.last_timestamp.as_deref().unwrap_or("(unknown end)")
        ),
        format!(
            "[{}] min={}, max={}, mean={:.2}, p50={}, p90={} | 1-peer={:.1}% ({}/{}) | 0-peer={:.1}% ({}/{})",
            name,
            st.min,
            st.max,
            st.mean,
            st.p50,
            st.p90,
            report.one_peer_fraction * 100.0,
            report.one_peer_samples,
            report.samples,
            report.zero_peer_fraction * 100.0,
            report.zero_peer_samples,
            report.samples
        ),
        format!("[{}] sparkline:", name),
        report.sparkline.clone(),
    ]
}

/// Listener table, one row per socket
pub fn listener_lines(listeners: &[&Listener]) -> Vec<String> {
    let mut lines = vec![format!("{:>8}  {:<20} {:<5} {:<24} {}", "PID", "NAME", "PROTO", "ADDRESS", "PORT")];
    for l in listeners {
        let address = l.address.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string());
        lines.push(format!("{:>8}  {:<20} {:<5} {:<24} {}", l.pid, l.name, l.protocol, address, l.port));
    }
    lines
}

/// Listening ports per process
pub fn process_port_lines(entries: &[ProcessPorts]) -> Vec<String> {
    let mut lines = vec![format!("{:>8}  {:<20} {}", "PID", "NAME", "LISTENING_PORTS")];
    for entry in entries {
        let ports = if entry.ports.is_empty() {
            "(none)".to_string()
        } else {
            entry.ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("{:>8}  {:<20} {}", entry.pid, entry.name, ports));
    }
    lines
}

/// Ports listened on by more than one process
pub fn listener_conflict_lines(report: &CollisionReport) -> Vec<String> {
    if report.is_clean() {
        return vec!["No conflicts found.".to_string()];
    }

    let mut lines = vec![format!("Ports listened on by more than one process: {}", report.len())];
    for collision in &report.collisions {
        lines.push(format!("  - {}", collision));
    }
    lines
}

/// Generate JSON report
pub fn generate_json_report(report: &ClusterReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Full text rendering of a report
pub fn render_text_report(report: &ClusterReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                      CLUSTER NETWORK HEALTH DIAGNOSTICS".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Analysis Date: {}", report.metadata.analysis_timestamp));
    lines.push(format!("Log Directory: {}", report.metadata.log_dir));
    lines.push(String::new());

    if let Some(ref scan) = report.ports {
        lines.push("=".repeat(80));
        lines.push("                        DISCOVERED ADDRESSES & PORTS".to_string());
        lines.push("=".repeat(80));
        lines.push(String::new());
        lines.extend(address_lines(scan));
        lines.push(String::new());
        lines.extend(port_lines(scan));
        lines.push(String::new());
    }

    if !report.connectivity.is_empty() {
        lines.push("=".repeat(80));
        lines.push("                           PEER CONNECTIVITY".to_string());
        lines.push("=".repeat(80));
        lines.push(String::new());
        lines.push(format!(
            "Isolation threshold: {:.1}% of samples with exactly 1 peer",
            report.isolation_threshold * 100.0
        ));
        lines.push(String::new());
        for conn in &report.connectivity {
            lines.extend(connectivity_lines(conn));
            let verdict = match conn.check(report.isolation_threshold) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("FAIL: {}", e),
            };
            lines.push(format!("[{}] {}", conn.node, verdict));
            lines.push(String::new());
        }
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &ClusterReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &ClusterReport) {
    println!("\n=== CLUSTER NETWORK HEALTH SUMMARY ===\n");
    println!("Log directory: {}", report.metadata.log_dir);

    if let Some(ref scan) = report.ports {
        println!();
        for line in address_lines(scan) {
            println!("{}", line);
        }
        println!();
        for line in port_lines(scan) {
            println!("{}", line);
        }
    }

    for conn in &report.connectivity {
        println!();
        for line in connectivity_lines(conn) {
            println!("{}", line);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::scan_ports_in;
    use crate::analysis::types::{LogFile, FileId, PeerSample, PeerSeries};

    fn sample_report() -> ClusterReport {
        let content = "\
t [Orchestrator] Discovered new external address for our node: /ip4/127.0.0.1/tcp/30333/ws
t [Container-2000] Discovered new external address for our node: /ip4/127.0.0.1/tcp/30333
";
        let scan = scan_ports_in(
            &[LogFile { id: FileId::new("/tmp/z/Collator1000-01.log"), content: content.to_string() }],
            &[],
        );
        let series = PeerSeries {
            samples: vec![
                PeerSample { timestamp: "10:00:00".to_string(), peer_count: 1 },
                PeerSample { timestamp: "10:00:06".to_string(), peer_count: 2 },
            ],
        };

        ClusterReport {
            metadata: ReportMetadata::now(Path::new("/tmp/z")),
            ports: Some(scan),
            connectivity: vec![ConnectivityReport::from_series("Collator2000-01", "c.log", &series, 120)],
            isolation_threshold: 0.5,
        }
    }

    #[test]
    fn test_port_lines_name_collision() {
        let report = sample_report();
        let lines = port_lines(report.ports.as_ref().unwrap());
        assert!(lines.iter().any(|l| l.contains("30333: Collator1000-01.log [Container-2000], Collator1000-01.log [Orchestrator]")));
        assert!(lines.iter().any(|l| l == "Shared ports: 30333 (2 owners)"));
        assert!(lines.iter().any(|l| l == "Port collisions: 1"));
    }

    #[test]
    fn test_port_lines_without_sharing() {
        let scan = scan_ports_in(
            &[LogFile {
                id: FileId::new("a.log"),
                content: "t [Orchestrator] Discovered new external address for our node: /ip4/1.1.1.1/tcp/1\n"
                    .to_string(),
            }],
            &[],
        );
        let lines = port_lines(&scan);
        assert!(lines.iter().any(|l| l == "Shared ports: none"));
        assert!(lines.iter().any(|l| l == "Port collisions: none"));
    }

    #[test]
    fn test_connectivity_lines() {
        let report = sample_report();
        let lines = connectivity_lines(&report.connectivity[0]);
        assert_eq!(lines[0], "[Collator2000-01] peers over time (2 samples)");
        assert_eq!(lines[1], "[Collator2000-01] window: 10:00:00  ->  10:00:06");
        assert!(lines[2].contains("1-peer=50.0% (1/2)"));
        assert_eq!(lines[4], "▁█");
    }

    #[test]
    fn test_text_report_contains_verdicts() {
        let text = render_text_report(&sample_report());
        assert!(text.contains("DISCOVERED ADDRESSES & PORTS"));
        assert!(text.contains("[Collator2000-01] OK"));
    }

    #[test]
    fn test_listener_lines() {
        use crate::analysis::listeners::{check_listener_conflicts, TcpProtocol};

        let listener = |pid: u32, name: &str| Listener {
            pid,
            name: name.to_string(),
            protocol: TcpProtocol::Tcp4,
            address: Some("0.0.0.0".parse().unwrap()),
            port: 30333,
            inode: u64::from(pid),
        };
        let listeners = vec![listener(100, "tanssi-node"), listener(200, "polkadot")];

        let refs: Vec<&Listener> = listeners.iter().collect();
        let lines = listener_lines(&refs);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("tanssi-node"));
        assert!(lines[1].contains("0.0.0.0"));

        let conflicts = listener_conflict_lines(&check_listener_conflicts(&listeners));
        assert_eq!(conflicts[0], "Ports listened on by more than one process: 1");
        assert_eq!(
            conflicts[1],
            "  - port 30333 used by 100 [tanssi-node] and 200 [polkadot] (inter-process)"
        );
        assert_eq!(listener_conflict_lines(&CollisionReport::default()), vec!["No conflicts found."]);

        let entries = vec![ProcessPorts { pid: 300, name: "tanssi-relay".to_string(), ports: vec![] }];
        assert!(process_port_lines(&entries)[1].ends_with("(none)"));
    }

    #[test]
    fn test_json_report_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        generate_json_report(&sample_report(), &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["connectivity"][0]["samples"], 2);
        assert_eq!(value["ports"]["collisions"]["collisions"][0]["port"], 30333);
    }
}
