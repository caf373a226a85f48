//! Network-health diagnostics for multi-node test clusters.
//!
//! This module scans node log files for discovered external addresses and
//! port reuse, derives peer-connectivity series with summary statistics, and
//! finds TCP ports listened on by more than one running process.

pub mod types;
pub mod log_scanner;
pub mod log_parser;
pub mod ports;
pub mod stats;
pub mod sparkline;
pub mod collector;
pub mod connectivity;
pub mod log_checks;
pub mod listeners;
pub mod authors;
pub mod pipeline;
pub mod report;

pub use types::*;
pub use log_scanner::{list_log_files, scan_log_dir};
pub use log_parser::{parse_discovered_addresses, parse_peer_series};
pub use ports::{check_port_collisions, extract_ports};
pub use stats::SeriesStats;
pub use collector::{RetryPolicy, RetryingCollector};
pub use connectivity::ConnectivityReport;
pub use log_checks::{check_logs_absent, check_logs_in_order};
pub use listeners::{check_listener_conflicts, listening_sockets, ProcFs, ProcessSelection};
pub use authors::{summarize_authors, BlockAuthorSource};
pub use pipeline::{check_connectivity, collect_connectivity, scan_ports, PeerTarget, PortScan};
pub use report::{generate_json_report, generate_text_report, ClusterReport};
