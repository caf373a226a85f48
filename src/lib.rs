//! # Zombie Diag - Network-health diagnostics for multi-node test clusters
//!
//! This library inspects the log files written by the node processes of a
//! local test cluster and checks that the cluster's networking is healthy.
//!
//! ## Overview
//!
//! Two independent pipelines run over static log text:
//!
//! - **Port checks**: every "Discovered new external address" line is
//!   collected per file and node kind, ports are extracted from the
//!   multiaddresses, and port reuse inside a file or across files is reported.
//! - **Peer connectivity**: the periodic `Idle (N peers)` lines of a node are
//!   turned into a time series, summarized (min/max/mean/p50/p90), rendered as
//!   a sparkline, and checked against an isolation threshold.
//!
//! Both pipelines compute a report first and assert on it in a separate step.
//!
//! On Linux, the listening TCP sockets of running processes can also be read
//! from procfs and checked for ports held by more than one process.
//!
//! ## Architecture
//!
//! - `analysis`: log scanning, parsing, port checks, listener checks, statistics and reports
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and log directory resolution
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use zombie_diag::analysis;
//!
//! let scan = analysis::scan_ports(Path::new("/tmp/zombie-1234"), "log", &[])?;
//! for collision in &scan.collisions.collisions {
//!     println!("{}", collision);
//! }
//! scan.ensure_clean()?;
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! Check violations are `analysis::DiagnosticError` values naming the
//! offending file, node kind or port. Functions that touch the filesystem
//! return `color_eyre::eyre::Result` with context attached.

pub mod analysis;
pub mod config;
pub mod config_loader;
