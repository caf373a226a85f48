//! Network-health diagnostics CLI for multi-node test clusters.
//!
//! Checks port reuse and peer connectivity from node log files, runs
//! line-level log assertions, and inspects live TCP listeners.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};

use zombie_diag::analysis::{
    self,
    authors::RecordedBlocks,
    listeners::{self, ProcFs, ProcessSelection, DEFAULT_PROC_ROOT},
    pipeline::PeerTarget,
    report::{self, ClusterReport, ReportMetadata},
};
use zombie_diag::config::Config;
use zombie_diag::config_loader;

#[derive(Parser, Debug)]
#[command(name = "zombie-diag")]
#[command(about = "Network-health diagnostics for multi-node test cluster logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing node log files (defaults to $MOON_ZOMBIE_DIR)
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    /// Output directory for JSON and text reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check discovered external addresses for port reuse
    Ports,

    /// Check peer connectivity of collator nodes over time
    Peers {
        /// Node to sample; its log is <log-dir>/<node>.log (repeatable)
        #[arg(long = "node")]
        nodes: Vec<String>,

        /// Bracketed log tag whose "Idle (N peers)" lines are sampled
        #[arg(long)]
        tag: Option<String>,
    },

    /// Run port and connectivity checks
    Full,

    /// Check that log entries appear in the given order
    CheckLogs {
        #[arg(long)]
        file: PathBuf,

        /// Expected entry, in order (repeatable)
        #[arg(long = "expect", required = true)]
        expected: Vec<String>,
    },

    /// Check that none of the given entries appear in a log
    ForbidLogs {
        #[arg(long)]
        file: PathBuf,

        /// Forbidden entry (repeatable)
        #[arg(long = "forbid", required = true)]
        forbidden: Vec<String>,
    },

    /// Wait until a log file grows, i.e. the node is still running
    WaitGrowth {
        #[arg(long)]
        file: PathBuf,

        /// Maximum number of polls
        #[arg(long, default_value = "50")]
        polls: u32,

        /// Milliseconds between polls
        #[arg(long, default_value = "200")]
        interval_ms: u64,
    },

    /// List block authors from recorded block data
    Authors {
        /// JSON array of {"number", "author", "timestamp_ms"} records
        #[arg(long)]
        file: PathBuf,

        /// Chain label used in the output
        #[arg(long, default_value = "Container-2000")]
        label: String,
    },

    /// Inspect TCP listeners of running processes (Linux procfs)
    Listeners {
        #[command(subcommand)]
        action: ListenersAction,

        /// procfs mount to read
        #[arg(long, default_value = DEFAULT_PROC_ROOT)]
        proc_root: PathBuf,

        /// Include IPv6 sockets
        #[arg(long)]
        ipv6: bool,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ListenersAction {
    /// Fail when a TCP port is listened on by more than one process
    CheckConflicts {
        /// Limit to this PID (repeatable); all processes when no PID or name is given
        #[arg(long = "pid")]
        pids: Vec<u32>,

        /// Limit to processes with this exact name (repeatable)
        #[arg(long = "name")]
        names: Vec<String>,
    },

    /// List processes listening on a TCP port
    ByPort {
        #[arg(short, long)]
        port: u16,
    },

    /// List listening TCP ports of processes
    ByPid {
        #[arg(long = "pid")]
        pids: Vec<u32>,

        #[arg(long = "name")]
        names: Vec<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    // Set thread pool size
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = config_loader::load_or_default(cli.config.as_deref())?;

    match &cli.command {
        Commands::Ports => {
            let log_dir = config_loader::resolve_log_dir(cli.log_dir.as_deref(), &config)?;
            run_diagnostics(&cli, &config, &log_dir, true, None)
        }
        Commands::Peers { nodes, tag } => {
            let log_dir = config_loader::resolve_log_dir(cli.log_dir.as_deref(), &config)?;
            let selection = PeerSelection {
                nodes: nodes.clone(),
                tag: tag.clone(),
            };
            run_diagnostics(&cli, &config, &log_dir, false, Some(selection))
        }
        Commands::Full => {
            let log_dir = config_loader::resolve_log_dir(cli.log_dir.as_deref(), &config)?;
            run_diagnostics(&cli, &config, &log_dir, true, Some(PeerSelection::default()))
        }
        Commands::CheckLogs { file, expected } => {
            let text = read_log(file)?;
            let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
            analysis::check_logs_in_order(&text, &expected)?;
            println!("All {} entries found in order in {}", expected.len(), file.display());
            Ok(())
        }
        Commands::ForbidLogs { file, forbidden } => {
            let text = read_log(file)?;
            let forbidden: Vec<&str> = forbidden.iter().map(String::as_str).collect();
            analysis::check_logs_absent(&text, &forbidden)?;
            println!("None of {} forbidden entries found in {}", forbidden.len(), file.display());
            Ok(())
        }
        Commands::WaitGrowth {
            file,
            polls,
            interval_ms,
        } => {
            let grew = analysis::collector::wait_for_log_growth(
                file,
                Duration::from_millis(*interval_ms),
                *polls,
            )?;
            if !grew {
                return Err(eyre!("{} stopped growing; the node may be down", file.display()));
            }
            println!("{} is still growing", file.display());
            Ok(())
        }
        Commands::Authors { file, label } => {
            let blocks = RecordedBlocks::load(file)?;
            let authors = analysis::summarize_authors(&blocks)?;
            println!();
            for line in authors.render_lines(label) {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Listeners {
            action,
            proc_root,
            ipv6,
            json,
        } => run_listeners(action, &ProcFs::new(proc_root), *ipv6, *json),
    }
}

fn run_listeners(action: &ListenersAction, proc_fs: &ProcFs, include_v6: bool, json: bool) -> Result<()> {
    match action {
        ListenersAction::CheckConflicts { pids, names } => {
            let selection = ProcessSelection::resolve(proc_fs, pids, names)?;
            let found = listeners::listening_sockets(proc_fs, include_v6, &selection)?;
            let conflicts = listeners::check_listener_conflicts(&found);

            if json {
                println!("{}", serde_json::to_string_pretty(&conflicts)?);
            } else {
                print_lines(&report::listener_conflict_lines(&conflicts));
            }

            conflicts.ensure_clean()?;
            Ok(())
        }
        ListenersAction::ByPort { port } => {
            let found = listeners::listening_sockets(proc_fs, include_v6, &ProcessSelection::All)?;
            let on_port = listeners::listeners_on_port(&found, *port);

            if json {
                println!("{}", serde_json::to_string_pretty(&on_port)?);
            } else if on_port.is_empty() {
                println!("No listeners found on port {}.", port);
            } else {
                println!("Listeners on port {}:", port);
                print_lines(&report::listener_lines(&on_port));
            }
            Ok(())
        }
        ListenersAction::ByPid { pids, names } => {
            if pids.is_empty() && names.is_empty() {
                return Err(eyre!("Provide PIDs via --pid or process names via --name"));
            }
            let selection = ProcessSelection::resolve(proc_fs, pids, names)?;
            let found = listeners::listening_sockets(proc_fs, include_v6, &selection)?;
            let entries = listeners::process_ports(proc_fs, &selection, &found);

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_lines(&report::process_port_lines(&entries));
            }
            Ok(())
        }
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// Command-line overrides for the peer connectivity run
#[derive(Debug, Default)]
struct PeerSelection {
    nodes: Vec<String>,
    tag: Option<String>,
}

fn run_diagnostics(
    cli: &Cli,
    config: &Config,
    log_dir: &Path,
    run_ports: bool,
    peers: Option<PeerSelection>,
) -> Result<()> {
    log::info!("Running diagnostics over {}", log_dir.display());

    let ports = if run_ports {
        Some(analysis::scan_ports(
            log_dir,
            &config.logs.extension,
            &config.expected_node_kinds(),
        )?)
    } else {
        None
    };

    let connectivity = match peers {
        Some(selection) => {
            let names = if selection.nodes.is_empty() {
                config.peers.nodes.clone()
            } else {
                selection.nodes
            };
            let tag = selection.tag.unwrap_or_else(|| config.peers.node_tag.clone());
            let targets: Vec<PeerTarget> = names
                .iter()
                .map(|name| PeerTarget::in_dir(log_dir, name, &config.logs.extension))
                .collect();
            analysis::collect_connectivity(
                &targets,
                &tag,
                config.peers.retry_policy(),
                config.report.sparkline_width,
            )
        }
        None => Vec::new(),
    };

    let report = ClusterReport {
        metadata: ReportMetadata::now(log_dir),
        ports,
        connectivity,
        isolation_threshold: config.peers.isolation_threshold,
    };

    // Summaries are printed and written before any check can fail
    report::print_summary(&report);

    let output_dir = cli.output.clone().or_else(|| config.report.output_dir.clone());
    if let Some(output_dir) = output_dir {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
        analysis::generate_json_report(&report, &output_dir.join("diagnostics_report.json"))?;
        analysis::generate_text_report(&report, &output_dir.join("diagnostics_report.txt"))?;
    }

    let mut failures: Vec<String> = Vec::new();
    if let Some(ref scan) = report.ports {
        if let Err(e) = scan.ensure_clean() {
            failures.push(e.to_string());
        }
    }
    for conn in &report.connectivity {
        if let Err(e) = conn.check(report.isolation_threshold) {
            failures.push(e.to_string());
        }
    }

    if failures.is_empty() {
        log::info!("All network health checks passed");
        Ok(())
    } else {
        Err(eyre!("{} check(s) failed:\n{}", failures.len(), failures.join("\n")))
    }
}

fn read_log(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read log file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
