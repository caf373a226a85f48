//! TCP listeners of running processes, read from a procfs tree.
//!
//! With `SO_REUSEPORT` several processes can listen on the same TCP port, and
//! peers dialing that port may reach the wrong node. Sockets come from
//! `net/tcp` and `net/tcp6`; each listening socket inode is mapped to the
//! processes holding it through their `fd` links.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use color_eyre::eyre::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::*;

/// Mount point of procfs on Linux
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// `st` column value of a socket in LISTEN state
pub const TCP_LISTEN: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpProtocol {
    Tcp4,
    Tcp6,
}

impl fmt::Display for TcpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpProtocol::Tcp4 => write!(f, "tcp4"),
            TcpProtocol::Tcp6 => write!(f, "tcp6"),
        }
    }
}

/// One socket row of `net/tcp` or `net/tcp6`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpRow {
    pub protocol: TcpProtocol,
    /// Local address as printed by the kernel (little-endian hex words)
    pub local_hex: String,
    pub local_port: u16,
    pub state: u8,
    pub inode: u64,
}

impl TcpRow {
    pub fn is_listen(&self) -> bool {
        self.state == TCP_LISTEN
    }
}

/// Parse the text of `net/tcp` or `net/tcp6`.
///
/// The header line and rows that do not carry a local port, state and inode
/// are skipped.
pub fn parse_proc_net_tcp(text: &str, protocol: TcpProtocol) -> Vec<TcpRow> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 10 {
                return None;
            }
            let (local_hex, port_hex) = cols[1].rsplit_once(':')?;
            Some(TcpRow {
                protocol,
                local_hex: local_hex.to_ascii_uppercase(),
                local_port: u16::from_str_radix(port_hex, 16).ok()?,
                state: u8::from_str_radix(cols[3], 16).ok()?,
                inode: cols[9].parse().ok()?,
            })
        })
        .collect()
}

/// Decode a kernel socket address: 8 hex digits for IPv4 (`0100007F` is
/// 127.0.0.1), 32 for IPv6. Each 32-bit word is little-endian.
pub fn decode_proc_addr(hex: &str) -> Option<IpAddr> {
    let hex = hex.trim();
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let word = |chunk: &str| u32::from_str_radix(chunk, 16).ok().map(u32::swap_bytes);

    match hex.len() {
        8 => Some(IpAddr::V4(Ipv4Addr::from(word(hex)?))),
        32 => {
            let mut bytes = [0u8; 16];
            for i in 0..4 {
                let w = word(&hex[i * 8..(i + 1) * 8])?;
                bytes[i * 4..(i + 1) * 4].copy_from_slice(&w.to_be_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(bytes)))
        }
        _ => None,
    }
}

/// A procfs tree, `/proc` unless pointed elsewhere
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Socket rows of `net/tcp`, plus `net/tcp6` when `include_v6` is set.
    /// A table that cannot be read contributes no rows.
    pub fn tcp_rows(&self, include_v6: bool) -> Vec<TcpRow> {
        let mut rows = self.read_table("tcp", TcpProtocol::Tcp4);
        if include_v6 {
            rows.extend(self.read_table("tcp6", TcpProtocol::Tcp6));
        }
        rows
    }

    fn read_table(&self, name: &str, protocol: TcpProtocol) -> Vec<TcpRow> {
        let path = self.root.join("net").join(name);
        match fs::read_to_string(&path) {
            Ok(text) => parse_proc_net_tcp(&text, protocol),
            Err(e) => {
                log::warn!("Cannot read socket table {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Every process id in the tree, ascending
    pub fn pids(&self) -> Result<Vec<u32>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read process table: {}", self.root.display()))?;

        let mut pids: Vec<u32> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Socket inodes held open by `pid`. Empty when its fds cannot be read
    /// (process exited or no permission).
    pub fn socket_inodes(&self, pid: u32) -> BTreeSet<u64> {
        let fd_dir = self.root.join(pid.to_string()).join("fd");
        let entries = match fs::read_dir(&fd_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Skipping fds of PID {}: {}", pid, e);
                return BTreeSet::new();
            }
        };

        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| fs::read_link(e.path()).ok())
            .filter_map(|target| parse_socket_link(&target.to_string_lossy()))
            .collect()
    }

    /// Contents of `comm`, the kernel's short process name
    pub fn comm(&self, pid: u32) -> Option<String> {
        let comm = fs::read_to_string(self.root.join(pid.to_string()).join("comm")).ok()?;
        let comm = comm.trim_end_matches('\n');
        (!comm.is_empty()).then(|| comm.to_string())
    }

    /// Display name of `pid`: `comm`, then the command line, then `?`
    pub fn process_name(&self, pid: u32) -> String {
        if let Some(comm) = self.comm(pid) {
            return comm;
        }
        if let Ok(cmdline) = fs::read(self.root.join(pid.to_string()).join("cmdline")) {
            let cmd = String::from_utf8_lossy(&cmdline).replace('\0', " ").trim().to_string();
            if !cmd.is_empty() {
                return cmd;
            }
        }
        "?".to_string()
    }

    /// Processes whose `comm` equals one of `names` exactly (case-sensitive)
    pub fn pids_named(&self, names: &[String]) -> Result<Vec<u32>> {
        Ok(self
            .pids()?
            .into_iter()
            .filter(|&pid| self.comm(pid).is_some_and(|c| names.iter().any(|n| *n == c)))
            .collect())
    }
}

/// `socket:[12345]` -> 12345
pub fn parse_socket_link(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

/// Which processes to inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessSelection {
    All,
    Only(BTreeSet<u32>),
}

impl ProcessSelection {
    /// Explicit PIDs plus processes named exactly as in `names`. Every process
    /// when both are empty.
    pub fn resolve(proc_fs: &ProcFs, pids: &[u32], names: &[String]) -> Result<Self> {
        if pids.is_empty() && names.is_empty() {
            return Ok(Self::All);
        }

        let mut selected: BTreeSet<u32> = pids.iter().copied().collect();
        if !names.is_empty() {
            let named = proc_fs.pids_named(names)?;
            if named.is_empty() {
                log::warn!("No process named {}", names.join(", "));
            }
            selected.extend(named);
        }
        Ok(Self::Only(selected))
    }
}

/// A listening socket and the process holding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub pid: u32,
    pub name: String,
    pub protocol: TcpProtocol,
    pub address: Option<IpAddr>,
    pub port: u16,
    pub inode: u64,
}

impl Listener {
    /// Port owner for collision reporting: the PID stands in for the file
    /// and the process name for the node kind.
    pub fn owner(&self) -> PortOwner {
        PortOwner::new(FileId::new(self.pid.to_string()), NodeKind::new(&self.name))
    }
}

/// Listening sockets held by the selected processes, sorted by port then PID.
///
/// A socket shared by several processes (e.g. after a fork) is listed once
/// per process.
pub fn listening_sockets(
    proc_fs: &ProcFs,
    include_v6: bool,
    selection: &ProcessSelection,
) -> Result<Vec<Listener>> {
    let rows = proc_fs.tcp_rows(include_v6);
    let listening: BTreeMap<u64, &TcpRow> = rows
        .iter()
        .filter(|r| r.is_listen())
        .map(|r| (r.inode, r))
        .collect();

    if listening.is_empty() {
        log::info!("No listening TCP sockets found");
        return Ok(Vec::new());
    }

    let pids: Vec<u32> = match selection {
        ProcessSelection::All => proc_fs.pids()?,
        ProcessSelection::Only(set) => set.iter().copied().collect(),
    };

    let mut listeners: Vec<Listener> = pids
        .par_iter()
        .flat_map_iter(|&pid| {
            let held: Vec<&TcpRow> = proc_fs
                .socket_inodes(pid)
                .into_iter()
                .filter_map(|inode| listening.get(&inode).copied())
                .collect();
            let name = if held.is_empty() {
                String::new()
            } else {
                proc_fs.process_name(pid)
            };
            held.into_iter().map(move |row| Listener {
                pid,
                name: name.clone(),
                protocol: row.protocol,
                address: decode_proc_addr(&row.local_hex),
                port: row.local_port,
                inode: row.inode,
            })
        })
        .collect();

    listeners.sort_by(|a, b| {
        (a.port, a.pid, a.protocol, a.inode).cmp(&(b.port, b.pid, b.protocol, b.inode))
    });

    log::info!(
        "Found {} listening sockets across {} processes",
        listeners.len(),
        listeners.iter().map(|l| l.pid).collect::<BTreeSet<_>>().len()
    );

    Ok(listeners)
}

/// Listeners bound to `port`
pub fn listeners_on_port(listeners: &[Listener], port: u16) -> Vec<&Listener> {
    listeners.iter().filter(|l| l.port == port).collect()
}

/// Port -> processes listening on it
pub fn listener_ownership(listeners: &[Listener]) -> PortOwnership {
    let mut ownership = PortOwnership::default();
    for listener in listeners {
        ownership.claim(listener.port, listener.owner());
    }
    ownership
}

/// Ports listened on by more than one process.
///
/// Each extra process on a port is reported against the first one, so a port
/// with N processes yields N - 1 collisions. One process listening on both
/// IPv4 and IPv6 is not a conflict.
pub fn check_listener_conflicts(listeners: &[Listener]) -> CollisionReport {
    let ownership = listener_ownership(listeners);
    let mut collisions = Vec::new();

    for (port, owners) in ownership.shared_ports() {
        let mut owners = owners.iter();
        let Some(first) = owners.next() else {
            continue;
        };
        for other in owners {
            collisions.push(PortCollision {
                port: *port,
                first: first.clone(),
                second: other.clone(),
                scope: CollisionScope::InterProcess,
            });
        }
    }

    for collision in &collisions {
        log::warn!("Listener conflict: {}", collision);
    }

    CollisionReport { collisions }
}

/// Listening ports of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPorts {
    pub pid: u32,
    pub name: String,
    pub ports: Vec<u16>,
}

/// Listening ports per process, by PID. Explicitly selected processes are
/// listed even when they hold no listener.
pub fn process_ports(
    proc_fs: &ProcFs,
    selection: &ProcessSelection,
    listeners: &[Listener],
) -> Vec<ProcessPorts> {
    let mut by_pid: BTreeMap<u32, (String, BTreeSet<u16>)> = BTreeMap::new();

    if let ProcessSelection::Only(pids) = selection {
        for &pid in pids {
            by_pid.insert(pid, (proc_fs.process_name(pid), BTreeSet::new()));
        }
    }
    for listener in listeners {
        by_pid
            .entry(listener.pid)
            .or_insert_with(|| (listener.name.clone(), BTreeSet::new()))
            .1
            .insert(listener.port);
    }

    by_pid
        .into_iter()
        .map(|(pid, (name, ports))| ProcessPorts {
            pid,
            name,
            ports: ports.into_iter().collect(),
        })
        .collect()
}
