//! Core data types for cluster network-health diagnostics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity of a port owner's source: a scanned log file, or the process id
/// of a listening process.
///
/// Paths are normalized through their components, so `dir/a.log` and
/// `dir//a.log` (or a trailing separator) compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().components().collect())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Short label used in console output (the file name when there is one)
    pub fn label(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Role label taken from the bracketed tag of a log line, e.g. `Container-2000`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKind(String);

impl NodeKind {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A log file loaded into memory for the duration of one scan
#[derive(Debug, Clone)]
pub struct LogFile {
    pub id: FileId,
    pub content: String,
}

/// Discovered external addresses of one file, per node kind.
///
/// Each address list keeps first-seen order and holds every address once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiscovery {
    pub file: FileId,
    pub addresses: BTreeMap<NodeKind, Vec<String>>,
}

impl FileDiscovery {
    pub fn new(file: FileId, addresses: BTreeMap<NodeKind, Vec<String>>) -> Self {
        Self { file, addresses }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.values().all(|a| a.is_empty())
    }

    pub fn address_count(&self) -> usize {
        self.addresses.values().map(|a| a.len()).sum()
    }
}

/// One `(file, node kind)` claim on a port
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortOwner {
    pub file: FileId,
    pub kind: NodeKind,
}

impl PortOwner {
    pub fn new(file: FileId, kind: NodeKind) -> Self {
        Self { file, kind }
    }
}

impl fmt::Display for PortOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.file, self.kind)
    }
}

/// Port number -> every owner that claimed it. Reporting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOwnership {
    pub owners: BTreeMap<u16, BTreeSet<PortOwner>>,
}

impl PortOwnership {
    pub fn claim(&mut self, port: u16, owner: PortOwner) {
        self.owners.entry(port).or_default().insert(owner);
    }

    /// Ports claimed by more than one owner
    pub fn shared_ports(&self) -> impl Iterator<Item = (&u16, &BTreeSet<PortOwner>)> {
        self.owners.iter().filter(|(_, owners)| owners.len() > 1)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Where a port collision was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionScope {
    /// Two node kinds of the same file
    IntraFile,
    /// Two different files
    InterFile,
    /// Two processes listening on the same TCP port
    InterProcess,
}

impl fmt::Display for CollisionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionScope::IntraFile => write!(f, "intra-file"),
            CollisionScope::InterFile => write!(f, "inter-file"),
            CollisionScope::InterProcess => write!(f, "inter-process"),
        }
    }
}

/// A port claimed by two owners that must not share it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCollision {
    pub port: u16,
    pub first: PortOwner,
    pub second: PortOwner,
    pub scope: CollisionScope,
}

impl fmt::Display for PortCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port {} used by {} and {} ({})",
            self.port, self.first, self.second, self.scope
        )
    }
}

/// All collisions found in one scan. Empty means the port invariants hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionReport {
    pub collisions: Vec<PortCollision>,
}

impl CollisionReport {
    pub fn is_clean(&self) -> bool {
        self.collisions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty()
    }

    /// Turn the report into a failure when any collision was found
    pub fn ensure_clean(&self) -> Result<(), DiagnosticError> {
        if self.is_clean() {
            return Ok(());
        }
        let details = self
            .collisions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(DiagnosticError::PortCollision {
            count: self.collisions.len(),
            details,
        })
    }
}

/// One `Idle (N peers)` observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSample {
    /// Raw timestamp prefix of the log line; opaque, possibly empty
    pub timestamp: String,
    pub peer_count: u32,
}

/// Peer samples of one node in log order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSeries {
    pub samples: Vec<PeerSample>,
}

impl PeerSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peer_counts(&self) -> Vec<u32> {
        self.samples.iter().map(|s| s.peer_count).collect()
    }

    pub fn first_timestamp(&self) -> Option<&str> {
        self.samples
            .first()
            .map(|s| s.timestamp.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn last_timestamp(&self) -> Option<&str> {
        self.samples
            .last()
            .map(|s| s.timestamp.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Violations detected by the diagnostics.
///
/// Every variant names the offending file, node or port so a failure can be
/// triaged from the message alone.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosticError {
    #[error("{count} port collision(s): {details}")]
    PortCollision { count: usize, details: String },

    #[error("{node}: no 'Idle (N peers)' lines found in {path}")]
    EmptySeries { node: String, path: String },

    #[error("{node}: {percent:.1}% of samples report exactly 1 peer ({ones}/{total}), more than the allowed {limit:.1}%")]
    Isolated {
        node: String,
        ones: usize,
        total: usize,
        percent: f64,
        limit: f64,
    },

    #[error("Not all logs were found in the correct order. Missing log: '{missing}'\nContext around the last found log:\n{context}")]
    MissingLog { missing: String, context: String },

    #[error("Log entry '{entry}' was found at line {line}.\nContext around the found log:\n{context}")]
    ForbiddenLog {
        entry: String,
        line: usize,
        context: String,
    },
}
