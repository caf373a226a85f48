//! Log parsing for cluster node logs.
//!
//! Extracts discovered external addresses and periodic `Idle (N peers)`
//! samples from node log text. Line format:
//!
//! ```text
//! 2025-01-14 10:00:00.123 [Container-2000] 🔍 Discovered new external address for our node: /ip4/127.0.0.1/tcp/30333/ws/p2p/12D3...
//! 2025-01-14 10:00:05.001 [Container-2000] 💤 Idle (2 peers), best: #12 (0xab12…), finalized #10 (0xcd34…)
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use super::types::*;

/// Compiled regex patterns for log parsing
pub struct LogPatterns {
    /// Match: "<timestamp> [<NodeKind>] ... Discovered new external address for our node: <multiaddr>"
    pub external_address: Regex,
    /// Match: "Idle (N peers)" / "Idle (1 peer)"
    pub idle_peers: Regex,
}

impl LogPatterns {
    pub fn new() -> Self {
        Self {
            external_address: Regex::new(
                r"(?im)^[^\[\r\n]*\[(?P<kind>[^\]\r\n]+)\][^\r\n]*?discovered new external address for our node:[ \t]*(?P<addr>[^\s]+)"
            ).expect("Invalid external_address regex"),
            idle_peers: Regex::new(
                r"(?i)Idle\s*\(\s*(\d+)\s*peers?\s*\)"
            ).expect("Invalid idle_peers regex"),
        }
    }
}

impl Default for LogPatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance.
///
/// `Regex` keeps no scan position between calls, so sharing it across files
/// cannot leak matches from one file into the next.
pub static PATTERNS: LazyLock<LogPatterns> = LazyLock::new(LogPatterns::new);

/// A single "discovered external address" line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub kind: NodeKind,
    pub address: String,
}

/// Every discovery line of `text`, in file order (repeats included)
pub fn discovery_events(text: &str) -> Vec<DiscoveryEvent> {
    PATTERNS
        .external_address
        .captures_iter(text)
        .filter_map(|caps| {
            let kind = caps.name("kind")?.as_str().trim();
            let address = caps.name("addr")?.as_str();
            if kind.is_empty() {
                return None;
            }
            Some(DiscoveryEvent {
                kind: NodeKind::new(kind),
                address: address.to_string(),
            })
        })
        .collect()
}

/// Discovered addresses per node kind, first-seen order, without repeats
pub fn parse_discovered_addresses(text: &str) -> BTreeMap<NodeKind, Vec<String>> {
    let mut addresses: BTreeMap<NodeKind, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<(NodeKind, String)> = HashSet::new();

    for event in discovery_events(text) {
        if seen.insert((event.kind.clone(), event.address.clone())) {
            addresses.entry(event.kind).or_default().push(event.address);
        }
    }

    addresses
}

/// Run address discovery over every file in parallel.
///
/// The result is sorted by file so it does not depend on scheduling.
pub fn discover_all(files: &[LogFile]) -> Vec<FileDiscovery> {
    let mut discoveries: Vec<FileDiscovery> = files
        .par_iter()
        .map(|file| {
            let addresses = parse_discovered_addresses(&file.content);
            log::debug!(
                "Parsed {}: {} node kinds, {} addresses",
                file.id,
                addresses.len(),
                addresses.values().map(|a| a.len()).sum::<usize>()
            );
            FileDiscovery::new(file.id.clone(), addresses)
        })
        .collect();

    discoveries.sort_by(|a, b| a.file.cmp(&b.file));
    discoveries
}

/// Extract the `Idle (N peers)` series reported under `[node_tag]`.
///
/// Lines without the tag, without `Idle` or without a parseable count are
/// skipped. The timestamp is the text before the first `[`.
pub fn parse_peer_series(text: &str, node_tag: &str) -> PeerSeries {
    let tag = format!("[{}]", node_tag);
    let mut series = PeerSeries::default();

    for line in text.lines() {
        if !line.contains(&tag) || !line.contains("Idle") {
            continue;
        }

        let Some(peer_count) = PATTERNS
            .idle_peers
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        let timestamp = match line.find('[') {
            Some(idx) if idx > 0 => line[..idx].trim().to_string(),
            _ => String::new(),
        };

        series.samples.push(PeerSample {
            timestamp,
            peer_count,
        });
    }

    series
}
