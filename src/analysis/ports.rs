//! Port extraction and port-reuse checks.
//!
//! Every node process of a cluster must listen on its own ports. Two
//! invariants are enforced over the discovered external addresses:
//!
//! - within one file a port belongs to a single node kind
//! - the port sets of two different files are disjoint

use std::collections::{BTreeMap, BTreeSet};

use super::types::*;

/// Ports following every `/tcp/` or `/udp/` segment of `multiaddr`, left to right.
///
/// Protocol names match exactly, as multiaddr protocol names are lowercase.
/// A segment whose value is not a valid port number is skipped.
pub fn extract_ports(multiaddr: &str) -> Vec<u16> {
    let segments: Vec<&str> = multiaddr.split('/').collect();

    segments
        .windows(2)
        .filter(|pair| pair[0] == "tcp" || pair[0] == "udp")
        .filter_map(|pair| pair[1].parse::<u16>().ok())
        .collect()
}

/// Ports of each node kind of one file
pub fn port_sets(discovery: &FileDiscovery) -> BTreeMap<NodeKind, BTreeSet<u16>> {
    discovery
        .addresses
        .iter()
        .map(|(kind, addrs)| {
            let ports = addrs.iter().flat_map(|a| extract_ports(a)).collect();
            (kind.clone(), ports)
        })
        .collect()
}

/// Union of all ports observed in one file
pub fn file_ports(discovery: &FileDiscovery) -> BTreeSet<u16> {
    port_sets(discovery).into_values().flatten().collect()
}

/// Build the port -> owners table over all files
pub fn build_port_ownership(discoveries: &[FileDiscovery]) -> PortOwnership {
    let mut ownership = PortOwnership::default();

    for discovery in discoveries {
        for (kind, ports) in port_sets(discovery) {
            for port in ports {
                ownership.claim(port, PortOwner::new(discovery.file.clone(), kind.clone()));
            }
        }
    }

    ownership
}

/// Ports claimed by two different node kinds of the same file.
///
/// Tracks the last node kind that claimed each port; a sighting under a
/// different kind is a collision.
pub fn check_intra_file(discovery: &FileDiscovery) -> Vec<PortCollision> {
    let mut last_owner: BTreeMap<u16, &NodeKind> = BTreeMap::new();
    let mut collisions = Vec::new();

    for (kind, addrs) in &discovery.addresses {
        for port in addrs.iter().flat_map(|a| extract_ports(a)) {
            if let Some(previous) = last_owner.insert(port, kind) {
                if previous != kind {
                    collisions.push(PortCollision {
                        port,
                        first: PortOwner::new(discovery.file.clone(), previous.clone()),
                        second: PortOwner::new(discovery.file.clone(), kind.clone()),
                        scope: CollisionScope::IntraFile,
                    });
                }
            }
        }
    }

    collisions
}

/// Ports shared between any two different files.
///
/// Each shared port is reported once per file pair, naming the first node
/// kind of each file that claimed it.
pub fn check_inter_file(discoveries: &[FileDiscovery]) -> Vec<PortCollision> {
    let files: Vec<(&FileId, BTreeMap<NodeKind, BTreeSet<u16>>, BTreeSet<u16>)> = discoveries
        .iter()
        .map(|d| (&d.file, port_sets(d), file_ports(d)))
        .collect();

    let mut collisions = Vec::new();

    for (i, (file_a, sets_a, ports_a)) in files.iter().enumerate() {
        for (file_b, sets_b, ports_b) in files.iter().skip(i + 1) {
            if file_a == file_b {
                continue;
            }
            for &port in ports_a.intersection(ports_b) {
                let (Some(kind_a), Some(kind_b)) = (first_kind(sets_a, port), first_kind(sets_b, port)) else {
                    continue;
                };
                collisions.push(PortCollision {
                    port,
                    first: PortOwner::new((*file_a).clone(), kind_a.clone()),
                    second: PortOwner::new((*file_b).clone(), kind_b.clone()),
                    scope: CollisionScope::InterFile,
                });
            }
        }
    }

    collisions
}

fn first_kind(sets: &BTreeMap<NodeKind, BTreeSet<u16>>, port: u16) -> Option<&NodeKind> {
    sets.iter().find(|(_, ports)| ports.contains(&port)).map(|(kind, _)| kind)
}

/// Check both port invariants over all scanned files, collecting every violation
pub fn check_port_collisions(discoveries: &[FileDiscovery]) -> CollisionReport {
    let mut collisions: Vec<PortCollision> = discoveries.iter().flat_map(check_intra_file).collect();
    collisions.extend(check_inter_file(discoveries));

    for collision in &collisions {
        log::warn!("Port collision: {}", collision);
    }

    CollisionReport { collisions }
}
