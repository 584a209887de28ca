//! Per-participant peer list derivation.
//!
//! For every participant P and every participant Q (in arrival order), Q's
//! reachable address is included in P's list when the topology allows P to
//! peer with Q. The self-peering policy then decides whether P keeps its own
//! address.

use crate::Topology;

/// A participant that can appear in a peer list.
pub trait PeerNode {
    /// Name used to look up topology rules.
    fn peer_name(&self) -> &str;

    /// Address advertised to other participants (`enode://key@host:port`).
    fn reachable_address(&self) -> String;
}

/// Whether a participant's own address appears in its own peer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelfPeering {
    /// Keep the participant's own address (matches the historical behaviour).
    #[default]
    Include,
    /// Drop the participant's own address.
    Exclude,
}

impl SelfPeering {
    /// Policy from an "exclude self" flag.
    pub fn from_exclude(exclude: bool) -> Self {
        if exclude {
            Self::Exclude
        } else {
            Self::Include
        }
    }
}

/// Derive one peer list per node, index-aligned with `nodes`.
///
/// Self is identified by position, not by name, so two records sharing a
/// name are still peers of each other.
pub fn derive_peer_lists<N: PeerNode>(
    nodes: &[N],
    topology: &Topology,
    self_peering: SelfPeering,
) -> Vec<Vec<String>> {
    let addresses: Vec<String> = nodes.iter().map(PeerNode::reachable_address).collect();

    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            nodes
                .iter()
                .enumerate()
                .filter(|&(j, _)| !(i == j && self_peering == SelfPeering::Exclude))
                .filter(|(_, peer)| topology.allows(node.peer_name(), peer.peer_name()))
                .map(|(j, _)| addresses[j].clone())
                .collect()
        })
        .collect()
}
