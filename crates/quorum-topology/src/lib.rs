//! Quorum Peer Topology
//!
//! Decides which participants are advertised to each other as peers once a
//! bootstrap round closes.
//!
//! # Model
//!
//! A [`Topology`] maps a participant name to the names it may peer with. A
//! participant without an entry falls back to full mesh, so an empty topology
//! is full mesh for everyone. Topology never affects genesis membership: it
//! only shapes the peer lists handed back to each participant.
//!
//! Whether a participant sees its own address in its list is a separate
//! [`SelfPeering`] policy, applied after the topology rule.
//!
//! # Example
//!
//! ```
//! use quorum_topology::{derive_peer_lists, PeerNode, SelfPeering, Topology};
//!
//! struct Node(&'static str);
//!
//! impl PeerNode for Node {
//!     fn peer_name(&self) -> &str {
//!         self.0
//!     }
//!     fn reachable_address(&self) -> String {
//!         format!("enode://{}@127.0.0.1:30303", self.0)
//!     }
//! }
//!
//! let nodes = [Node("a"), Node("b"), Node("c")];
//! let topology = Topology::full_mesh().with_rule("a", ["b"]);
//! let peers = derive_peer_lists(&nodes, &topology, SelfPeering::Include);
//!
//! assert_eq!(peers[0], vec!["enode://b@127.0.0.1:30303".to_string()]);
//! assert_eq!(peers[1].len(), 3);
//! ```

mod error;
mod peers;
mod rules;

pub use error::TopologyError;
pub use peers::{derive_peer_lists, PeerNode, SelfPeering};
pub use rules::Topology;

/// File name the coordinator looks for in its config directory.
pub const TOPOLOGY_FILE_NAME: &str = "topology.json";
