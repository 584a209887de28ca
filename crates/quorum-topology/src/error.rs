//! Error types for quorum-topology.

use thiserror::Error;

/// Errors raised while loading a topology constraint.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The topology document is not a `{name: [name, ...]}` object.
    #[error("invalid topology document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A rule is keyed by, or lists, an empty participant name.
    #[error("topology rule for {0:?} contains an empty participant name")]
    EmptyName(String),
}
