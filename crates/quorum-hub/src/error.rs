//! Error types for the quorum hub.

use thiserror::Error;

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bootstrapping a network.
#[derive(Debug, Error)]
pub enum Error {
    /// A participant frame could not be parsed as an identity record.
    /// Only the offending submission is rejected.
    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),

    /// Configuration or source file error (terminal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The quorum has already been reached; no more slots can be written.
    #[error("Quorum closed: {0}")]
    QuorumClosed(String),

    /// Transport failure (connect, read or write)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The coordinator closed the channel instead of answering.
    #[error("Rejected by coordinator: {0}")]
    Rejected(String),

    /// Waited too long for a response.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Participant state transition not allowed from the current phase.
    #[error("invalid participant state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// The hub control loop has stopped.
    #[error("Hub is no longer running")]
    HubUnavailable,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<quorum_topology::TopologyError> for Error {
    fn from(e: quorum_topology::TopologyError) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Connection(e.to_string())
    }
}
