//! Quorum Hub - network bootstrap rendezvous
//!
//! Participants that want to start a new chain together connect to a
//! coordinator, announce who they are, and wait. Once the configured number
//! of validators has enrolled, the coordinator assembles one genesis document
//! and hands every participant that document plus its own peer list. A node
//! joining later can skip the round and copy the configuration of a node
//! that is already running.
//!
//! # Architecture
//!
//! - **Models**: Identity records and per-participant responses
//! - **Genesis**: The shared chain document and its required substructure
//! - **Manager**: Quorum accumulation and genesis assembly
//! - **Hub**: Single-owner control loop for sessions, broadcast and teardown
//! - **API**: HTTP + WebSocket surface of the coordinator
//! - **Bootstrap**: Participant lifecycle and the transport it uses
//!
//! # Example
//!
//! ```no_run
//! use quorum_hub::{HubConfig, HubNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HubConfig::from_env()?;
//!     let outcome = HubNode::new(config)?.run().await?;
//!     println!("bootstrap {}", outcome);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod assembler;
pub mod bootstrap;
pub mod client;
pub mod env;
pub mod error;
pub mod genesis;
pub mod hub;
pub mod manager;
pub mod models;
pub mod node;
pub mod params;
pub mod quorum;
pub mod ws;

pub use assembler::{assemble, Assembly, AssemblySources, SourcePaths};
pub use bootstrap::{FileLauncher, Launcher, Participant, ParticipantPhase};
pub use client::BootstrapClient;
pub use error::{Error, Result};
pub use genesis::GenesisDocument;
pub use hub::{Hub, HubHandle, HubOptions, HubOutcome, HubPhase, QuorumHandler};
pub use manager::{Manager, QuorumProgress};
pub use models::{Output, ParticipantInfo};
pub use node::{HubConfig, HubNode, SelfEnrollment};
pub use params::OperatorParams;
pub use quorum::{Enrollment, QuorumState};
pub use ws::ENROLL_PATH;
