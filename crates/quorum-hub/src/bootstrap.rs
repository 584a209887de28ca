//! Participant lifecycle: obtain a configuration, hand it to the node daemon.
//!
//! ```text
//!   Uninitialized ──enroll──▶ Enrolling ─────┐
//!        │                                   ├──▶ Configured ──launch──▶ Running
//!        └───────connect──▶ FetchingPeer ────┘
//! ```
//!
//! A failed enroll or connect returns to `Uninitialized`; nothing is retried
//! automatically.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::client::BootstrapClient;
use crate::error::{Error, Result};
use crate::genesis::GenesisDocument;
use crate::models::{Output, ParticipantInfo};

/// Where a participant is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantPhase {
    Uninitialized,
    Enrolling,
    FetchingPeer,
    Configured,
    Running,
}

impl fmt::Display for ParticipantPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticipantPhase::Uninitialized => "uninitialized",
            ParticipantPhase::Enrolling => "enrolling",
            ParticipantPhase::FetchingPeer => "fetching-peer",
            ParticipantPhase::Configured => "configured",
            ParticipantPhase::Running => "running",
        };
        f.write_str(name)
    }
}

/// Hands the obtained configuration to whatever runs the chain node.
pub trait Launcher {
    fn configure(&mut self, genesis: &GenesisDocument, peers: &[String]) -> Result<()>;
    fn launch(&mut self) -> Result<()>;
}

/// File name of the written genesis document.
pub const GENESIS_FILE_NAME: &str = "genesis.json";
/// File name of the written peer list (comma separated).
pub const PEERS_FILE_NAME: &str = "peers.txt";

/// Writes `genesis.json` and `peers.txt` for a daemon to pick up.
#[derive(Debug, Clone)]
pub struct FileLauncher {
    output_dir: PathBuf,
    configured: bool,
}

impl FileLauncher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            configured: false,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Launcher for FileLauncher {
    fn configure(&mut self, genesis: &GenesisDocument, peers: &[String]) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::write(
            self.output_dir.join(GENESIS_FILE_NAME),
            genesis.to_pretty_json()?,
        )?;
        std::fs::write(self.output_dir.join(PEERS_FILE_NAME), peers.join(","))?;
        self.configured = true;
        Ok(())
    }

    fn launch(&mut self) -> Result<()> {
        if !self.configured {
            return Err(Error::InvalidState {
                expected: "configured",
                actual: "unconfigured".into(),
            });
        }
        info!(dir = %self.output_dir.display(), "Configuration ready for the node daemon");
        Ok(())
    }
}

/// One participant's bootstrap.
pub struct Participant {
    info: ParticipantInfo,
    client: BootstrapClient,
    phase: ParticipantPhase,
    configuration: Option<Output>,
}

impl Participant {
    pub fn new(info: ParticipantInfo, client: BootstrapClient) -> Self {
        Self {
            info,
            client,
            phase: ParticipantPhase::Uninitialized,
            configuration: None,
        }
    }

    pub fn phase(&self) -> ParticipantPhase {
        self.phase
    }

    pub fn info(&self) -> &ParticipantInfo {
        &self.info
    }

    pub fn configuration(&self) -> Option<&Output> {
        self.configuration.as_ref()
    }

    /// Active bootstrap: join the round at `coordinator` under `name`.
    pub async fn enroll(&mut self, coordinator: &str, name: &str, validator: bool) -> Result<&Output> {
        self.require_phase(ParticipantPhase::Uninitialized, "uninitialized")?;
        self.info.name = name.to_string();
        self.info.is_validator = validator;
        self.phase = ParticipantPhase::Enrolling;

        info!(
            validator,
            name,
            address = %self.info.address,
            coordinator,
            "Enrolling with coordinator"
        );

        match self.client.enroll(coordinator, &self.info).await {
            Ok(output) => Ok(self.configured(output)),
            Err(e) => {
                self.phase = ParticipantPhase::Uninitialized;
                Err(e)
            }
        }
    }

    /// Passive bootstrap: copy the configuration of a running node.
    pub async fn connect(&mut self, peer: &str) -> Result<&Output> {
        self.require_phase(ParticipantPhase::Uninitialized, "uninitialized")?;
        self.phase = ParticipantPhase::FetchingPeer;
        info!(peer, "Fetching configuration from running node");

        match self.client.fetch_peer(peer).await {
            Ok(output) => Ok(self.configured(output)),
            Err(e) => {
                self.phase = ParticipantPhase::Uninitialized;
                Err(e)
            }
        }
    }

    /// Hand the configuration to `launcher` and start the node.
    pub fn launch<L: Launcher>(&mut self, launcher: &mut L) -> Result<()> {
        self.require_phase(ParticipantPhase::Configured, "configured")?;
        let output = self.configuration.as_ref().ok_or(Error::InvalidState {
            expected: "configured",
            actual: "no configuration".into(),
        })?;
        launcher.configure(&output.genesis, &output.peers)?;
        launcher.launch()?;
        self.phase = ParticipantPhase::Running;
        Ok(())
    }

    fn configured(&mut self, output: Output) -> &Output {
        info!(
            genesis = output.genesis.name().unwrap_or_default(),
            fingerprint = %output.genesis.fingerprint(),
            peers = output.peers.len(),
            "Configuration received"
        );
        self.phase = ParticipantPhase::Configured;
        self.configuration.insert(output)
    }

    fn require_phase(&self, phase: ParticipantPhase, expected: &'static str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                actual: self.phase.to_string(),
            })
        }
    }
}
