//! Coordinator node: configuration, startup and the serve loop.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quorum_topology::SelfPeering;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::api::{self, CoordinatorState};
use crate::assembler::{AssemblySources, SourcePaths};
use crate::bootstrap::{FileLauncher, Participant};
use crate::client::BootstrapClient;
use crate::env;
use crate::error::{Error, Result};
use crate::hub::{Hub, HubOptions, HubOutcome};
use crate::manager::{Manager, QuorumProgress};
use crate::models::ParticipantInfo;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// HTTP + WebSocket listen address
    pub api_addr: SocketAddr,
    /// Validator slots to fill before generating
    pub validators: usize,
    pub sources: SourcePaths,
    /// Abandon the round if the quorum is not reached in time
    pub quorum_timeout: Option<Duration>,
    pub self_peering: SelfPeering,
    /// Delay between completion and shutdown, so final frames flush
    pub shutdown_grace: Duration,
    /// Enroll the coordinator's own node in the round it hosts
    pub self_enrollment: Option<SelfEnrollment>,
}

/// The coordinator host taking part in its own round.
#[derive(Debug, Clone)]
pub struct SelfEnrollment {
    pub name: String,
    pub validator: bool,
    pub info: ParticipantInfo,
    /// Where `genesis.json` and `peers.txt` are written
    pub output_dir: PathBuf,
}

impl SelfEnrollment {
    /// Enroll as a validator under `name`.
    pub fn new(name: impl Into<String>, info: ParticipantInfo, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            validator: true,
            info,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_validator(mut self, validator: bool) -> Self {
        self.validator = validator;
        self
    }

    /// The record submitted to the hub.
    pub fn identity(&self) -> ParticipantInfo {
        self.info
            .clone()
            .with_name(self.name.clone())
            .with_validator(self.validator)
    }

    fn from_env() -> Result<Option<Self>> {
        let Some(name) = env::var("QUORUM_SELF_ENROLL") else {
            return Ok(None);
        };
        let info = ParticipantInfo::from_env(
            env::require("QUORUM_PUBLIC_KEY")?,
            env::require("QUORUM_ADDRESS")?,
        )?;
        let output_dir = env::var("QUORUM_OUTPUT_DIR").unwrap_or_else(|| "./quorum-data".into());
        let node_only = env::parse("QUORUM_SELF_NODE")?.unwrap_or(false);

        Ok(Some(Self::new(name, info, output_dir).with_validator(!node_only)))
    }

    async fn run(self, coordinator: String) -> Result<()> {
        let mut participant = Participant::new(self.info, BootstrapClient::new());
        participant
            .enroll(&coordinator, &self.name, self.validator)
            .await?;
        participant.launch(&mut FileLauncher::new(self.output_dir))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            validators: 3,
            sources: SourcePaths::new("/chain/config"),
            quorum_timeout: None,
            self_peering: SelfPeering::Include,
            shutdown_grace: Duration::from_millis(2000),
            self_enrollment: None,
        }
    }
}

impl HubConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_addr = env::parse("QUORUM_API_ADDR")?.unwrap_or(defaults.api_addr);
        let validators = env::parse("QUORUM_VALIDATORS")?.unwrap_or(defaults.validators);
        if validators == 0 {
            return Err(Error::Config("QUORUM_VALIDATORS must be at least 1".into()));
        }

        let mut sources = match env::var("QUORUM_CONFIG_DIR") {
            Some(dir) => SourcePaths::new(dir),
            None => defaults.sources,
        };
        sources.params_file = env::var("QUORUM_PARAMS_FILE").map(PathBuf::from);
        sources.genesis_template = env::var("QUORUM_GENESIS_TEMPLATE").map(PathBuf::from);

        let quorum_timeout = env::parse::<u64>("QUORUM_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let self_peering = SelfPeering::from_exclude(
            env::parse("QUORUM_EXCLUDE_SELF_PEER")?.unwrap_or(false),
        );

        let shutdown_grace = env::parse("QUORUM_SHUTDOWN_GRACE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.shutdown_grace);

        Ok(Self {
            api_addr,
            validators,
            sources,
            quorum_timeout,
            self_peering,
            shutdown_grace,
            self_enrollment: SelfEnrollment::from_env()?,
        })
    }
}

/// A coordinator instance.
pub struct HubNode {
    config: HubConfig,
    manager: Manager,
}

impl HubNode {
    /// Load and validate every source. Errors here are terminal.
    pub fn new(config: HubConfig) -> Result<Self> {
        let sources = AssemblySources::load(&config.sources)?;
        Self::with_sources(config, sources)
    }

    /// Build from sources already in memory.
    pub fn with_sources(config: HubConfig, sources: AssemblySources) -> Result<Self> {
        let manager = Manager::new(config.validators, sources, config.self_peering)?;
        Ok(Self { config, manager })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Follow enrollment progress (also served on `/status`).
    pub fn progress(&self) -> watch::Receiver<QuorumProgress> {
        self.manager.subscribe()
    }

    /// Bind the configured address and serve until the round ends.
    pub async fn run(self) -> Result<HubOutcome> {
        let listener = TcpListener::bind(self.config.api_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an existing listener until the round ends.
    pub async fn serve(mut self, listener: TcpListener) -> Result<HubOutcome> {
        let completion = self.manager.on_completion();
        let progress = self.manager.subscribe();

        let options = HubOptions {
            quorum_timeout: self.config.quorum_timeout,
        };
        let (hub, handle) = Hub::new(self.manager, options);
        let hub_task = tokio::spawn(hub.run());

        let app = api::build_router(Arc::new(CoordinatorState {
            hub: handle,
            progress,
            identity: self.config.self_enrollment.as_ref().map(SelfEnrollment::identity),
        }));

        let local = listener.local_addr()?;
        tracing::info!("Quorum hub starting");
        tracing::info!("  API: http://{}", local);
        tracing::info!("  Validators: {}", self.config.validators);
        tracing::info!("  Config: {:?}", self.config.sources.config_dir);
        if let Some(timeout) = self.config.quorum_timeout {
            tracing::info!("  Quorum timeout: {:?}", timeout);
        }

        // The listener is bound already, so the connection waits in the backlog
        let self_task = self.config.self_enrollment.clone().map(|enrollment| {
            tracing::info!("  Self-enrolling as {:?}", enrollment.name);
            let ip: IpAddr = match local.ip() {
                ip if ip.is_unspecified() => Ipv4Addr::LOCALHOST.into(),
                ip => ip,
            };
            tokio::spawn(enrollment.run(SocketAddr::new(ip, local.port()).to_string()))
        });

        let grace = self.config.shutdown_grace;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Ok(outcome) = completion.await {
                    tracing::info!(%outcome, ?grace, "Shutting down after grace period");
                    tokio::time::sleep(grace).await;
                }
            })
            .await?;

        if let Some(task) = self_task {
            match task.await {
                Ok(Ok(())) => tracing::info!("Self-enrollment configured the local node"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Self-enrollment failed"),
                Err(e) => tracing::warn!(error = %e, "Self-enrollment task failed"),
            }
        }

        hub_task.await.map_err(|_| Error::HubUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::GenesisDocument;

    #[test]
    fn defaults() {
        let config = HubConfig::default();
        assert_eq!(config.validators, 3);
        assert_eq!(config.api_addr.port(), 8080);
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        assert!(config.quorum_timeout.is_none());
        assert_eq!(config.self_peering, SelfPeering::Include);
        assert!(config.self_enrollment.is_none());
    }

    #[test]
    fn self_identity_carries_name_and_role() {
        let info = ParticipantInfo::new("key", "0xa");
        let enrollment = SelfEnrollment::new("hub", info, "/tmp/out").with_validator(false);
        let identity = enrollment.identity();
        assert_eq!(identity.name, "hub");
        assert!(!identity.is_validator);
        assert_eq!(identity.address, "0xa");
    }

    #[tokio::test]
    async fn single_self_enrolled_validator_completes() {
        let out = tempfile::TempDir::new().unwrap();
        let info = ParticipantInfo::new("key", "0xa").with_host("hub.local:30303");
        let config = HubConfig {
            validators: 1,
            shutdown_grace: Duration::ZERO,
            self_enrollment: Some(SelfEnrollment::new("hub", info, out.path())),
            ..HubConfig::default()
        };
        let node = HubNode::with_sources(
            config,
            AssemblySources::new(GenesisDocument::embedded().unwrap()),
        )
        .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        assert_eq!(node.serve(listener).await.unwrap(), HubOutcome::Completed);
        let written = GenesisDocument::load(&out.path().join("genesis.json")).unwrap();
        assert_eq!(written.validators(), ["0xa"]);
        assert_eq!(
            std::fs::read_to_string(out.path().join("peers.txt")).unwrap(),
            "enode://key@hub.local:30303"
        );
    }

    #[test]
    fn zero_validators_is_config_error() {
        let config = HubConfig {
            validators: 0,
            ..HubConfig::default()
        };
        let sources = AssemblySources::new(GenesisDocument::embedded().unwrap());
        assert!(matches!(
            HubNode::with_sources(config, sources),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_template_is_terminal() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = HubConfig::default();
        config.sources = SourcePaths::new(dir.path());
        config.sources.genesis_template = Some(dir.path().join("absent.json"));
        assert!(matches!(HubNode::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn abandons_after_timeout() {
        let config = HubConfig {
            validators: 1,
            quorum_timeout: Some(Duration::from_millis(20)),
            shutdown_grace: Duration::ZERO,
            ..HubConfig::default()
        };
        let node = HubNode::with_sources(
            config,
            AssemblySources::new(GenesisDocument::embedded().unwrap()),
        )
        .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        assert_eq!(node.serve(listener).await.unwrap(), HubOutcome::Abandoned);
    }
}
