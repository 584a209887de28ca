//! Shared fixtures for end-to-end bootstrap tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use quorum_hub::{
    AssemblySources, GenesisDocument, HubConfig, HubNode, HubOutcome, ParticipantInfo,
    QuorumProgress, SelfEnrollment,
};
use quorum_topology::{SelfPeering, Topology};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A coordinator serving on an ephemeral local port.
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub progress: watch::Receiver<QuorumProgress>,
    pub task: JoinHandle<quorum_hub::Result<HubOutcome>>,
}

impl TestCoordinator {
    /// `host:port` for clients.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Wait until `count` participants have been recorded.
    pub async fn wait_for_nodes(&mut self, count: usize) {
        self.progress
            .wait_for(|p| p.nodes.len() >= count)
            .await
            .expect("coordinator stopped publishing progress");
    }

    /// Poll `/status` until the hub holds `count` sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        let url = format!("http://{}/status", self.addr);
        let http = reqwest::Client::new();
        for _ in 0..500 {
            let status: serde_json::Value = http
                .get(&url)
                .send()
                .await
                .expect("status request")
                .json()
                .await
                .expect("status body");
            if status["sessions"].as_u64() == Some(count as u64) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("hub never reached {count} sessions");
    }

    /// Wait for the round to end.
    pub async fn outcome(self) -> HubOutcome {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("coordinator did not finish")
            .expect("coordinator task panicked")
            .expect("coordinator failed")
    }
}

/// Options for [`spawn_coordinator`].
#[derive(Clone)]
pub struct CoordinatorSetup {
    pub validators: usize,
    pub topology: Topology,
    pub self_peering: SelfPeering,
    pub quorum_timeout: Option<Duration>,
    pub self_enrollment: Option<SelfEnrollment>,
}

impl CoordinatorSetup {
    pub fn new(validators: usize) -> Self {
        Self {
            validators,
            topology: Topology::full_mesh(),
            self_peering: SelfPeering::Include,
            quorum_timeout: None,
            self_enrollment: None,
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_quorum_timeout(mut self, timeout: Duration) -> Self {
        self.quorum_timeout = Some(timeout);
        self
    }

    pub fn with_self_enrollment(mut self, enrollment: SelfEnrollment) -> Self {
        self.self_enrollment = Some(enrollment);
        self
    }
}

/// Start a coordinator with the embedded template.
pub async fn spawn_coordinator(setup: CoordinatorSetup) -> TestCoordinator {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let config = HubConfig {
        api_addr: addr,
        validators: setup.validators,
        quorum_timeout: setup.quorum_timeout,
        self_peering: setup.self_peering,
        shutdown_grace: Duration::from_millis(50),
        self_enrollment: setup.self_enrollment,
        ..HubConfig::default()
    };
    let sources = AssemblySources::new(GenesisDocument::embedded().expect("embedded template"))
        .with_topology(setup.topology);
    let node = HubNode::with_sources(config, sources).expect("valid coordinator config");
    let progress = node.progress();
    let task = tokio::spawn(node.serve(listener));

    TestCoordinator {
        addr,
        progress,
        task,
    }
}

/// Identity with a predictable key and host.
pub fn participant(name: &str, address: &str) -> ParticipantInfo {
    ParticipantInfo::new(format!("pk-{address}"), address)
        .with_name(name)
        .with_host(format!("{name}.local:30303"))
}

/// A running node exposing `/genesis.json` and `/infos.json`.
pub async fn spawn_running_node(genesis: GenesisDocument, info: ParticipantInfo) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let app = Router::new()
        .route("/genesis.json", get(move || async move { Json(genesis) }))
        .route("/infos.json", get(move || async move { Json(info) }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}
