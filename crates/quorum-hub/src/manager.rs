//! Quorum manager: records submissions and assembles the genesis once every
//! validator slot is filled.

use std::collections::HashMap;

use quorum_topology::SelfPeering;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use crate::assembler::{assemble, AssemblySources};
use crate::error::{Error, Result};
use crate::genesis::GenesisDocument;
use crate::hub::{HubOutcome, QuorumHandler};
use crate::models::ParticipantInfo;
use crate::quorum::{Enrollment, QuorumState};

/// Published view of the round, for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct QuorumProgress {
    pub target: usize,
    pub validators: Vec<String>,
    pub nodes: Vec<ParticipantInfo>,
    pub genesis: Option<GenesisDocument>,
    pub fingerprint: Option<String>,
    pub outcome: Option<HubOutcome>,
}

impl QuorumProgress {
    fn new(target: usize) -> Self {
        Self {
            target,
            validators: Vec::new(),
            nodes: Vec::new(),
            genesis: None,
            fingerprint: None,
            outcome: None,
        }
    }
}

pub struct Manager {
    state: QuorumState,
    sources: AssemblySources,
    self_peering: SelfPeering,
    genesis: Option<GenesisDocument>,
    progress: watch::Sender<QuorumProgress>,
    completion: Option<oneshot::Sender<HubOutcome>>,
}

impl Manager {
    /// Manager waiting for `validators` slots.
    pub fn new(validators: usize, sources: AssemblySources, self_peering: SelfPeering) -> Result<Self> {
        if validators == 0 {
            return Err(Error::Config("at least one validator is required".into()));
        }
        let (progress, _) = watch::channel(QuorumProgress::new(validators));
        Ok(Self {
            state: QuorumState::new(validators),
            sources,
            self_peering,
            genesis: None,
            progress,
            completion: None,
        })
    }

    /// Follow the round's progress.
    pub fn subscribe(&self) -> watch::Receiver<QuorumProgress> {
        self.progress.subscribe()
    }

    /// Receiver resolved with the outcome when the round ends.
    pub fn on_completion(&mut self) -> oneshot::Receiver<HubOutcome> {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        rx
    }

    pub fn state(&self) -> &QuorumState {
        &self.state
    }

    /// The generated document, once the quorum closed.
    pub fn genesis(&self) -> Option<&GenesisDocument> {
        self.genesis.as_ref()
    }
}

impl QuorumHandler for Manager {
    fn collect(&mut self, raw: &str) -> Result<String> {
        let info = ParticipantInfo::parse(raw)?;
        let key = info.name.clone();
        let address = info.address.clone();

        match self.state.record(info.clone())? {
            Enrollment::Validator { slot } => info!(
                name = %key,
                %address,
                slot,
                filled = self.state.fill_count(),
                target = self.state.target(),
                "Validator enrolled"
            ),
            Enrollment::Node => info!(name = %key, %address, "Node enrolled"),
            Enrollment::Anonymous => debug!(%address, "Anonymous record"),
        }

        self.progress.send_modify(|p| {
            p.validators = self.state.validators().to_vec();
            p.nodes.push(info);
        });
        Ok(key)
    }

    fn generate(&mut self) -> Result<Option<HashMap<String, String>>> {
        if self.genesis.is_some() || !self.state.is_ready() {
            return Ok(None);
        }

        let assembly = assemble(&self.state, &self.sources, self.self_peering)?;
        let fingerprint = assembly.genesis.fingerprint();
        info!(
            validators = self.state.fill_count(),
            nodes = self.state.nodes().len(),
            %fingerprint,
            "Quorum reached; genesis generated"
        );

        self.progress.send_modify(|p| {
            p.genesis = Some(assembly.genesis.clone());
            p.fingerprint = Some(fingerprint);
        });
        self.genesis = Some(assembly.genesis);
        Ok(Some(assembly.outputs))
    }

    fn on_complete(&mut self, outcome: HubOutcome) {
        self.progress.send_modify(|p| p.outcome = Some(outcome));
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(outcome);
        }
    }
}
