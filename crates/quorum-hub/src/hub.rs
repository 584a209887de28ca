//! Rendezvous hub: the single owner of session membership and quorum state.
//!
//! Sessions never touch shared state directly. Each one talks to the hub
//! through a [`HubHandle`]; the hub processes commands one at a time, so
//! collection, generation, broadcast and teardown are serialized.
//!
//! ```text
//!   session ──Register/Submit/Unregister──▶ Hub ──collect/generate──▶ QuorumHandler
//!      ▲                                     │
//!      └──────────── Outbound (bounded) ─────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Messages buffered per session before it is considered unresponsive.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Close code: normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code: the hub is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code: the session cannot be served under the current policy.
pub const CLOSE_POLICY: u16 = 1008;

/// Reason given to sessions still open without an enrollment at quorum.
pub const LATE_REASON: &str = "late: enrollment incomplete at quorum";
/// Reason given to sessions that connect after generation.
pub const COMPLETED_REASON: &str = "bootstrap already completed";
/// Reason given to every session when the quorum timeout expires.
pub const ABANDONED_REASON: &str = "bootstrap abandoned";

const COMMAND_BUFFER: usize = 1024;

/// Identity of one participant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A message queued for delivery on one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Send a close frame and stop writing.
    Close { code: u16, reason: String },
}

impl Outbound {
    pub fn close(code: u16, reason: &str) -> Self {
        Outbound::Close {
            code,
            reason: reason.to_string(),
        }
    }
}

/// Lifecycle of a bootstrap round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HubPhase {
    /// Waiting for validator slots to fill.
    Collecting,
    /// Outputs broadcast; waiting for sessions to leave.
    Generated,
    Completed,
    Abandoned,
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HubOutcome {
    /// Generated and every session has left.
    Completed,
    /// The quorum was never reached.
    Abandoned,
}

impl fmt::Display for HubOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubOutcome::Completed => write!(f, "completed"),
            HubOutcome::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Snapshot of the hub.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub phase: HubPhase,
    pub sessions: usize,
}

/// The collector/generator plugged into the hub.
pub trait QuorumHandler: Send + 'static {
    /// Record one raw submission; returns the correlation key for the
    /// originating session (empty for anonymous records).
    fn collect(&mut self, raw: &str) -> Result<String>;

    /// `None` while the quorum is incomplete, otherwise key -> frame for
    /// every participant. Returns `Some` at most once.
    fn generate(&mut self) -> Result<Option<HashMap<String, String>>>;

    /// Called exactly once when the round ends.
    fn on_complete(&mut self, outcome: HubOutcome);
}

/// Hub tuning.
#[derive(Debug, Clone, Default)]
pub struct HubOptions {
    /// Abandon the round if the quorum is not reached within this window.
    pub quorum_timeout: Option<Duration>,
}

enum HubCommand {
    Register {
        id: SessionId,
        outbound: mpsc::Sender<Outbound>,
    },
    Submit {
        id: SessionId,
        raw: String,
    },
    Unregister {
        id: SessionId,
    },
    Status {
        reply: oneshot::Sender<HubStatus>,
    },
}

/// Cloneable handle used by sessions to talk to the hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Add a session. `outbound` receives everything the hub sends it.
    pub async fn register(&self, id: SessionId, outbound: mpsc::Sender<Outbound>) -> Result<()> {
        self.send(HubCommand::Register { id, outbound }).await
    }

    /// Forward one inbound frame.
    pub async fn submit(&self, id: SessionId, raw: String) -> Result<()> {
        self.send(HubCommand::Submit { id, raw }).await
    }

    /// Remove a session. Removing an unknown session is a no-op.
    pub async fn unregister(&self, id: SessionId) -> Result<()> {
        self.send(HubCommand::Unregister { id }).await
    }

    /// Current phase and membership size.
    pub async fn status(&self) -> Result<HubStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Status { reply }).await?;
        rx.await.map_err(|_| Error::HubUnavailable)
    }

    async fn send(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::HubUnavailable)
    }
}

struct Member {
    key: Option<String>,
    outbound: mpsc::Sender<Outbound>,
}

/// The hub control loop.
pub struct Hub<H: QuorumHandler> {
    handler: H,
    members: HashMap<SessionId, Member>,
    commands: mpsc::Receiver<HubCommand>,
    phase: HubPhase,
    quorum_timeout: Option<Duration>,
    outcome: Option<HubOutcome>,
}

impl<H: QuorumHandler> Hub<H> {
    pub fn new(handler: H, options: HubOptions) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let hub = Self {
            handler,
            members: HashMap::new(),
            commands: rx,
            phase: HubPhase::Collecting,
            quorum_timeout: options.quorum_timeout,
            outcome: None,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Process commands until the round ends.
    pub async fn run(mut self) -> HubOutcome {
        let deadline = self.quorum_timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(outcome) = self.outcome {
                return outcome;
            }

            let quorum_deadline = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All hub handles dropped");
                        match self.phase {
                            HubPhase::Generated => self.complete(HubOutcome::Completed),
                            _ => self.abandon(),
                        }
                    }
                },
                _ = quorum_deadline, if self.phase == HubPhase::Collecting => {
                    if let Some(timeout) = self.quorum_timeout {
                        warn!(?timeout, "Quorum timeout expired");
                    }
                    self.abandon();
                }
            }
        }
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, outbound } => self.register(id, outbound),
            HubCommand::Submit { id, raw } => self.submit(id, &raw),
            HubCommand::Unregister { id } => self.unregister(id),
            HubCommand::Status { reply } => {
                let _ = reply.send(HubStatus {
                    phase: self.phase,
                    sessions: self.members.len(),
                });
            }
        }
    }

    fn register(&mut self, id: SessionId, outbound: mpsc::Sender<Outbound>) {
        if self.phase != HubPhase::Collecting {
            debug!(session = %id, phase = ?self.phase, "Refusing session after generation");
            let _ = outbound.try_send(Outbound::close(CLOSE_NORMAL, COMPLETED_REASON));
            return;
        }
        self.members.insert(id, Member { key: None, outbound });
        debug!(session = %id, sessions = self.members.len(), "Session registered");
    }

    fn submit(&mut self, id: SessionId, raw: &str) {
        if !self.members.contains_key(&id) {
            debug!(session = %id, "Submission from unknown session dropped");
            return;
        }
        if self.phase != HubPhase::Collecting {
            debug!(session = %id, "Submission after generation ignored");
            return;
        }

        let key = match self.handler.collect(raw) {
            Ok(key) => key,
            Err(e) => {
                warn!(session = %id, error = %e, "Rejected submission");
                return;
            }
        };
        if !key.is_empty() {
            if let Some(member) = self.members.get_mut(&id) {
                member.key = Some(key);
            }
        }

        match self.handler.generate() {
            Ok(None) => {}
            Ok(Some(outputs)) => {
                self.phase = HubPhase::Generated;
                self.broadcast(outputs);
            }
            Err(e) => {
                error!(error = %e, "Genesis generation failed");
                self.abandon();
            }
        }
    }

    /// Deliver each session its own output; close sessions that have none.
    fn broadcast(&mut self, outputs: HashMap<String, String>) {
        let ids: Vec<SessionId> = self.members.keys().copied().collect();
        let mut delivered = 0;

        for id in ids {
            let frame = self
                .members
                .get(&id)
                .and_then(|m| m.key.as_ref())
                .and_then(|key| outputs.get(key))
                .cloned();

            match frame {
                Some(frame) => {
                    if self.enqueue(id, Outbound::Text(frame)) {
                        delivered += 1;
                    }
                }
                None => {
                    info!(session = %id, "Closing session without enrollment");
                    self.enqueue(id, Outbound::close(CLOSE_POLICY, LATE_REASON));
                    self.unregister(id);
                }
            }
        }

        info!(delivered, outputs = outputs.len(), "Broadcast genesis & topology");
    }

    /// Queue without blocking; a full or closed queue tears the session down.
    fn enqueue(&mut self, id: SessionId, message: Outbound) -> bool {
        let result = match self.members.get(&id) {
            Some(member) => member.outbound.try_send(message),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = %id, "Outbound queue full; tearing session down");
                self.unregister(id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session = %id, "Session writer already gone");
                self.unregister(id);
                false
            }
        }
    }

    fn unregister(&mut self, id: SessionId) {
        if self.members.remove(&id).is_none() {
            return;
        }
        debug!(session = %id, sessions = self.members.len(), "Session unregistered");

        if !self.members.is_empty() {
            return;
        }
        match self.phase {
            HubPhase::Generated => self.complete(HubOutcome::Completed),
            HubPhase::Collecting => {
                warn!("Last session left before quorum; bootstrap abandoned");
                self.complete(HubOutcome::Abandoned);
            }
            HubPhase::Completed | HubPhase::Abandoned => {}
        }
    }

    fn abandon(&mut self) {
        warn!(sessions = self.members.len(), "Quorum not reached; bootstrap abandoned");
        for (id, member) in self.members.drain() {
            debug!(session = %id, "Closing abandoned session");
            let _ = member
                .outbound
                .try_send(Outbound::close(CLOSE_GOING_AWAY, ABANDONED_REASON));
        }
        self.complete(HubOutcome::Abandoned);
    }

    fn complete(&mut self, outcome: HubOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.phase = match outcome {
            HubOutcome::Completed => HubPhase::Completed,
            HubOutcome::Abandoned => HubPhase::Abandoned,
        };
        self.outcome = Some(outcome);
        info!(%outcome, "Bootstrap round finished");
        self.handler.on_complete(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        collected: Vec<String>,
        generated: usize,
        completions: Vec<HubOutcome>,
    }

    /// Collects raw keys; generates once `quorum` keys arrived.
    struct FakeHandler {
        quorum: usize,
        keys: Vec<String>,
        done: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl FakeHandler {
        fn new(quorum: usize) -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let handler = Self {
                quorum,
                keys: Vec::new(),
                done: false,
                calls: calls.clone(),
            };
            (handler, calls)
        }
    }

    impl QuorumHandler for FakeHandler {
        fn collect(&mut self, raw: &str) -> Result<String> {
            if raw == "bad" {
                return Err(Error::MalformedSubmission("bad".into()));
            }
            self.calls.lock().unwrap().collected.push(raw.to_string());
            self.keys.push(raw.to_string());
            Ok(raw.to_string())
        }

        fn generate(&mut self) -> Result<Option<HashMap<String, String>>> {
            self.calls.lock().unwrap().generated += 1;
            if self.done || self.keys.len() < self.quorum {
                return Ok(None);
            }
            self.done = true;
            Ok(Some(
                self.keys
                    .iter()
                    .map(|k| (k.clone(), format!("out-{k}")))
                    .collect(),
            ))
        }

        fn on_complete(&mut self, outcome: HubOutcome) {
            self.calls.lock().unwrap().completions.push(outcome);
        }
    }

    async fn join(handle: &HubHandle) -> (SessionId, mpsc::Receiver<Outbound>) {
        let id = SessionId::next();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        handle.register(id, tx).await.unwrap();
        (id, rx)
    }

    #[tokio::test]
    async fn each_session_gets_its_own_output() {
        let (handler, _calls) = FakeHandler::new(2);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        tokio::spawn(hub.run());

        let (a, mut a_rx) = join(&handle).await;
        let (b, mut b_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();
        handle.submit(b, "b".into()).await.unwrap();

        assert_eq!(a_rx.recv().await, Some(Outbound::Text("out-a".into())));
        assert_eq!(b_rx.recv().await, Some(Outbound::Text("out-b".into())));
        assert_eq!(handle.status().await.unwrap().phase, HubPhase::Generated);
    }

    #[tokio::test]
    async fn late_session_closed_at_quorum() {
        let (handler, _calls) = FakeHandler::new(1);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        tokio::spawn(hub.run());

        let (idle, mut idle_rx) = join(&handle).await;
        let (a, mut a_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();

        assert_eq!(a_rx.recv().await, Some(Outbound::Text("out-a".into())));
        assert_eq!(
            idle_rx.recv().await,
            Some(Outbound::close(CLOSE_POLICY, LATE_REASON))
        );
        // the hub dropped its sender
        assert_eq!(idle_rx.recv().await, None);

        let status = handle.status().await.unwrap();
        assert_eq!(status.sessions, 1);
        handle.unregister(idle).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_submission_skips_generate() {
        let (handler, calls) = FakeHandler::new(1);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        tokio::spawn(hub.run());

        let (a, _a_rx) = join(&handle).await;
        handle.submit(a, "bad".into()).await.unwrap();
        let status = handle.status().await.unwrap();

        assert_eq!(status.phase, HubPhase::Collecting);
        assert_eq!(status.sessions, 1);
        assert_eq!(calls.lock().unwrap().generated, 0);
    }

    #[tokio::test]
    async fn completion_fires_once() {
        let (handler, calls) = FakeHandler::new(2);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        let run = tokio::spawn(hub.run());

        let (a, _a_rx) = join(&handle).await;
        let (b, _b_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();
        handle.submit(b, "b".into()).await.unwrap();

        handle.unregister(a).await.unwrap();
        handle.unregister(a).await.unwrap();
        handle.unregister(b).await.unwrap();
        let _ = handle.unregister(b).await;

        assert_eq!(run.await.unwrap(), HubOutcome::Completed);
        assert_eq!(calls.lock().unwrap().completions, [HubOutcome::Completed]);
        assert!(matches!(handle.status().await, Err(Error::HubUnavailable)));
    }

    #[tokio::test]
    async fn last_session_leaving_before_quorum_abandons() {
        let (handler, calls) = FakeHandler::new(2);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        let run = tokio::spawn(hub.run());

        let (a, _a_rx) = join(&handle).await;
        let (b, _b_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();
        handle.unregister(a).await.unwrap();

        // one session still open: keep collecting
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, HubPhase::Collecting);
        assert_eq!(status.sessions, 1);
        assert!(calls.lock().unwrap().completions.is_empty());

        handle.unregister(b).await.unwrap();
        let _ = handle.unregister(b).await;

        assert_eq!(run.await.unwrap(), HubOutcome::Abandoned);
        assert_eq!(calls.lock().unwrap().completions, [HubOutcome::Abandoned]);
    }

    #[tokio::test]
    async fn registration_after_generation_refused() {
        let (handler, calls) = FakeHandler::new(1);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        tokio::spawn(hub.run());

        let (a, _a_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();

        let (late, mut late_rx) = join(&handle).await;
        assert_eq!(
            late_rx.recv().await,
            Some(Outbound::close(CLOSE_NORMAL, COMPLETED_REASON))
        );
        handle.submit(late, "late".into()).await.unwrap();
        handle.status().await.unwrap();
        assert_eq!(calls.lock().unwrap().collected, ["a"]);
    }

    #[tokio::test]
    async fn quorum_timeout_abandons() {
        let (handler, calls) = FakeHandler::new(3);
        let options = HubOptions {
            quorum_timeout: Some(Duration::from_millis(50)),
        };
        let (hub, handle) = Hub::new(handler, options);
        let run = tokio::spawn(hub.run());

        let (a, mut a_rx) = join(&handle).await;
        handle.submit(a, "a".into()).await.unwrap();

        assert_eq!(run.await.unwrap(), HubOutcome::Abandoned);
        assert_eq!(
            a_rx.recv().await,
            Some(Outbound::close(CLOSE_GOING_AWAY, ABANDONED_REASON))
        );
        assert_eq!(calls.lock().unwrap().completions, [HubOutcome::Abandoned]);
    }

    #[tokio::test]
    async fn full_queue_tears_session_down() {
        let (handler, _calls) = FakeHandler::new(1);
        let (hub, handle) = Hub::new(handler, HubOptions::default());
        let run = tokio::spawn(hub.run());

        let id = SessionId::next();
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(Outbound::Text("backlog".into())).unwrap();
        handle.register(id, tx).await.unwrap();
        handle.submit(id, "a".into()).await.unwrap();

        // the only member was torn down during broadcast, which ends the round
        assert_eq!(run.await.unwrap(), HubOutcome::Completed);
        assert_eq!(rx.recv().await, Some(Outbound::Text("backlog".into())));
        assert_eq!(rx.recv().await, None);
    }
}
