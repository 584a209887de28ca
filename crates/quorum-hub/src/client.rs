//! Participant-side transport: enroll with a coordinator, or fetch the
//! configuration of a node that is already running.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::genesis::GenesisDocument;
use crate::models::{Output, ParticipantInfo};
use crate::ws::ENROLL_PATH;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Genesis document served by a running node.
pub const PEER_GENESIS_PATH: &str = "/genesis.json";
/// Identity record served by a running node.
pub const PEER_INFO_PATH: &str = "/infos.json";

#[derive(Debug, Clone, Default)]
pub struct BootstrapClient {
    http: reqwest::Client,
    response_timeout: Option<Duration>,
}

impl BootstrapClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up waiting for the coordinator's answer after `timeout`.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// WebSocket URL for a coordinator given as `host:port` or a full URL.
    pub fn enroll_url(coordinator: &str) -> String {
        if coordinator.starts_with("ws://") || coordinator.starts_with("wss://") {
            coordinator.to_string()
        } else {
            format!("ws://{}{}", coordinator.trim_end_matches('/'), ENROLL_PATH)
        }
    }

    /// Send our identity and wait for our genesis + peers.
    ///
    /// A close frame before the answer surfaces as [`Error::Rejected`] with
    /// the coordinator's reason.
    pub async fn enroll(&self, coordinator: &str, info: &ParticipantInfo) -> Result<Output> {
        let url = Self::enroll_url(coordinator);
        debug!(%url, "Connecting to coordinator");
        let (mut socket, _) = connect_async(url.as_str()).await?;

        socket
            .send(Message::Text(serde_json::to_string(info)?))
            .await?;

        let response = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, next_output(&mut socket))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => next_output(&mut socket).await,
        };

        let _ = socket.close(None).await;
        response
    }

    /// Adopt the configuration of a running node: its genesis, and the node
    /// itself as the only peer.
    pub async fn fetch_peer(&self, peer: &str) -> Result<Output> {
        let base = http_base(peer);

        let genesis: GenesisDocument = self
            .http
            .get(format!("{}{}", base, PEER_GENESIS_PATH))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        genesis.validate()?;

        let info: ParticipantInfo = self
            .http
            .get(format!("{}{}", base, PEER_INFO_PATH))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Output {
            genesis,
            peers: vec![info.enode()],
        })
    }
}

fn http_base(peer: &str) -> String {
    let peer = peer.trim_end_matches('/');
    if peer.starts_with("http://") || peer.starts_with("https://") {
        peer.to_string()
    } else {
        format!("http://{}", peer)
    }
}

async fn next_output(socket: &mut Socket) -> Result<Output> {
    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => return Output::parse(&text),
            Message::Binary(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| Error::Connection(format!("non UTF-8 response: {}", e)))?;
                return Output::parse(&text);
            }
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| f.reason.into_owned())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed without a response".to_string());
                return Err(Error::Rejected(reason));
            }
            _ => {}
        }
    }
    Err(Error::Connection(
        "connection ended before a response arrived".into(),
    ))
}
