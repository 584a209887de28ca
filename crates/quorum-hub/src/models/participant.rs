//! Participant identity record.

use std::collections::BTreeMap;

use quorum_topology::PeerNode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::env;
use crate::error::{Error, Result};

/// Balance granted to a participant's own address when it does not ask for
/// anything else.
pub const DEFAULT_FAUCET_BALANCE: &str = "10000000000000000000000000000000000";

/// Port advertised in the enode address when `ENODE_PORT` is unset.
pub const DEFAULT_ENODE_PORT: u16 = 30303;

/// What a participant tells the coordinator about itself.
///
/// A record with an empty `name` is anonymous: its faucets count and it is
/// listed as a node, but nobody is waiting for an answer on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Correlation key for the response. Empty for anonymous records.
    #[serde(default)]
    pub name: String,
    /// Account address; used as the validator entry.
    pub address: String,
    /// Node public key (enode id).
    #[serde(default)]
    pub public_key: String,
    /// Network location, `host:port`.
    #[serde(default)]
    pub host: String,
    /// Whether this participant asks for a validator slot.
    #[serde(default, rename = "validator")]
    pub is_validator: bool,
    /// Accounts to credit at genesis: address -> balance.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub faucets: BTreeMap<String, String>,
}

impl ParticipantInfo {
    /// Identity for the local node, advertised as `<host name>:30303`. The
    /// node's own address is credited with [`DEFAULT_FAUCET_BALANCE`].
    pub fn new(public_key: impl Into<String>, address: impl Into<String>) -> Self {
        let address = address.into();
        let mut faucets = BTreeMap::new();
        faucets.insert(address.clone(), DEFAULT_FAUCET_BALANCE.to_string());

        Self {
            name: String::new(),
            address,
            public_key: public_key.into(),
            host: format!("{}:{}", local_hostname(), DEFAULT_ENODE_PORT),
            is_validator: false,
            faucets,
        }
    }

    /// Like [`ParticipantInfo::new`], with the advertised host taken from
    /// `ENODE_HOST` and `ENODE_PORT` when set.
    pub fn from_env(public_key: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let host = advertised_host(env::var("ENODE_HOST"), env::var("ENODE_PORT"))?;
        Ok(Self::new(public_key, address).with_host(host))
    }

    /// Set the correlation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Ask for (or decline) a validator slot.
    pub fn with_validator(mut self, is_validator: bool) -> Self {
        self.is_validator = is_validator;
        self
    }

    /// Override the advertised host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Parse one submission frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let info: Self = serde_json::from_str(raw)
            .map_err(|e| Error::MalformedSubmission(e.to_string()))?;
        if info.address.is_empty() {
            return Err(Error::MalformedSubmission("address is empty".into()));
        }
        Ok(info)
    }

    /// Whether this record carries no correlation name.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Reachable peer address, `enode://<public key>@<host>`.
    pub fn enode(&self) -> String {
        format!("enode://{}@{}", self.public_key, self.host)
    }
}

impl PeerNode for ParticipantInfo {
    fn peer_name(&self) -> &str {
        &self.name
    }

    fn reachable_address(&self) -> String {
        self.enode()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// `host:port` to advertise; a port that is not a `u16` is rejected.
fn advertised_host(host: Option<String>, port: Option<String>) -> Result<String> {
    let host = host.unwrap_or_else(local_hostname);
    let port = match port {
        Some(raw) => env::parse_value::<u16>("ENODE_PORT", &raw)?,
        None => DEFAULT_ENODE_PORT,
    };
    Ok(format!("{}:{}", host.trim(), port))
}

fn local_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
