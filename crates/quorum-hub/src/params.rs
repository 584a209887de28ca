//! Operator-supplied sources: network parameters (YAML), default accounts
//! (JSON) and the peer topology (JSON).
//!
//! Every source is optional. A missing file means "use the defaults"; a file
//! that exists but cannot be parsed is a configuration error.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{Error, Result};

/// Parameters file name inside the config directory.
pub const PARAMS_FILE_NAME: &str = "params.json";
/// Default accounts file name inside the config directory.
pub const ACCOUNTS_FILE_NAME: &str = "accounts.json";

/// Network parameters written into the genesis document.
///
/// The file is YAML (JSON is valid YAML, so `params.json` works too).
/// Numbers are accepted in place of strings; balances larger than 2^64
/// must be quoted to stay exact.
///
/// ```yaml
/// name: testnet
/// gasLimit: "0x7A1200"
/// difficulty: "0x1"
/// accounts:
///   "0x00a329c0648769a73afac7f9381e08fb43dbea72": "1000000"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorParams {
    #[serde(default, deserialize_with = "optional_scalar")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub gas_limit: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub accounts: BTreeMap<String, String>,
}

impl OperatorParams {
    /// Parse YAML (or JSON) text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match read_optional(path)? {
            Some(text) => Self::from_yaml(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
            None => {
                debug!(path = %path.display(), "No operator params; using template values");
                Ok(Self::default())
            }
        }
    }
}

/// Load and parse a JSON file; `None` when it does not exist.
pub fn load_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_optional(path)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
        None => Ok(None),
    }
}

/// Read a file, treating "not found" as absent.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Option::<BTreeMap<String, Scalar>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(map.into_iter().map(|(k, v)| (k, v.into_string())).collect())
}
