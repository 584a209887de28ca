//! Genesis document - the shared initial chain configuration.
//!
//! The document is kept as an arbitrary JSON tree so that any chain spec the
//! operator supplies survives untouched, but the substructure the assembler
//! writes into is checked up front:
//!
//! ```text
//! {
//!   "name": "...",
//!   "genesis":  { "difficulty": "...", "gasLimit": "..." },
//!   "accounts": { "<address>": { "balance": "..." } },
//!   "engine":   { "authorityRound": { "params": { "validators": { "list": [...] } } } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Authority-round chain spec used when the operator does not supply one.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/genesis.json");

const GENESIS_PATH: &[&str] = &["genesis"];
const ACCOUNTS_PATH: &[&str] = &["accounts"];
const VALIDATORS_PATH: &[&str] = &["engine", "authorityRound", "params", "validators"];

/// Shared genesis configuration, identical for every participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenesisDocument(Value);

impl GenesisDocument {
    /// Parse and validate a template.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("genesis template is not valid JSON: {}", e)))?;
        let document = Self(value);
        document.validate()?;
        Ok(document)
    }

    /// The embedded default template.
    pub fn embedded() -> Result<Self> {
        Self::from_json(DEFAULT_TEMPLATE)
    }

    /// Load a template from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Check the substructure the assembler writes into.
    pub fn validate(&self) -> Result<()> {
        if !self.0.is_object() {
            return Err(Error::Config("genesis template must be a JSON object".into()));
        }
        if !self.0.get("name").map_or(false, Value::is_string) {
            return Err(Error::Config("genesis template is missing a string `name`".into()));
        }
        for path in [GENESIS_PATH, ACCOUNTS_PATH, VALIDATORS_PATH] {
            if lookup(&self.0, path).map_or(true, |v| !v.is_object()) {
                return Err(Error::Config(format!(
                    "genesis template is missing object `{}`",
                    path.join(".")
                )));
            }
        }
        for field in ["difficulty", "gasLimit"] {
            if !lookup(&self.0, &["genesis", field]).map_or(false, Value::is_string) {
                return Err(Error::Config(format!(
                    "genesis template is missing string `genesis.{}`",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Network name.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Set the network name.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.root_mut()?.insert("name".into(), Value::String(name.to_string()));
        Ok(())
    }

    /// Set `genesis.gasLimit`.
    pub fn set_gas_limit(&mut self, gas_limit: &str) -> Result<()> {
        self.object_mut(GENESIS_PATH)?
            .insert("gasLimit".into(), Value::String(gas_limit.to_string()));
        Ok(())
    }

    /// `genesis.gasLimit`
    pub fn gas_limit(&self) -> Option<&str> {
        lookup(&self.0, &["genesis", "gasLimit"]).and_then(Value::as_str)
    }

    /// Set `genesis.difficulty`.
    pub fn set_difficulty(&mut self, difficulty: &str) -> Result<()> {
        self.object_mut(GENESIS_PATH)?
            .insert("difficulty".into(), Value::String(difficulty.to_string()));
        Ok(())
    }

    /// `genesis.difficulty`
    pub fn difficulty(&self) -> Option<&str> {
        lookup(&self.0, &["genesis", "difficulty"]).and_then(Value::as_str)
    }

    /// Replace the consensus engine's validator list, keeping the given order.
    pub fn set_validators(&mut self, validators: &[String]) -> Result<()> {
        let list = validators.iter().cloned().map(Value::String).collect();
        self.object_mut(VALIDATORS_PATH)?
            .insert("list".into(), Value::Array(list));
        Ok(())
    }

    /// The consensus engine's validator list.
    pub fn validators(&self) -> Vec<String> {
        let mut path = VALIDATORS_PATH.to_vec();
        path.push("list");
        lookup(&self.0, &path)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set the balance of each account.
    ///
    /// Entries already in the template (builtins) keep their other fields.
    pub fn set_balances(&mut self, balances: &BTreeMap<String, String>) -> Result<()> {
        let accounts = self.object_mut(ACCOUNTS_PATH)?;
        for (address, balance) in balances {
            let entry = accounts
                .entry(address.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(fields) => {
                    fields.insert("balance".into(), Value::String(balance.clone()));
                }
                other => {
                    *other = serde_json::json!({ "balance": balance });
                }
            }
        }
        Ok(())
    }

    /// Balance of `address`, if the account exists.
    pub fn balance(&self, address: &str) -> Option<&str> {
        lookup(&self.0, &["accounts", address, "balance"]).and_then(Value::as_str)
    }

    /// Blake3 digest of the canonical serialization.
    ///
    /// Every participant can recompute this to confirm it received the same
    /// document as everyone else.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.0).unwrap_or_default();
        hex::encode(blake3::hash(&bytes).as_bytes())
    }

    /// Pretty JSON for writing to disk.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)? + "\n")
    }

    /// The raw JSON tree.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn root_mut(&mut self) -> Result<&mut Map<String, Value>> {
        self.0
            .as_object_mut()
            .ok_or_else(|| Error::Config("genesis document must be a JSON object".into()))
    }

    fn object_mut(&mut self, path: &[&str]) -> Result<&mut Map<String, Value>> {
        let mut current = &mut self.0;
        for key in path {
            current = current
                .get_mut(*key)
                .ok_or_else(|| Error::Config(format!("genesis document is missing `{}`", path.join("."))))?;
        }
        current
            .as_object_mut()
            .ok_or_else(|| Error::Config(format!("`{}` is not an object", path.join("."))))
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}
