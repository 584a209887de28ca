//! Per-participant response.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::genesis::GenesisDocument;

/// Genesis document plus the peers one participant should connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub genesis: GenesisDocument,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub peers: Vec<String>,
}

impl Output {
    /// Serialize as a single text frame.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a response frame, checking the genesis substructure.
    pub fn parse(frame: &str) -> Result<Self> {
        let output: Self = serde_json::from_str(frame)?;
        output.genesis.validate()?;
        Ok(output)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}
