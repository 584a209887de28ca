//! Accumulated enrollment state for one bootstrap round.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::ParticipantInfo;

/// How a submission was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    /// Filled validator slot `slot` (zero-based, arrival order).
    Validator { slot: usize },
    /// Named non-validator node.
    Node,
    /// Unnamed record; contributes faucets and a node entry only.
    Anonymous,
}

/// Collected participants, validator slots and faucet accounts.
///
/// Validator slots fill in arrival order and never exceed the target; once
/// the last slot is filled the round is closed and further records are
/// refused.
#[derive(Debug, Clone)]
pub struct QuorumState {
    target: usize,
    validators: Vec<String>,
    nodes: Vec<ParticipantInfo>,
    accounts: BTreeMap<String, String>,
}

impl QuorumState {
    /// Empty state waiting for `target` validators.
    pub fn new(target: usize) -> Self {
        Self {
            target,
            validators: Vec::with_capacity(target),
            nodes: Vec::new(),
            accounts: BTreeMap::new(),
        }
    }

    /// Record one participant.
    pub fn record(&mut self, info: ParticipantInfo) -> Result<Enrollment> {
        if self.is_ready() {
            return Err(Error::QuorumClosed(format!(
                "all {} validator slots are filled",
                self.target
            )));
        }

        for (address, balance) in &info.faucets {
            self.accounts.insert(address.clone(), balance.clone());
        }

        let enrollment = if info.is_anonymous() {
            Enrollment::Anonymous
        } else if info.is_validator {
            self.validators.push(info.address.clone());
            Enrollment::Validator {
                slot: self.validators.len() - 1,
            }
        } else {
            Enrollment::Node
        };

        self.nodes.push(info);
        Ok(enrollment)
    }

    /// Validator slots required.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Validator slots filled so far.
    pub fn fill_count(&self) -> usize {
        self.validators.len()
    }

    /// Every slot is filled.
    pub fn is_ready(&self) -> bool {
        self.validators.len() >= self.target
    }

    /// Validator addresses in slot order.
    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    /// Every recorded participant, in arrival order.
    pub fn nodes(&self) -> &[ParticipantInfo] {
        &self.nodes
    }

    /// Faucet accounts; a later submission wins for the same address.
    pub fn accounts(&self) -> &BTreeMap<String, String> {
        &self.accounts
    }
}
