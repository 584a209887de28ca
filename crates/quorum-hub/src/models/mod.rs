//! Wire records exchanged between participants and the coordinator.

mod output;
mod participant;

pub use output::Output;
pub use participant::{ParticipantInfo, DEFAULT_ENODE_PORT, DEFAULT_FAUCET_BALANCE};
