//! Ballot events for observers and indexers

use agora_core::{Address, ProposalId, Timestamp, WorkflowStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Notification emitted by every successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BallotEvent {
    VoterRegistered {
        voter_address: Address,
    },
    ProposalRegistered {
        proposal_id: ProposalId,
    },
    Voted {
        voter: Address,
        proposal_id: ProposalId,
    },
    /// Phases travel as their numeric codes (0..=5)
    WorkflowStatusChange {
        #[serde(with = "agora_core::types::status_code")]
        previous_status: WorkflowStatus,
        #[serde(with = "agora_core::types::status_code")]
        new_status: WorkflowStatus,
    },
}

/// An event with its position in the ballot's event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Starts at 1 and increases by one per event
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: BallotEvent,
}

/// Create a ballot event channel
pub fn create_event_channel(
    capacity: usize,
) -> (mpsc::Sender<EventRecord>, mpsc::Receiver<EventRecord>) {
    mpsc::channel(capacity)
}
