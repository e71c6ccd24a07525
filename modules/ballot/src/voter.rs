//! Voter registry

use agora_core::{Address, ProposalId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Voter record. Unknown addresses read as the default (unregistered) record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub is_registered: bool,
    pub has_voted: bool,
    pub voted_proposal_id: ProposalId,
}

/// Registered voters keyed by address
#[derive(Debug, Default)]
pub struct VoterRegistry {
    voters: HashMap<Address, Voter>,
}

impl VoterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a voter record, or the default record if the address is unknown
    pub fn get(&self, address: &Address) -> Voter {
        self.voters.get(address).copied().unwrap_or_default()
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.get(address).is_registered
    }

    /// Mark an address as registered (returns false if it already was)
    pub fn register(&mut self, address: Address) -> bool {
        let voter = self.voters.entry(address).or_default();
        if voter.is_registered {
            return false;
        }
        voter.is_registered = true;
        true
    }

    /// Record a registered voter's ballot (returns false if not allowed)
    pub fn record_vote(&mut self, address: &Address, proposal_id: ProposalId) -> bool {
        match self.voters.get_mut(address) {
            Some(voter) if voter.is_registered && !voter.has_voted => {
                voter.has_voted = true;
                voter.voted_proposal_id = proposal_id;
                true
            }
            _ => false,
        }
    }

    pub fn registered_count(&self) -> usize {
        self.voters.values().filter(|v| v.is_registered).count()
    }

    pub fn voted_count(&self) -> usize {
        self.voters.values().filter(|v| v.has_voted).count()
    }
}
