//! Ballot manifest: the owner and initial voter roll of a ballot

use agora_core::{Address, AgoraError, AgoraResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::engine::SharedBallot;

/// Ballot manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotManifest {
    /// Human-readable ballot name
    pub name: String,
    /// Administrator address (hex)
    pub owner: String,
    /// Voters to register before proposals open (hex)
    #[serde(default)]
    pub voters: Vec<String>,
}

impl BallotManifest {
    pub fn new(name: &str, owner: &Address) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_hex(),
            voters: vec![],
        }
    }

    /// Add a voter
    pub fn add_voter(mut self, address: &Address) -> Self {
        self.voters.push(address.to_hex());
        self
    }

    pub fn parse_owner(&self) -> AgoraResult<Address> {
        Address::from_hex(&self.owner)
            .map_err(|e| AgoraError::InvalidAddress(format!("owner {}: {}", self.owner, e)))
    }

    /// Parse the voter roll, rejecting malformed and duplicate entries
    pub fn parse_voters(&self) -> AgoraResult<Vec<Address>> {
        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(self.voters.len());

        for entry in &self.voters {
            let address = Address::from_hex(entry)
                .map_err(|e| AgoraError::InvalidAddress(format!("voter {}: {}", entry, e)))?;
            if !seen.insert(address) {
                return Err(AgoraError::InvalidManifest(format!("duplicate voter {}", entry)));
            }
            result.push(address);
        }

        Ok(result)
    }

    pub fn to_json(&self) -> AgoraResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> AgoraResult<Self> {
        serde_json::from_str(json).map_err(|e| AgoraError::InvalidManifest(e.to_string()))
    }
}

/// Applies a manifest's voter roll to a ballot
pub struct ManifestLoader {
    ballot: SharedBallot,
    manifest: BallotManifest,
}

impl ManifestLoader {
    pub fn new(ballot: SharedBallot, manifest: BallotManifest) -> Self {
        Self { ballot, manifest }
    }

    /// Register every voter through the owner. Returns the number registered.
    /// Nothing is registered if any voter is rejected.
    pub fn apply(&self) -> AgoraResult<usize> {
        let owner = self.manifest.parse_owner()?;
        if owner != self.ballot.owner() {
            return Err(AgoraError::InvalidManifest(format!(
                "manifest owner {} does not administer this ballot",
                owner
            )));
        }

        let voters = self.manifest.parse_voters()?;
        info!("Loading ballot manifest: {}", self.manifest.name);

        let registered = self.ballot.add_voters(&owner, &voters)?;

        info!("Registered {} voters from manifest", registered);
        Ok(registered)
    }
}
