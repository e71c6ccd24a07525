//! Core types for Agora
//!
//! Defines the identity, time and workflow types used across the system.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 32-byte caller identity derived from a public key hash.
/// Serialized as a `0x`-prefixed hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex address, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", self.to_hex()))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Timestamp in milliseconds since Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp_millis() as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Position of a proposal in the ballot's proposal sequence.
/// Index 0 is always the GENESIS proposal.
pub type ProposalId = usize;

/// Ballot lifecycle phase.
///
/// Phases only ever advance one step at a time, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum WorkflowStatus {
    #[default]
    RegisteringVoters,
    ProposalsRegistrationStarted,
    ProposalsRegistrationEnded,
    VotingSessionStarted,
    VotingSessionEnded,
    VotesTallied,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 6] = [
        WorkflowStatus::RegisteringVoters,
        WorkflowStatus::ProposalsRegistrationStarted,
        WorkflowStatus::ProposalsRegistrationEnded,
        WorkflowStatus::VotingSessionStarted,
        WorkflowStatus::VotingSessionEnded,
        WorkflowStatus::VotesTallied,
    ];

    /// Numeric code of the phase (0 for `RegisteringVoters` through 5)
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// The phase that follows this one, `None` once votes are tallied
    pub fn next(&self) -> Option<Self> {
        Self::from_code(self.code() + 1)
    }

    pub fn is_terminal(&self) -> bool {
        *self == WorkflowStatus::VotesTallied
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStatus::RegisteringVoters => "RegisteringVoters",
            WorkflowStatus::ProposalsRegistrationStarted => "ProposalsRegistrationStarted",
            WorkflowStatus::ProposalsRegistrationEnded => "ProposalsRegistrationEnded",
            WorkflowStatus::VotingSessionStarted => "VotingSessionStarted",
            WorkflowStatus::VotingSessionEnded => "VotingSessionEnded",
            WorkflowStatus::VotesTallied => "VotesTallied",
        };
        f.write_str(name)
    }
}

/// Serde adapter writing a `WorkflowStatus` as its numeric code.
/// Use with `#[serde(with = "agora_core::types::status_code")]`.
pub mod status_code {
    use super::WorkflowStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &WorkflowStatus, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(status.code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WorkflowStatus, D::Error> {
        let code = u8::deserialize(deserializer)?;
        WorkflowStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown workflow status code {}", code)))
    }
}
