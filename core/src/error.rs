//! Error types for Agora

use crate::types::{ProposalId, WorkflowStatus};
use std::fmt;
use thiserror::Error;

/// Result type for Agora operations
pub type AgoraResult<T> = Result<T, AgoraError>;

/// Phase-gated ballot operation, used to word wrong-phase rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallotOp {
    AddVoter,
    AddProposal,
    SetVote,
    StartProposalsRegistering,
    EndProposalsRegistering,
    StartVotingSession,
    EndVotingSession,
    TallyVotes,
    ReadWinner,
}

impl BallotOp {
    /// Phase the operation must be called from
    pub fn required_status(&self) -> WorkflowStatus {
        match self {
            BallotOp::AddVoter | BallotOp::StartProposalsRegistering => {
                WorkflowStatus::RegisteringVoters
            }
            BallotOp::AddProposal | BallotOp::EndProposalsRegistering => {
                WorkflowStatus::ProposalsRegistrationStarted
            }
            BallotOp::StartVotingSession => WorkflowStatus::ProposalsRegistrationEnded,
            BallotOp::SetVote | BallotOp::EndVotingSession => WorkflowStatus::VotingSessionStarted,
            BallotOp::TallyVotes => WorkflowStatus::VotingSessionEnded,
            BallotOp::ReadWinner => WorkflowStatus::VotesTallied,
        }
    }

    fn phase_message(&self) -> &'static str {
        match self {
            BallotOp::AddVoter => "voters registration is not open yet",
            BallotOp::AddProposal => "proposals are not allowed yet",
            BallotOp::SetVote | BallotOp::EndVotingSession => "voting session hasn't started yet",
            BallotOp::StartProposalsRegistering => "registering proposals can't be started now",
            BallotOp::EndProposalsRegistering => "registering proposals haven't started yet",
            BallotOp::StartVotingSession => "registering proposals phase is not finished",
            BallotOp::TallyVotes => "current status is not voting session ended",
            BallotOp::ReadWinner => "votes haven't been tallied yet",
        }
    }
}

impl fmt::Display for BallotOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BallotOp::AddVoter => "addVoter",
            BallotOp::AddProposal => "addProposal",
            BallotOp::SetVote => "setVote",
            BallotOp::StartProposalsRegistering => "startProposalsRegistering",
            BallotOp::EndProposalsRegistering => "endProposalsRegistering",
            BallotOp::StartVotingSession => "startVotingSession",
            BallotOp::EndVotingSession => "endVotingSession",
            BallotOp::TallyVotes => "tallyVotes",
            BallotOp::ReadWinner => "winningProposal",
        };
        f.write_str(name)
    }
}

/// Coarse category of an [`AgoraError`], for callers that branch on failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    WrongPhase,
    Rejected,
    NotFound,
    Config,
    Internal,
}

/// Main error type for Agora
#[derive(Error, Debug)]
pub enum AgoraError {
    // ============ Authorization Errors ============
    #[error("caller is not the owner")]
    NotOwner,

    #[error("not a voter")]
    NotAVoter,

    // ============ Workflow Errors ============
    #[error("{}", .op.phase_message())]
    WrongPhase { op: BallotOp, current: WorkflowStatus },

    // ============ Ballot Errors ============
    #[error("already registered")]
    AlreadyRegistered,

    #[error("already voted")]
    AlreadyVoted,

    #[error("proposal not found")]
    ProposalNotFound(ProposalId),

    #[error("proposal description is empty")]
    EmptyDescription,

    #[error("description too long: {len} bytes, maximum {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("too many proposals: maximum {0}")]
    TooManyProposals(usize),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ============ General Errors ============
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgoraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgoraError::NotOwner | AgoraError::NotAVoter => ErrorKind::Unauthorized,
            AgoraError::WrongPhase { .. } => ErrorKind::WrongPhase,
            AgoraError::AlreadyRegistered
            | AgoraError::AlreadyVoted
            | AgoraError::EmptyDescription
            | AgoraError::DescriptionTooLong { .. }
            | AgoraError::TooManyProposals(_) => ErrorKind::Rejected,
            AgoraError::ProposalNotFound(_) => ErrorKind::NotFound,
            AgoraError::ConfigError(_)
            | AgoraError::InvalidAddress(_)
            | AgoraError::InvalidManifest(_)
            | AgoraError::InvalidRequest(_) => ErrorKind::Config,
            AgoraError::SerializationError(_)
            | AgoraError::Io(_)
            | AgoraError::Internal(_)
            | AgoraError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn wrong_phase(op: BallotOp, current: WorkflowStatus) -> Self {
        AgoraError::WrongPhase { op, current }
    }
}

impl From<std::io::Error> for AgoraError {
    fn from(err: std::io::Error) -> Self {
        AgoraError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AgoraError {
    fn from(err: serde_json::Error) -> Self {
        AgoraError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_messages() {
        let err = AgoraError::wrong_phase(
            BallotOp::StartProposalsRegistering,
            WorkflowStatus::ProposalsRegistrationStarted,
        );
        assert_eq!(err.to_string(), "registering proposals can't be started now");
        assert_eq!(err.kind(), ErrorKind::WrongPhase);

        let err = AgoraError::wrong_phase(BallotOp::SetVote, WorkflowStatus::ProposalsRegistrationEnded);
        assert_eq!(err.to_string(), "voting session hasn't started yet");
    }

    #[test]
    fn test_required_status_follows_workflow() {
        for op in [
            BallotOp::StartProposalsRegistering,
            BallotOp::EndProposalsRegistering,
            BallotOp::StartVotingSession,
            BallotOp::EndVotingSession,
            BallotOp::TallyVotes,
        ] {
            let from = op.required_status();
            assert!(from.next().is_some(), "{} starts from a non-terminal phase", op);
        }
        assert_eq!(BallotOp::ReadWinner.required_status(), WorkflowStatus::VotesTallied);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AgoraError::NotOwner.kind(), ErrorKind::Unauthorized);
        assert_eq!(AgoraError::NotAVoter.kind(), ErrorKind::Unauthorized);
        assert_eq!(AgoraError::AlreadyVoted.kind(), ErrorKind::Rejected);
        assert_eq!(AgoraError::ProposalNotFound(6).kind(), ErrorKind::NotFound);
        assert_eq!(AgoraError::ProposalNotFound(6).to_string(), "proposal not found");
        assert_eq!(AgoraError::InvalidRequest("bad id".into()).kind(), ErrorKind::Config);
    }
}
