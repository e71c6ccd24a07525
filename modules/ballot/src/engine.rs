//! Ballot engine: the workflow state machine and the records it guards

use crate::event::{BallotEvent, EventRecord};
use crate::proposal::{Proposal, ProposalBook};
use crate::voter::{Voter, VoterRegistry};
use agora_core::{
    Address, AgoraError, AgoraResult, BallotConfig, BallotOp, ProposalId, Timestamp,
    WorkflowStatus,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything a ballot mutates, guarded by one lock
#[derive(Debug, Default)]
struct BallotState {
    status: WorkflowStatus,
    voters: VoterRegistry,
    proposals: ProposalBook,
    winning_proposal_id: ProposalId,
    events: Vec<EventRecord>,
}

/// Point-in-time view of a ballot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotSnapshot {
    pub owner: Address,
    pub status: WorkflowStatus,
    pub status_code: u8,
    pub proposals: Vec<Proposal>,
    pub winning_proposal_id: ProposalId,
    pub registered_voters: usize,
    pub votes_cast: usize,
    pub event_count: usize,
}

/// Single-organizer ballot.
///
/// Every operation takes the state lock once, runs all of its checks, and
/// only then mutates, so a failed call leaves the ballot untouched.
pub struct BallotEngine {
    owner: Address,
    config: BallotConfig,
    state: Mutex<BallotState>,
    event_tx: Option<mpsc::Sender<EventRecord>>,
}

impl BallotEngine {
    /// Create a new ballot administered by `owner`
    pub fn new(owner: Address, config: BallotConfig) -> Self {
        Self {
            owner,
            config,
            state: Mutex::new(BallotState::default()),
            event_tx: None,
        }
    }

    /// Set event channel
    pub fn set_event_channel(&mut self, tx: mpsc::Sender<EventRecord>) {
        self.event_tx = Some(tx);
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &BallotConfig {
        &self.config
    }

    // ============ Registration ============

    /// Register an eligible voter (owner only, while registering voters)
    pub fn add_voter(&self, caller: &Address, voter: Address) -> AgoraResult<()> {
        self.add_voters(caller, &[voter]).map(|_| ())
    }

    /// Register a batch of voters. Either every voter is registered or,
    /// if any of them is already registered, none is.
    pub fn add_voters(&self, caller: &Address, voters: &[Address]) -> AgoraResult<usize> {
        let op = BallotOp::AddVoter;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        require(op, caller, *caller == self.owner, || AgoraError::NotOwner)?;
        let status = state.status;
        require(op, caller, status == op.required_status(), || {
            AgoraError::wrong_phase(op, status)
        })?;
        let mut batch = HashSet::with_capacity(voters.len());
        for voter in voters {
            require(op, caller, !state.voters.is_registered(voter), || {
                AgoraError::AlreadyRegistered
            })?;
            require(op, caller, batch.insert(*voter), || AgoraError::AlreadyRegistered)?;
        }

        for voter in voters {
            let registered = state.voters.register(*voter);
            debug_assert!(registered, "voter checked unregistered");
            info!("Voter registered: {}", voter);
            self.emit(state, BallotEvent::VoterRegistered { voter_address: *voter });
        }

        Ok(voters.len())
    }

    // ============ Proposals ============

    /// Submit a proposal and return its index
    pub fn add_proposal(&self, caller: &Address, description: &str) -> AgoraResult<ProposalId> {
        let op = BallotOp::AddProposal;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        require(op, caller, state.voters.is_registered(caller), || AgoraError::NotAVoter)?;
        let status = state.status;
        require(op, caller, status == op.required_status(), || {
            AgoraError::wrong_phase(op, status)
        })?;
        require(op, caller, !description.is_empty(), || AgoraError::EmptyDescription)?;

        let max_len = self.config.max_description_len;
        require(op, caller, description.len() <= max_len, || {
            AgoraError::DescriptionTooLong {
                len: description.len(),
                max: max_len,
            }
        })?;

        let max_proposals = self.config.max_proposals;
        require(op, caller, state.proposals.len() < max_proposals, || {
            AgoraError::TooManyProposals(max_proposals)
        })?;

        let proposal_id = state.proposals.push(Proposal::new(description));
        info!("Proposal {} registered by {}", proposal_id, caller);
        self.emit(state, BallotEvent::ProposalRegistered { proposal_id });

        Ok(proposal_id)
    }

    // ============ Voting ============

    /// Cast the caller's single vote
    pub fn set_vote(&self, caller: &Address, proposal_id: ProposalId) -> AgoraResult<()> {
        let op = BallotOp::SetVote;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let voter = state.voters.get(caller);
        require(op, caller, voter.is_registered, || AgoraError::NotAVoter)?;
        let status = state.status;
        require(op, caller, status == op.required_status(), || {
            AgoraError::wrong_phase(op, status)
        })?;
        require(op, caller, !voter.has_voted, || AgoraError::AlreadyVoted)?;
        require(op, caller, state.proposals.contains(proposal_id), || {
            AgoraError::ProposalNotFound(proposal_id)
        })?;

        let counted = state.proposals.add_vote(proposal_id);
        let recorded = state.voters.record_vote(caller, proposal_id);
        debug_assert!(counted && recorded, "vote checked before recording");
        info!("{} voted for proposal {}", caller, proposal_id);
        self.emit(
            state,
            BallotEvent::Voted {
                voter: *caller,
                proposal_id,
            },
        );

        Ok(())
    }

    // ============ Workflow ============

    pub fn start_proposals_registering(&self, caller: &Address) -> AgoraResult<WorkflowStatus> {
        self.advance(caller, BallotOp::StartProposalsRegistering)
    }

    pub fn end_proposals_registering(&self, caller: &Address) -> AgoraResult<WorkflowStatus> {
        self.advance(caller, BallotOp::EndProposalsRegistering)
    }

    pub fn start_voting_session(&self, caller: &Address) -> AgoraResult<WorkflowStatus> {
        self.advance(caller, BallotOp::StartVotingSession)
    }

    pub fn end_voting_session(&self, caller: &Address) -> AgoraResult<WorkflowStatus> {
        self.advance(caller, BallotOp::EndVotingSession)
    }

    /// Close the ballot and return the winning proposal index
    pub fn tally_votes(&self, caller: &Address) -> AgoraResult<ProposalId> {
        self.advance(caller, BallotOp::TallyVotes)?;
        Ok(self.state.lock().winning_proposal_id)
    }

    /// Move to the phase after `op`'s required phase, applying its side effect
    fn advance(&self, caller: &Address, op: BallotOp) -> AgoraResult<WorkflowStatus> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        require(op, caller, *caller == self.owner, || AgoraError::NotOwner)?;
        let previous_status = state.status;
        require(op, caller, previous_status == op.required_status(), || {
            AgoraError::wrong_phase(op, previous_status)
        })?;
        let new_status = previous_status.next().ok_or_else(|| {
            AgoraError::Internal(format!("{} has no following phase", previous_status))
        })?;

        match op {
            BallotOp::StartProposalsRegistering => {
                state.proposals.push(Proposal::genesis());
            }
            BallotOp::TallyVotes => {
                state.winning_proposal_id = state.proposals.leader();
                info!(
                    "Votes tallied: proposal {} wins with {} of {} votes",
                    state.winning_proposal_id,
                    state
                        .proposals
                        .get(state.winning_proposal_id)
                        .map(|p| p.vote_count)
                        .unwrap_or(0),
                    state.proposals.total_votes()
                );
            }
            _ => {}
        }

        state.status = new_status;
        info!("Workflow status changed: {} -> {}", previous_status, new_status);
        self.emit(
            state,
            BallotEvent::WorkflowStatusChange {
                previous_status,
                new_status,
            },
        );

        Ok(new_status)
    }

    // ============ Reads ============

    /// Read a voter record (registered voters only)
    pub fn get_voter(&self, caller: &Address, voter: &Address) -> AgoraResult<Voter> {
        let state = self.state.lock();
        require("getVoter", caller, state.voters.is_registered(caller), || {
            AgoraError::NotAVoter
        })?;
        Ok(state.voters.get(voter))
    }

    /// Read one proposal (registered voters only)
    pub fn get_one_proposal(&self, caller: &Address, proposal_id: ProposalId) -> AgoraResult<Proposal> {
        let state = self.state.lock();
        require("getOneProposal", caller, state.voters.is_registered(caller), || {
            AgoraError::NotAVoter
        })?;
        state
            .proposals
            .get(proposal_id)
            .cloned()
            .ok_or(AgoraError::ProposalNotFound(proposal_id))
    }

    pub fn workflow_status(&self) -> WorkflowStatus {
        self.state.lock().status
    }

    /// Winning index; 0 until votes are tallied
    pub fn winning_proposal_id(&self) -> ProposalId {
        self.state.lock().winning_proposal_id
    }

    /// The winning proposal, once votes are tallied
    pub fn winning_proposal(&self) -> AgoraResult<Proposal> {
        let state = self.state.lock();
        let op = BallotOp::ReadWinner;
        if state.status != op.required_status() {
            return Err(AgoraError::wrong_phase(op, state.status));
        }
        state
            .proposals
            .get(state.winning_proposal_id)
            .cloned()
            .ok_or(AgoraError::ProposalNotFound(state.winning_proposal_id))
    }

    pub fn proposal_count(&self) -> usize {
        self.state.lock().proposals.len()
    }

    /// Events with a sequence number greater than `sequence`
    pub fn events_since(&self, sequence: u64) -> Vec<EventRecord> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|record| record.sequence > sequence)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> BallotSnapshot {
        let state = self.state.lock();
        BallotSnapshot {
            owner: self.owner,
            status: state.status,
            status_code: state.status.code(),
            proposals: state.proposals.all().to_vec(),
            winning_proposal_id: state.winning_proposal_id,
            registered_voters: state.voters.registered_count(),
            votes_cast: state.voters.voted_count(),
            event_count: state.events.len(),
        }
    }

    fn emit(&self, state: &mut BallotState, event: BallotEvent) {
        let record = EventRecord {
            sequence: state.events.len() as u64 + 1,
            timestamp: Timestamp::now(),
            event,
        };

        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(record.clone()) {
                warn!("Ballot event {} not delivered ({}), kept in event log", record.sequence, e);
            }
        }

        state.events.push(record);
    }
}

/// Shared ballot engine
pub type SharedBallot = Arc<BallotEngine>;

/// Reject the call with `err` unless `condition` holds
fn require(
    action: impl fmt::Display,
    caller: &Address,
    condition: bool,
    err: impl FnOnce() -> AgoraError,
) -> AgoraResult<()> {
    if condition {
        return Ok(());
    }
    let err = err();
    debug!("{} rejected for {}: {}", action, caller, err);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::create_event_channel;
    use agora_core::ErrorKind;
    use agora_crypto::KeyPair;

    struct Setup {
        engine: BallotEngine,
        owner: Address,
        voters: Vec<Address>,
        outsider: Address,
    }

    fn setup(voter_count: usize) -> Setup {
        let owner = KeyPair::generate().address();
        let engine = BallotEngine::new(owner, BallotConfig::default());
        let voters: Vec<Address> = (0..voter_count).map(|_| KeyPair::generate().address()).collect();
        for voter in &voters {
            engine.add_voter(&owner, *voter).unwrap();
        }
        Setup {
            engine,
            owner,
            voters,
            outsider: KeyPair::generate().address(),
        }
    }

    #[test]
    fn test_start_proposals_creates_genesis() {
        let s = setup(1);
        let status = s.engine.start_proposals_registering(&s.owner).unwrap();
        assert_eq!(status, WorkflowStatus::ProposalsRegistrationStarted);
        assert_eq!(status.code(), 1);

        let genesis = s.engine.get_one_proposal(&s.voters[0], 0).unwrap();
        assert_eq!(genesis.description, "GENESIS");
        assert_eq!(genesis.vote_count, 0);
    }

    #[test]
    fn test_transitions_require_owner() {
        let s = setup(1);
        let err = s.engine.start_proposals_registering(&s.voters[0]).unwrap_err();
        assert!(matches!(err, AgoraError::NotOwner));
        assert_eq!(s.engine.workflow_status(), WorkflowStatus::RegisteringVoters);
        assert_eq!(s.engine.proposal_count(), 0);
    }

    #[test]
    fn test_transition_twice_fails() {
        let s = setup(1);
        s.engine.start_proposals_registering(&s.owner).unwrap();
        let err = s.engine.start_proposals_registering(&s.owner).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongPhase);
        assert_eq!(err.to_string(), "registering proposals can't be started now");
        // No second GENESIS
        assert_eq!(s.engine.proposal_count(), 1);
    }

    #[test]
    fn test_add_voter_rules() {
        let s = setup(1);
        assert!(matches!(
            s.engine.add_voter(&s.owner, s.voters[0]),
            Err(AgoraError::AlreadyRegistered)
        ));
        assert!(matches!(
            s.engine.add_voter(&s.voters[0], s.outsider),
            Err(AgoraError::NotOwner)
        ));

        s.engine.start_proposals_registering(&s.owner).unwrap();
        let err = s.engine.add_voter(&s.owner, s.outsider).unwrap_err();
        assert_eq!(err.to_string(), "voters registration is not open yet");
    }

    #[test]
    fn test_add_voters_is_all_or_nothing() {
        let s = setup(1);
        let newcomer = KeyPair::generate().address();

        let err = s
            .engine
            .add_voters(&s.owner, &[newcomer, s.voters[0]])
            .unwrap_err();
        assert!(matches!(err, AgoraError::AlreadyRegistered));
        assert!(!s.engine.get_voter(&s.voters[0], &newcomer).unwrap().is_registered);
        assert_eq!(s.engine.events_since(0).len(), 1);

        let err = s
            .engine
            .add_voters(&s.owner, &[newcomer, s.outsider, newcomer])
            .unwrap_err();
        assert!(matches!(err, AgoraError::AlreadyRegistered));
        assert_eq!(s.engine.snapshot().registered_voters, 1);

        assert_eq!(s.engine.add_voters(&s.owner, &[newcomer, s.outsider]).unwrap(), 2);
        assert_eq!(s.engine.snapshot().registered_voters, 3);
    }

    #[test]
    fn test_get_voter() {
        let s = setup(1);
        let voter = s.engine.get_voter(&s.voters[0], &s.voters[0]).unwrap();
        assert!(voter.is_registered);
        assert!(!voter.has_voted);
        assert_eq!(voter.voted_proposal_id, 0);

        let unknown = s.engine.get_voter(&s.voters[0], &s.outsider).unwrap();
        assert_eq!(unknown, Voter::default());

        assert!(matches!(
            s.engine.get_voter(&s.outsider, &s.voters[0]),
            Err(AgoraError::NotAVoter)
        ));
    }

    #[test]
    fn test_add_proposal_rules() {
        let s = setup(1);
        let voter = s.voters[0];

        let err = s.engine.add_proposal(&voter, "Proposal for test").unwrap_err();
        assert_eq!(err.to_string(), "proposals are not allowed yet");

        s.engine.start_proposals_registering(&s.owner).unwrap();
        assert!(matches!(
            s.engine.add_proposal(&voter, ""),
            Err(AgoraError::EmptyDescription)
        ));
        // Voter check comes before the description check
        assert!(matches!(
            s.engine.add_proposal(&s.outsider, ""),
            Err(AgoraError::NotAVoter)
        ));

        let id = s.engine.add_proposal(&voter, "Proposal for test").unwrap();
        assert_eq!(id, 1);
        let proposal = s.engine.get_one_proposal(&voter, 1).unwrap();
        assert_eq!(proposal.description, "Proposal for test");
        assert_eq!(proposal.vote_count, 0);
    }

    #[test]
    fn test_proposal_limits() {
        let owner = Address::from_bytes([1u8; 32]);
        let voter = Address::from_bytes([2u8; 32]);
        let config = BallotConfig {
            max_proposals: 2,
            max_description_len: 8,
            ..Default::default()
        };
        let engine = BallotEngine::new(owner, config);
        engine.add_voter(&owner, voter).unwrap();
        engine.start_proposals_registering(&owner).unwrap();

        assert!(matches!(
            engine.add_proposal(&voter, "much too long"),
            Err(AgoraError::DescriptionTooLong { len: 13, max: 8 })
        ));
        assert_eq!(engine.add_proposal(&voter, "P1").unwrap(), 1);
        assert!(matches!(
            engine.add_proposal(&voter, "P2"),
            Err(AgoraError::TooManyProposals(2))
        ));
        assert_eq!(engine.proposal_count(), 2);
    }

    #[test]
    fn test_get_one_proposal_out_of_range() {
        let s = setup(1);
        s.engine.start_proposals_registering(&s.owner).unwrap();
        assert!(matches!(
            s.engine.get_one_proposal(&s.voters[0], 3),
            Err(AgoraError::ProposalNotFound(3))
        ));
    }

    #[test]
    fn test_vote_rejections_leave_state_untouched() {
        let s = setup(2);
        s.engine.start_proposals_registering(&s.owner).unwrap();
        s.engine.add_proposal(&s.voters[0], "P1").unwrap();
        s.engine.add_proposal(&s.voters[1], "P2").unwrap();
        s.engine.end_proposals_registering(&s.owner).unwrap();

        let err = s.engine.set_vote(&s.voters[0], 2).unwrap_err();
        assert_eq!(err.to_string(), "voting session hasn't started yet");

        s.engine.start_voting_session(&s.owner).unwrap();
        let before = s.engine.snapshot();

        assert!(matches!(
            s.engine.set_vote(&s.voters[0], 6),
            Err(AgoraError::ProposalNotFound(6))
        ));
        assert!(matches!(
            s.engine.set_vote(&s.outsider, 1),
            Err(AgoraError::NotAVoter)
        ));

        let after = s.engine.snapshot();
        assert_eq!(before.proposals, after.proposals);
        assert_eq!(after.votes_cast, 0);
        assert_eq!(before.event_count, after.event_count);
        assert!(!s.engine.get_voter(&s.voters[0], &s.voters[0]).unwrap().has_voted);
    }

    #[test]
    fn test_cannot_vote_twice() {
        let s = setup(1);
        let voter = s.voters[0];
        s.engine.start_proposals_registering(&s.owner).unwrap();
        s.engine.add_proposal(&voter, "P1").unwrap();
        s.engine.add_proposal(&voter, "P2").unwrap();
        s.engine.end_proposals_registering(&s.owner).unwrap();
        s.engine.start_voting_session(&s.owner).unwrap();

        s.engine.set_vote(&voter, 2).unwrap();
        let err = s.engine.set_vote(&voter, 1).unwrap_err();
        assert!(matches!(err, AgoraError::AlreadyVoted));

        assert_eq!(s.engine.get_one_proposal(&voter, 1).unwrap().vote_count, 0);
        assert_eq!(s.engine.get_one_proposal(&voter, 2).unwrap().vote_count, 1);

        let record = s.engine.get_voter(&voter, &voter).unwrap();
        assert!(record.has_voted);
        assert_eq!(record.voted_proposal_id, 2);
    }

    #[test]
    fn test_winning_proposal_requires_tally() {
        let s = setup(1);
        assert_eq!(s.engine.winning_proposal_id(), 0);
        assert_eq!(
            s.engine.winning_proposal().unwrap_err().kind(),
            ErrorKind::WrongPhase
        );
    }

    #[tokio::test]
    async fn test_events_are_published_in_order() {
        let owner = Address::from_bytes([1u8; 32]);
        let voter = Address::from_bytes([2u8; 32]);
        let (tx, mut rx) = create_event_channel(16);
        let mut engine = BallotEngine::new(owner, BallotConfig::default());
        engine.set_event_channel(tx);

        engine.add_voter(&owner, voter).unwrap();
        engine.start_proposals_registering(&owner).unwrap();
        engine.add_proposal(&voter, "P1").unwrap();
        // Rejected calls publish nothing
        assert!(engine.add_voter(&owner, voter).is_err());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.event, BallotEvent::VoterRegistered { voter_address: voter });

        let second = rx.recv().await.unwrap();
        assert_eq!(
            second.event,
            BallotEvent::WorkflowStatusChange {
                previous_status: WorkflowStatus::RegisteringVoters,
                new_status: WorkflowStatus::ProposalsRegistrationStarted,
            }
        );

        let third = rx.recv().await.unwrap();
        assert_eq!(third.event, BallotEvent::ProposalRegistered { proposal_id: 1 });
        assert!(rx.try_recv().is_err());

        assert_eq!(engine.events_since(1).len(), 2);
    }

    #[test]
    fn test_full_channel_does_not_fail_operations() {
        let owner = Address::from_bytes([1u8; 32]);
        let (tx, _rx) = create_event_channel(1);
        let mut engine = BallotEngine::new(owner, BallotConfig::default());
        engine.set_event_channel(tx);

        engine.add_voter(&owner, Address::from_bytes([2u8; 32])).unwrap();
        engine.add_voter(&owner, Address::from_bytes([3u8; 32])).unwrap();

        // The log keeps everything even when the channel is full
        assert_eq!(engine.events_since(0).len(), 2);
    }
}
