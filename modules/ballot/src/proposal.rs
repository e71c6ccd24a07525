//! Proposal book and tally

use agora_core::ProposalId;
use serde::{Deserialize, Serialize};

/// Description of the sentinel proposal at index 0
pub const GENESIS_DESCRIPTION: &str = "GENESIS";

/// A submitted proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub description: String,
    pub vote_count: u64,
}

impl Proposal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            vote_count: 0,
        }
    }

    pub fn genesis() -> Self {
        Self::new(GENESIS_DESCRIPTION)
    }
}

/// Append-only proposal sequence
#[derive(Debug, Default)]
pub struct ProposalBook {
    proposals: Vec<Proposal>,
}

impl ProposalBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a proposal and return its index
    pub fn push(&mut self, proposal: Proposal) -> ProposalId {
        self.proposals.push(proposal);
        self.proposals.len() - 1
    }

    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn contains(&self, id: ProposalId) -> bool {
        id < self.proposals.len()
    }

    /// Add one vote to a proposal (returns false if the index is out of range)
    pub fn add_vote(&mut self, id: ProposalId) -> bool {
        match self.proposals.get_mut(id) {
            Some(proposal) => {
                proposal.vote_count += 1;
                true
            }
            None => false,
        }
    }

    /// Index of the highest vote count. The first proposal reaching the
    /// maximum wins, and an empty book yields 0.
    pub fn leader(&self) -> ProposalId {
        let mut winner = 0;
        for (id, proposal) in self.proposals.iter().enumerate() {
            if proposal.vote_count > self.proposals[winner].vote_count {
                winner = id;
            }
        }
        winner
    }

    pub fn total_votes(&self) -> u64 {
        self.proposals.iter().map(|p| p.vote_count).sum()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn all(&self) -> &[Proposal] {
        &self.proposals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_counts(counts: &[u64]) -> ProposalBook {
        let mut book = ProposalBook::new();
        for (i, count) in counts.iter().enumerate() {
            let id = book.push(Proposal::new(format!("P{}", i)));
            for _ in 0..*count {
                book.add_vote(id);
            }
        }
        book
    }

    #[test]
    fn test_push_returns_index() {
        let mut book = ProposalBook::new();
        assert_eq!(book.push(Proposal::genesis()), 0);
        assert_eq!(book.push(Proposal::new("P1")), 1);
        assert_eq!(book.get(0).unwrap().description, GENESIS_DESCRIPTION);
        assert!(!book.contains(2));
    }

    #[test]
    fn test_add_vote_out_of_range() {
        let mut book = book_with_counts(&[0, 0]);
        assert!(!book.add_vote(5));
        assert_eq!(book.total_votes(), 0);
    }

    #[test]
    fn test_leader_picks_maximum() {
        assert_eq!(book_with_counts(&[0, 1, 3, 2]).leader(), 2);
    }

    #[test]
    fn test_leader_ties_go_to_lowest_index() {
        assert_eq!(book_with_counts(&[0, 2, 1, 2]).leader(), 1);
        assert_eq!(book_with_counts(&[0, 0, 0]).leader(), 0);
    }

    #[test]
    fn test_leader_of_empty_book() {
        assert_eq!(ProposalBook::new().leader(), 0);
    }
}
