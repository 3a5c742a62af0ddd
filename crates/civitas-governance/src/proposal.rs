//! Proposal data and lifecycle states.
//!
//! Proposals go through states: Pending -> Active -> Succeeded/Defeated,
//! and to Expired when a grace window is configured and the outcome was
//! never finalized.

use std::collections::HashSet;
use std::fmt;

use civitas_crypto::hash_multi;
use civitas_types::{Hash, IdentityId, Timepoint};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

const PROPOSAL_DOMAIN: &str = "civitas/proposal/v1";

/// Proposal identifier, derived from the proposer and description.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Hash);

impl ProposalId {
    /// Identifier for `description` proposed by `proposer`.
    pub fn derive(proposer: IdentityId, description: &str) -> Self {
        Self(hash_multi(&[
            PROPOSAL_DOMAIN.as_bytes(),
            &proposer.to_be_bytes(),
            description.as_bytes(),
        ]))
    }

    pub const fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    pub const fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProposalId({})", self.0)
    }
}

/// Proposal status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    /// Created, waiting for voting to start
    Pending,
    /// Voting is open
    Active,
    /// Voting ended without majority or quorum
    Defeated,
    /// Voting ended with majority and quorum
    Succeeded,
    /// Outcome not finalized within the grace window
    Expired,
}

impl ProposalState {
    /// Numeric code used by external callers.
    pub fn as_u8(&self) -> u8 {
        match self {
            ProposalState::Pending => 0,
            ProposalState::Active => 1,
            ProposalState::Defeated => 2,
            ProposalState::Succeeded => 3,
            ProposalState::Expired => 4,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProposalState::Active)
    }

    /// Whether voting has ended and the outcome is known.
    pub fn is_decided(&self) -> bool {
        matches!(self, ProposalState::Defeated | ProposalState::Succeeded)
    }
}

/// Vote support options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteSupport {
    Against,
    For,
    /// Counts toward quorum but not majority
    Abstain,
}

impl VoteSupport {
    pub fn as_u8(&self) -> u8 {
        match self {
            VoteSupport::Against => 0,
            VoteSupport::For => 1,
            VoteSupport::Abstain => 2,
        }
    }
}

impl TryFrom<u8> for VoteSupport {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VoteSupport::Against),
            1 => Ok(VoteSupport::For),
            2 => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidParameter(format!(
                "vote support must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

/// Weighted tally of a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVotes {
    pub against_votes: u64,
    pub for_votes: u64,
    pub abstain_votes: u64,
}

impl ProposalVotes {
    /// Participating weight, counted toward quorum.
    pub fn total(&self) -> u64 {
        self.for_votes + self.against_votes + self.abstain_votes
    }
}

/// Read-only aggregate returned to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalData {
    pub voting_delay: u64,
    pub for_votes: u64,
    pub against_votes: u64,
    pub abstain_votes: u64,
    pub total_supply: u64,
    pub state: ProposalState,
}

/// A governance proposal.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: IdentityId,
    pub description: String,
    /// First timepoint at which votes are accepted
    pub voting_start: Timepoint,
    /// First timepoint at which votes are no longer accepted
    pub voting_end: Timepoint,
    pub votes: ProposalVotes,
    pub has_voted: HashSet<IdentityId>,
    /// Supply at the snapshot, captured with the first vote
    pub snapshot_supply: Option<u64>,
    /// Outcome frozen by `finalize`
    pub finalized: Option<ProposalState>,
}

impl Proposal {
    pub fn new(
        proposer: IdentityId,
        description: String,
        voting_start: Timepoint,
        voting_end: Timepoint,
    ) -> Self {
        Self {
            id: ProposalId::derive(proposer, &description),
            proposer,
            description,
            voting_start,
            voting_end,
            votes: ProposalVotes::default(),
            has_voted: HashSet::new(),
            snapshot_supply: None,
            finalized: None,
        }
    }

    /// Timepoint whose ledger state weighs every vote.
    pub fn snapshot(&self) -> Timepoint {
        self.voting_start.saturating_sub(1)
    }

    pub fn has_voted(&self, voter: IdentityId) -> bool {
        self.has_voted.contains(&voter)
    }

    /// Record `weight` for `voter`. Caller checks activity and ownership.
    pub(crate) fn record_vote(&mut self, voter: IdentityId, support: VoteSupport, weight: u64) {
        match support {
            VoteSupport::For => self.votes.for_votes += weight,
            VoteSupport::Against => self.votes.against_votes += weight,
            VoteSupport::Abstain => self.votes.abstain_votes += weight,
        }
        self.has_voted.insert(voter);
    }
}

/// Minimum participation for `supply` at `percentage`, rounded up.
pub fn quorum(supply: u64, percentage: u64) -> u64 {
    (supply.saturating_mul(percentage)).div_ceil(100)
}
