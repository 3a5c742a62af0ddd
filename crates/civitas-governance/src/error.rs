use civitas_types::{Address, IdentityId};
use thiserror::Error;

use crate::proposal::{ProposalId, ProposalState};

/// Errors that can occur in governance operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Address {caller} does not own identity {id}")]
    NotOwner { id: IdentityId, caller: Address },

    #[error("Proposer votes below proposal threshold: {votes} < {threshold}")]
    BelowThreshold { votes: u64, threshold: u64 },

    #[error("Proposal already exists: {0}")]
    AlreadyExists(ProposalId),

    #[error("Proposal {id} is not active (state: {state:?})")]
    NotActive { id: ProposalId, state: ProposalState },

    #[error("Identity {voter} already voted on proposal {proposal}")]
    AlreadyVoted { proposal: ProposalId, voter: IdentityId },

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("Proposal {id} cannot be finalized (state: {state:?})")]
    NotFinalizable { id: ProposalId, state: ProposalState },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
