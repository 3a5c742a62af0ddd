//! Civitas Governance - proposals weighed by identity snapshots.
//!
//! This crate provides:
//! - Proposal lifecycle: Pending -> Active -> Succeeded/Defeated, with
//!   optional expiry of outcomes left unfinalized
//! - Vote weighing against the ledger as of the proposal snapshot
//! - The `VotesSource` seam the governor reads weights through

pub mod error;
pub mod governor;
pub mod proposal;
pub mod votes;

pub use error::GovernanceError;
pub use governor::{GovernanceEvent, Governor, GovernorSettings};
pub use proposal::{Proposal, ProposalData, ProposalId, ProposalState, ProposalVotes, VoteSupport};
pub use votes::VotesSource;
