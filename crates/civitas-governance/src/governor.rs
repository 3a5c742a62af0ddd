//! Governor: proposal registry and time-driven state machine.
//!
//! State is a pure function of the proposal and the caller-supplied
//! timepoint. Vote weights are read from a [`VotesSource`] as of the
//! proposal snapshot, so delegation changes after voting opens never move
//! an open tally.

use std::collections::HashMap;

use civitas_types::{Address, IdentityId, Timepoint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GovernanceError;
use crate::proposal::{
    quorum, Proposal, ProposalData, ProposalId, ProposalState, ProposalVotes, VoteSupport,
};
use crate::votes::VotesSource;

/// Governor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorSettings {
    /// Timepoints between proposal and start of voting
    pub voting_delay: u64,
    /// Length of the voting window
    pub voting_period: u64,
    /// Quorum as a percentage of snapshot supply
    pub quorum_percentage: u64,
    /// Minimum proposer weight
    pub proposal_threshold: u64,
    /// Window after voting ends in which the outcome must be finalized
    pub grace_period: Option<u64>,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            voting_delay: 1,
            voting_period: 5,
            quorum_percentage: 4,
            proposal_threshold: 1,
            grace_period: None,
        }
    }
}

impl GovernorSettings {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "voting_period must be greater than 0".to_string(),
            ));
        }
        if self.quorum_percentage > 100 {
            return Err(GovernanceError::InvalidParameter(format!(
                "quorum_percentage must be at most 100, got {}",
                self.quorum_percentage
            )));
        }
        if self.grace_period == Some(0) {
            return Err(GovernanceError::InvalidParameter(
                "grace_period must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event emitted by a committed governor transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        proposer: IdentityId,
        description: String,
        voting_start: Timepoint,
        voting_end: Timepoint,
    },
    VoteCast {
        voter: IdentityId,
        proposal_id: ProposalId,
        support: VoteSupport,
        weight: u64,
    },
    ProposalFinalized {
        proposal_id: ProposalId,
        state: ProposalState,
    },
}

/// Proposal registry.
#[derive(Debug, Clone)]
pub struct Governor {
    settings: GovernorSettings,
    proposals: HashMap<ProposalId, Proposal>,
    events: Vec<GovernanceEvent>,
}

impl Governor {
    pub fn new(settings: GovernorSettings) -> Result<Self, GovernanceError> {
        settings.validate()?;
        Ok(Self {
            settings,
            proposals: HashMap::new(),
            events: Vec::new(),
        })
    }

    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    pub fn voting_delay(&self) -> u64 {
        self.settings.voting_delay
    }

    pub fn voting_period(&self) -> u64 {
        self.settings.voting_period
    }

    pub fn quorum_numerator(&self) -> u64 {
        self.settings.quorum_percentage
    }

    pub fn proposal_threshold(&self) -> u64 {
        self.settings.proposal_threshold
    }

    /// Participation required for `supply` circulating units.
    pub fn quorum(&self, supply: u64) -> u64 {
        quorum(supply, self.settings.quorum_percentage)
    }

    /// Weight of `id` as of `at`.
    pub fn get_votes<S: VotesSource>(&self, source: &S, id: IdentityId, at: Timepoint) -> u64 {
        source.past_votes(id, at)
    }

    /// Open a proposal on behalf of `proposer`, owned by `caller`.
    ///
    /// The proposer's weight is read at `now - 1` so delegations made in
    /// the proposing step cannot lift it over the threshold.
    pub fn propose<S: VotesSource>(
        &mut self,
        source: &S,
        caller: Address,
        proposer: IdentityId,
        description: impl Into<String>,
        now: Timepoint,
    ) -> Result<ProposalId, GovernanceError> {
        let description = description.into();
        check_owner(source, caller, proposer)?;

        let votes = match now.checked_sub(1) {
            Some(prior) => source.past_votes(proposer, prior),
            None => 0,
        };
        if votes < self.settings.proposal_threshold {
            return Err(GovernanceError::BelowThreshold {
                votes,
                threshold: self.settings.proposal_threshold,
            });
        }

        let id = ProposalId::derive(proposer, &description);
        if self.proposals.contains_key(&id) {
            return Err(GovernanceError::AlreadyExists(id));
        }

        let voting_start = now.saturating_add(self.settings.voting_delay);
        let voting_end = voting_start.saturating_add(self.settings.voting_period);
        let proposal = Proposal::new(proposer, description.clone(), voting_start, voting_end);
        self.proposals.insert(id, proposal);

        info!(%id, %proposer, voting_start, voting_end, "proposal created");
        self.emit(GovernanceEvent::ProposalCreated {
            proposal_id: id,
            proposer,
            description,
            voting_start,
            voting_end,
        });
        Ok(id)
    }

    /// Cast `voter`'s snapshot weight on an active proposal.
    ///
    /// Returns the weight counted, which may be zero when the voter's
    /// unit sat elsewhere at the snapshot.
    pub fn cast_vote<S: VotesSource>(
        &mut self,
        source: &S,
        caller: Address,
        proposal_id: ProposalId,
        support: VoteSupport,
        voter: IdentityId,
        now: Timepoint,
    ) -> Result<u64, GovernanceError> {
        check_owner(source, caller, voter)?;

        let grace_period = self.settings.grace_period;
        let quorum_percentage = self.settings.quorum_percentage;
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(GovernanceError::UnknownProposal(proposal_id))?;

        let state = compute_state(proposal, now, grace_period, quorum_percentage);
        if !state.is_active() {
            return Err(GovernanceError::NotActive { id: proposal_id, state });
        }
        if proposal.has_voted(voter) {
            return Err(GovernanceError::AlreadyVoted { proposal: proposal_id, voter });
        }

        let snapshot = proposal.snapshot();
        let weight = source.past_votes(voter, snapshot);
        proposal
            .snapshot_supply
            .get_or_insert_with(|| source.past_total_supply(snapshot));
        proposal.record_vote(voter, support, weight);

        debug!(%proposal_id, %voter, ?support, weight, "vote cast");
        self.emit(GovernanceEvent::VoteCast {
            voter,
            proposal_id,
            support,
            weight,
        });
        Ok(weight)
    }

    /// State of a proposal at `now`.
    pub fn state(&self, id: ProposalId, now: Timepoint) -> Result<ProposalState, GovernanceError> {
        let proposal = self.proposal(id).ok_or(GovernanceError::UnknownProposal(id))?;
        Ok(compute_state(
            proposal,
            now,
            self.settings.grace_period,
            self.settings.quorum_percentage,
        ))
    }

    /// Freeze the outcome of a proposal whose voting has ended.
    pub fn finalize(&mut self, id: ProposalId, now: Timepoint) -> Result<ProposalState, GovernanceError> {
        let grace_period = self.settings.grace_period;
        let quorum_percentage = self.settings.quorum_percentage;
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;

        let state = compute_state(proposal, now, grace_period, quorum_percentage);
        if proposal.finalized.is_some() || !state.is_decided() {
            return Err(GovernanceError::NotFinalizable { id, state });
        }
        proposal.finalized = Some(state);

        info!(%id, ?state, "proposal finalized");
        self.emit(GovernanceEvent::ProposalFinalized { proposal_id: id, state });
        Ok(state)
    }

    pub fn proposal_votes(&self, id: ProposalId) -> Result<ProposalVotes, GovernanceError> {
        self.proposal(id)
            .map(|p| p.votes)
            .ok_or(GovernanceError::UnknownProposal(id))
    }

    /// Whether `voter` has voted; false for unknown proposals.
    pub fn has_voted(&self, id: ProposalId, voter: IdentityId) -> bool {
        self.proposal(id).map(|p| p.has_voted(voter)).unwrap_or(false)
    }

    pub fn proposal_snapshot(&self, id: ProposalId) -> Option<Timepoint> {
        self.proposal(id).map(Proposal::snapshot)
    }

    pub fn proposal_deadline(&self, id: ProposalId) -> Option<Timepoint> {
        self.proposal(id).map(|p| p.voting_end)
    }

    /// Tally, snapshot supply and state in one read.
    pub fn fetch_proposal_data<S: VotesSource>(
        &self,
        source: &S,
        id: ProposalId,
        now: Timepoint,
    ) -> Result<ProposalData, GovernanceError> {
        let proposal = self.proposal(id).ok_or(GovernanceError::UnknownProposal(id))?;
        let state = self.state(id, now)?;
        let total_supply = proposal
            .snapshot_supply
            .unwrap_or_else(|| source.past_total_supply(proposal.snapshot()));

        Ok(ProposalData {
            voting_delay: self.settings.voting_delay,
            for_votes: proposal.votes.for_votes,
            against_votes: proposal.votes.against_votes,
            abstain_votes: proposal.votes.abstain_votes,
            total_supply,
            state,
        })
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn events(&self) -> &[GovernanceEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: GovernanceEvent) {
        debug!(?event, "governance event");
        self.events.push(event);
    }
}

fn check_owner<S: VotesSource>(
    source: &S,
    caller: Address,
    id: IdentityId,
) -> Result<(), GovernanceError> {
    if source.owner_of(id) != Some(caller) {
        return Err(GovernanceError::NotOwner { id, caller });
    }
    Ok(())
}

fn compute_state(
    proposal: &Proposal,
    now: Timepoint,
    grace_period: Option<u64>,
    quorum_percentage: u64,
) -> ProposalState {
    if let Some(outcome) = proposal.finalized {
        return outcome;
    }
    if now < proposal.voting_start {
        return ProposalState::Pending;
    }
    if now < proposal.voting_end {
        return ProposalState::Active;
    }
    if let Some(grace) = grace_period {
        if now >= proposal.voting_end.saturating_add(grace) {
            return ProposalState::Expired;
        }
    }

    // No votes means no captured supply; the tally is then 0-0 and fails
    // the majority test regardless of quorum.
    let supply = proposal.snapshot_supply.unwrap_or(0);
    let votes = &proposal.votes;
    if votes.for_votes > votes.against_votes && votes.total() >= quorum(supply, quorum_percentage) {
        ProposalState::Succeeded
    } else {
        ProposalState::Defeated
    }
}
