//! Scenario replay.
//!
//! A scenario is a JSON list of steps applied to a [`CivitasService`] in
//! order. Every committed event is written as one JSON line; rejected
//! steps are written as error lines and replay continues unless
//! `fail_fast` is set.

use std::io::Write;

use anyhow::Context;
use civitas_governance::{ProposalId, VoteSupport};
use civitas_types::{Address, Hash, IdentityId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::census::CensusFile;
use crate::service::CivitasService;

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mine {
        #[serde(default = "one")]
        blocks: u64,
    },
    Issue {
        caller: Address,
        id: IdentityId,
        /// Looked up in the census file when omitted
        #[serde(default)]
        proof: Option<Vec<Hash>>,
    },
    UpdateCensus {
        caller: Address,
        revoke_id: IdentityId,
        root: Hash,
        metadata_pointer: String,
    },
    Delegate {
        caller: Address,
        from: IdentityId,
        to: IdentityId,
    },
    Propose {
        caller: Address,
        proposer: IdentityId,
        description: String,
    },
    Vote {
        caller: Address,
        proposer: IdentityId,
        description: String,
        support: u8,
        voter: IdentityId,
    },
    Finalize {
        proposer: IdentityId,
        description: String,
    },
    State {
        proposer: IdentityId,
        description: String,
    },
    HasVoted {
        proposer: IdentityId,
        description: String,
        voter: IdentityId,
    },
    Votes {
        id: IdentityId,
    },
}

fn one() -> u64 {
    1
}

/// Outcome counters of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub applied: usize,
    pub rejected: usize,
}

/// Parse a scenario from JSON text.
pub fn parse_scenario(text: &str) -> anyhow::Result<Vec<Step>> {
    serde_json::from_str(text).context("Failed to parse scenario")
}

/// Apply `steps` in order, writing events and query results to `out`.
pub fn replay<W: Write>(
    service: &CivitasService,
    steps: &[Step],
    census: Option<&CensusFile>,
    fail_fast: bool,
    out: &mut W,
) -> anyhow::Result<ReplayReport> {
    let mut report = ReplayReport::default();

    for (index, step) in steps.iter().enumerate() {
        match apply(service, step, census) {
            Ok(output) => {
                report.applied += 1;
                for event in service.drain_events() {
                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                }
                if let Some(value) = output {
                    writeln!(out, "{}", value)?;
                }
            }
            Err(err) => {
                report.rejected += 1;
                warn!(step = index, error = %err, "scenario step rejected");
                let line = json!({ "step": index, "height": service.height(), "error": err.to_string() });
                writeln!(out, "{}", line)?;
                if fail_fast {
                    return Err(err.context(format!("Step {} rejected", index)));
                }
            }
        }
    }

    info!(applied = report.applied, rejected = report.rejected, "scenario replayed");
    Ok(report)
}

/// Apply a single step. Queries return a JSON value to print.
fn apply(
    service: &CivitasService,
    step: &Step,
    census: Option<&CensusFile>,
) -> anyhow::Result<Option<serde_json::Value>> {
    match step {
        Step::Mine { blocks } => {
            service.mine(*blocks);
        }
        Step::Issue { caller, id, proof } => {
            let proof = match proof {
                Some(proof) => proof.clone(),
                None => census
                    .and_then(|c| c.proof_for(caller, *id))
                    .map(<[Hash]>::to_vec)
                    .with_context(|| format!("No proof given or found in census for id {}", id))?,
            };
            service.issue(*caller, *id, &proof)?;
        }
        Step::UpdateCensus {
            caller,
            revoke_id,
            root,
            metadata_pointer,
        } => {
            service.update_census(*caller, *revoke_id, *root, metadata_pointer.clone())?;
        }
        Step::Delegate { caller, from, to } => {
            service.delegate(*caller, *from, *to)?;
        }
        Step::Propose {
            caller,
            proposer,
            description,
        } => {
            service.propose(*caller, *proposer, description)?;
        }
        Step::Vote {
            caller,
            proposer,
            description,
            support,
            voter,
        } => {
            let support = VoteSupport::try_from(*support)?;
            let proposal = ProposalId::derive(*proposer, description);
            service.cast_vote(*caller, proposal, support, *voter)?;
        }
        Step::Finalize {
            proposer,
            description,
        } => {
            service.finalize(ProposalId::derive(*proposer, description))?;
        }
        Step::State {
            proposer,
            description,
        } => {
            let proposal = ProposalId::derive(*proposer, description);
            let data = service.fetch_proposal_data(proposal)?;
            return Ok(Some(json!({
                "query": "state",
                "proposal_id": proposal,
                "state": data.state,
                "code": data.state.as_u8(),
                "for_votes": data.for_votes,
                "against_votes": data.against_votes,
                "abstain_votes": data.abstain_votes,
                "total_supply": data.total_supply,
            })));
        }
        Step::HasVoted {
            proposer,
            description,
            voter,
        } => {
            let proposal = ProposalId::derive(*proposer, description);
            return Ok(Some(json!({
                "query": "has_voted",
                "proposal_id": proposal,
                "voter": voter,
                "has_voted": service.has_voted(proposal, *voter),
            })));
        }
        Step::Votes { id } => {
            return Ok(Some(json!({
                "query": "votes",
                "id": id,
                "votes": service.get_votes(*id),
                "delegated_ids": service.get_delegated_ids_for_id(*id),
                "total_supply": service.get_total_supply(),
            })));
        }
    }
    Ok(None)
}
