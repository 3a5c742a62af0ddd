//! Delegation-weighted voting ledger.
//!
//! Every live identity owns exactly one voting unit. A unit sits at a
//! *root*: an identity whose delegatee is itself. Delegation moves a unit
//! to another root, never to an identity that has itself delegated away,
//! so the delegation graph is a forest of height at most one and every
//! cascade touches only the direct delegators of a single id.
//!
//! Two coupled maps hold the structure:
//! - `delegatee`: id -> the root holding its unit
//! - `delegators`: id -> every id whose unit it holds (itself included
//!   while it is a root; empty once it delegates away)

use std::collections::{BTreeSet, HashMap};

use civitas_types::{IdentityId, Timepoint};
use tracing::{debug, info};

use crate::checkpoints::Checkpoints;
use crate::error::RegistryError;
use crate::events::{EventLog, RegistryEvent};

/// Voting ledger keyed by identity id.
#[derive(Debug, Default, Clone)]
pub struct VotingLedger {
    /// id -> current delegatee (itself when a root)
    delegatee: HashMap<IdentityId, IdentityId>,
    /// id -> ids whose unit it currently holds
    delegators: HashMap<IdentityId, BTreeSet<IdentityId>>,
    /// Per-id vote count history (kept after retirement for snapshots)
    votes: HashMap<IdentityId, Checkpoints>,
    /// Circulating supply history
    supply: Checkpoints,
}

impl VotingLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the ledger holds a delegation record for `id`.
    pub fn contains(&self, id: IdentityId) -> bool {
        self.delegatee.contains_key(&id)
    }

    /// Current delegatee of `id`, `None` once retired or never created.
    pub fn delegates(&self, id: IdentityId) -> Option<IdentityId> {
        self.delegatee.get(&id).copied()
    }

    /// Current voting weight: the size of the delegator set when `id` is
    /// a root, zero when its unit lives elsewhere.
    pub fn get_votes(&self, id: IdentityId) -> u64 {
        match self.delegatee.get(&id) {
            Some(target) if *target == id => {
                self.delegators.get(&id).map(|set| set.len() as u64).unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Ids whose unit `id` currently holds, in ascending order.
    pub fn delegated_ids(&self, id: IdentityId) -> Vec<IdentityId> {
        self.delegators
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Units in circulation, maintained incrementally.
    pub fn total_supply(&self) -> u64 {
        self.supply.latest()
    }

    /// Weight of `id` as of the end of timepoint `at`.
    pub fn past_votes(&self, id: IdentityId, at: Timepoint) -> u64 {
        self.votes.get(&id).map(|cp| cp.upper_lookup(at)).unwrap_or(0)
    }

    /// Circulating supply as of the end of timepoint `at`.
    pub fn past_total_supply(&self, at: Timepoint) -> u64 {
        self.supply.upper_lookup(at)
    }

    /// Number of ids holding a delegation record.
    pub fn len(&self) -> usize {
        self.delegatee.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegatee.is_empty()
    }

    /// Iterate over every tracked id.
    pub fn ids(&self) -> impl Iterator<Item = IdentityId> + '_ {
        self.delegatee.keys().copied()
    }

    /// Open a self-delegating record with one unit for a freshly issued id.
    pub(crate) fn create(&mut self, id: IdentityId, at: Timepoint, log: &mut EventLog) {
        debug_assert!(!self.contains(id), "ledger record for {} already exists", id);

        self.delegatee.insert(id, id);
        self.delegators.insert(id, BTreeSet::from([id]));
        self.record_votes(id, at, log);

        let supply = self.supply.latest() + 1;
        self.supply.push(at, supply);

        log.emit(RegistryEvent::DelegateCreated { id });
    }

    /// Validate a delegation request without touching any state.
    pub(crate) fn check_delegation(
        &self,
        from: IdentityId,
        to: IdentityId,
    ) -> Result<(), RegistryError> {
        if !self.contains(from) {
            return Err(RegistryError::NonexistentIdentity(from));
        }
        if from == to {
            return Err(RegistryError::SelfDelegation(from));
        }
        let target_delegatee = self
            .delegates(to)
            .ok_or(RegistryError::NonexistentIdentity(to))?;
        if target_delegatee != to {
            return Err(RegistryError::TargetAlreadyDelegated {
                target: to,
                delegatee: target_delegatee,
            });
        }
        Ok(())
    }

    /// Move `from`'s unit to the root `to`.
    ///
    /// If `from` already delegates elsewhere its unit is withdrawn from the
    /// old root first. If `from` is a root pooling other units, those
    /// delegators are released back to themselves before `from` leaves, so
    /// no chain is ever formed.
    pub(crate) fn delegate(
        &mut self,
        from: IdentityId,
        to: IdentityId,
        at: Timepoint,
        log: &mut EventLog,
    ) -> Result<(), RegistryError> {
        self.check_delegation(from, to)?;

        let old = self
            .delegates(from)
            .ok_or(RegistryError::NonexistentIdentity(from))?;
        if old == to {
            debug!(%from, %to, "delegation unchanged");
            return Ok(());
        }
        if old == from {
            self.release_delegators(from, at, log);
            if let Some(set) = self.delegators.get_mut(&from) {
                set.clear();
            }
            self.record_votes(from, at, log);
        } else {
            if let Some(set) = self.delegators.get_mut(&old) {
                set.remove(&from);
            }
            self.record_votes(old, at, log);
        }

        self.delegatee.insert(from, to);
        self.delegators.entry(to).or_default().insert(from);
        self.record_votes(to, at, log);

        log.emit(RegistryEvent::DelegateChanged {
            id: from,
            from_delegatee: old,
            to_delegatee: to,
        });
        debug!(%from, %old, %to, "delegation updated");
        Ok(())
    }

    /// Remove a revoked id and run both cascades.
    ///
    /// Outgoing: its unit is withdrawn from the root it delegated to.
    /// Incoming: every id that delegated to it becomes its own root again.
    /// Its own unit is destroyed and supply drops by one.
    pub(crate) fn retire(&mut self, id: IdentityId, at: Timepoint, log: &mut EventLog) {
        let Some(old) = self.delegatee.get(&id).copied() else {
            return;
        };

        let incoming = self
            .delegators
            .get(&id)
            .map(|set| set.iter().filter(|j| **j != id).count())
            .unwrap_or(0);
        let had_links = old != id || incoming > 0;

        if old != id {
            if let Some(set) = self.delegators.get_mut(&old) {
                set.remove(&id);
            }
            self.record_votes(old, at, log);
        }

        self.release_delegators(id, at, log);

        self.delegatee.remove(&id);
        self.delegators.remove(&id);
        if had_links {
            self.record_votes(id, at, log);
        } else {
            self.checkpoint_votes(id, at);
        }

        let supply = self.supply.latest().saturating_sub(1);
        self.supply.push(at, supply);

        if had_links {
            log.emit(RegistryEvent::DelegateRemoved { id });
        }
        info!(%id, released = incoming, supply, "voting unit retired");
    }

    /// Reset every delegator of `root` other than itself to a
    /// self-delegating root holding its own single unit.
    fn release_delegators(&mut self, root: IdentityId, at: Timepoint, log: &mut EventLog) {
        let released: Vec<IdentityId> = self
            .delegators
            .get(&root)
            .map(|set| set.iter().copied().filter(|j| *j != root).collect())
            .unwrap_or_default();

        for j in released {
            if let Some(set) = self.delegators.get_mut(&root) {
                set.remove(&j);
            }
            self.delegatee.insert(j, j);
            self.delegators.insert(j, BTreeSet::from([j]));
            self.record_votes(j, at, log);
            log.emit(RegistryEvent::DelegateChanged {
                id: j,
                from_delegatee: root,
                to_delegatee: j,
            });
        }
    }

    /// Checkpoint the current weight of `id` and emit a change event if
    /// it moved.
    fn record_votes(&mut self, id: IdentityId, at: Timepoint, log: &mut EventLog) {
        if let Some((previous, current)) = self.checkpoint_votes(id, at) {
            log.emit(RegistryEvent::DelegateVotesChanged {
                id,
                previous,
                current,
            });
        }
    }

    /// Checkpoint the current weight of `id`. Returns `(previous, current)`
    /// when the weight moved.
    fn checkpoint_votes(&mut self, id: IdentityId, at: Timepoint) -> Option<(u64, u64)> {
        let current = self.get_votes(id);
        let history = self.votes.entry(id).or_default();
        let previous = history.latest();
        if previous == current && !history.is_empty() {
            return None;
        }
        history.push(at, current);
        (previous != current).then_some((previous, current))
    }

    /// Check the structural invariants: depth-1, delegator sets mirroring
    /// the delegatee map, and conservation of units.
    pub fn verify_invariants(&self) -> Result<(), RegistryError> {
        let violation = |msg: String| Err(RegistryError::InvariantViolation(msg));

        let mut sum = 0u64;
        for (id, target) in &self.delegatee {
            if target != id && self.delegatee.get(target) != Some(target) {
                return violation(format!("{} delegates to non-root {}", id, target));
            }
            let Some(set) = self.delegators.get(target) else {
                return violation(format!("{} missing delegator set", target));
            };
            if !set.contains(id) {
                return violation(format!("{} absent from delegators of {}", id, target));
            }
            sum += self.get_votes(*id);
        }

        for (id, set) in &self.delegators {
            for j in set {
                if self.delegatee.get(j) != Some(id) {
                    return violation(format!("{} listed under {} but delegates elsewhere", j, id));
                }
            }
        }

        let live = self.delegatee.len() as u64;
        if sum != live || self.total_supply() != live {
            return violation(format!(
                "conservation: votes {} supply {} live {}",
                sum,
                self.total_supply(),
                live
            ));
        }
        Ok(())
    }
}
