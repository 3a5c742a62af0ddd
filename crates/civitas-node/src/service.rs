//! Serialized host for the registry and the governor.
//!
//! One write lock guards both stores, so every mutation is applied whole
//! and observed in order. Queries share the read lock. A logical height,
//! advanced by [`CivitasService::mine`], supplies the timepoint of every
//! operation.

use std::sync::Arc;

use civitas_governance::{
    GovernanceError, GovernanceEvent, Governor, GovernorSettings, ProposalData, ProposalId,
    ProposalState, VoteSupport,
};
use civitas_identity::{IdentityRegistry, RegistryError, RegistryEvent, RegistrySettings};
use civitas_types::{Address, Hash, IdentityId, Timepoint};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the service.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

/// Event from either store, as consumed by indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServiceEvent {
    Registry(RegistryEvent),
    Governance(GovernanceEvent),
}

/// Event stamped with the height it was committed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampedEvent {
    pub height: Timepoint,
    #[serde(flatten)]
    pub event: ServiceEvent,
}

#[derive(Debug)]
struct Inner {
    height: Timepoint,
    registry: IdentityRegistry,
    governor: Governor,
    events: Vec<StampedEvent>,
}

impl Inner {
    /// Move freshly emitted events from both stores into the stamped log.
    fn collect_events(&mut self) {
        let height = self.height;
        let registry_events = self.registry.drain_events();
        let governance_events = self.governor.drain_events();
        self.events.extend(
            registry_events
                .into_iter()
                .map(ServiceEvent::Registry)
                .chain(governance_events.into_iter().map(ServiceEvent::Governance))
                .map(|event| StampedEvent { height, event }),
        );
    }
}

/// Cloneable handle to the shared service state.
#[derive(Debug, Clone)]
pub struct CivitasService {
    inner: Arc<RwLock<Inner>>,
}

impl CivitasService {
    /// Create a service at height 0.
    pub fn new(
        registry: RegistrySettings,
        governor: GovernorSettings,
    ) -> Result<Self, ServiceError> {
        let inner = Inner {
            height: 0,
            registry: IdentityRegistry::new(registry),
            governor: Governor::new(governor)?,
            events: Vec::new(),
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
        })
    }

    /// Current logical height.
    pub fn height(&self) -> Timepoint {
        self.inner.read().height
    }

    /// Advance the logical height by `blocks`.
    pub fn mine(&self, blocks: u64) -> Timepoint {
        let mut inner = self.inner.write();
        inner.height = inner.height.saturating_add(blocks);
        debug!(height = inner.height, "advanced height");
        inner.height
    }

    pub fn issue(&self, caller: Address, id: IdentityId, proof: &[Hash]) -> Result<(), ServiceError> {
        let mut inner = self.inner.write();
        let at = inner.height;
        inner.registry.issue(caller, id, proof, at)?;
        inner.collect_events();
        Ok(())
    }

    pub fn update_census(
        &self,
        caller: Address,
        revoke_id: IdentityId,
        root: Hash,
        metadata_pointer: String,
    ) -> Result<bool, ServiceError> {
        let mut inner = self.inner.write();
        let at = inner.height;
        let revoked = inner
            .registry
            .update_census(caller, revoke_id, root, metadata_pointer, at)?;
        inner.collect_events();
        Ok(revoked)
    }

    pub fn delegate(&self, caller: Address, from: IdentityId, to: IdentityId) -> Result<(), ServiceError> {
        let mut inner = self.inner.write();
        let at = inner.height;
        inner.registry.delegate(caller, from, to, at)?;
        inner.collect_events();
        Ok(())
    }

    pub fn propose(
        &self,
        caller: Address,
        proposer: IdentityId,
        description: &str,
    ) -> Result<ProposalId, ServiceError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let id = inner
            .governor
            .propose(&inner.registry, caller, proposer, description, inner.height)?;
        inner.collect_events();
        Ok(id)
    }

    pub fn cast_vote(
        &self,
        caller: Address,
        proposal: ProposalId,
        support: VoteSupport,
        voter: IdentityId,
    ) -> Result<u64, ServiceError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let weight = inner
            .governor
            .cast_vote(&inner.registry, caller, proposal, support, voter, inner.height)?;
        inner.collect_events();
        Ok(weight)
    }

    pub fn finalize(&self, proposal: ProposalId) -> Result<ProposalState, ServiceError> {
        let mut inner = self.inner.write();
        let at = inner.height;
        let state = inner.governor.finalize(proposal, at)?;
        inner.collect_events();
        Ok(state)
    }

    pub fn fetch_proposal_data(&self, proposal: ProposalId) -> Result<ProposalData, ServiceError> {
        let inner = self.inner.read();
        Ok(inner
            .governor
            .fetch_proposal_data(&inner.registry, proposal, inner.height)?)
    }

    pub fn has_voted(&self, proposal: ProposalId, voter: IdentityId) -> bool {
        self.inner.read().governor.has_voted(proposal, voter)
    }

    pub fn get_votes(&self, id: IdentityId) -> u64 {
        self.inner.read().registry.get_votes(id)
    }

    pub fn get_delegated_ids_for_id(&self, id: IdentityId) -> Vec<IdentityId> {
        self.inner.read().registry.get_delegated_ids_for_id(id)
    }

    pub fn get_total_supply(&self) -> u64 {
        self.inner.read().registry.get_total_supply()
    }

    /// Run a read-only closure against the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&IdentityRegistry) -> R) -> R {
        f(&self.inner.read().registry)
    }

    /// Take every committed event, oldest first.
    pub fn drain_events(&self) -> Vec<StampedEvent> {
        std::mem::take(&mut self.inner.write().events)
    }
}
