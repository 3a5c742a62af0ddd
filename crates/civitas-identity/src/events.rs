//! Observable registry events.

use civitas_types::{Address, Hash, IdentityId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Event emitted by a committed registry or ledger transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    IdentityIssued {
        id: IdentityId,
        owner: Address,
    },
    DelegateCreated {
        id: IdentityId,
    },
    UpdateCensus {
        revoke_id: IdentityId,
        root: Hash,
        metadata_pointer: String,
    },
    DelegateChanged {
        id: IdentityId,
        from_delegatee: IdentityId,
        to_delegatee: IdentityId,
    },
    DelegateVotesChanged {
        id: IdentityId,
        previous: u64,
        current: u64,
    },
    DelegateRemoved {
        id: IdentityId,
    },
}

/// Append-only buffer of events awaiting collection by the caller.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<RegistryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: RegistryEvent) {
        debug!(?event, "registry event");
        self.events.push(event);
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
