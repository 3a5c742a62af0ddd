//! Read seam between the governor and the identity ledger.

use civitas_identity::IdentityRegistry;
use civitas_types::{Address, IdentityId, Timepoint};

/// Source of ownership and point-in-time voting weight.
pub trait VotesSource {
    /// Owner of a live identity.
    fn owner_of(&self, id: IdentityId) -> Option<Address>;

    /// Weight of `id` as of the end of `at`.
    fn past_votes(&self, id: IdentityId, at: Timepoint) -> u64;

    /// Circulating units as of the end of `at`.
    fn past_total_supply(&self, at: Timepoint) -> u64;
}

impl VotesSource for IdentityRegistry {
    fn owner_of(&self, id: IdentityId) -> Option<Address> {
        IdentityRegistry::owner_of(self, id)
    }

    fn past_votes(&self, id: IdentityId, at: Timepoint) -> u64 {
        IdentityRegistry::past_votes(self, id, at)
    }

    fn past_total_supply(&self, at: Timepoint) -> u64 {
        IdentityRegistry::past_total_supply(self, at)
    }
}
