//! Identity registry.
//!
//! Identities are issued only to `(address, id)` pairs proven present in
//! the current census commitment, exactly once per id. The privileged
//! admin replaces the census and may revoke one identity in the same call.

use std::collections::HashMap;

use civitas_crypto::verify_whitelist;
use civitas_types::{Address, Hash, IdentityId, Timepoint};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::events::{EventLog, RegistryEvent};
use crate::ledger::VotingLedger;

/// Published allow-list commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    /// Merkle root over whitelist leaves
    pub root: Hash,
    /// Pointer to the off-line census data (e.g. an IPFS hash)
    pub metadata_pointer: String,
    /// Incremented on every replacement
    pub version: u64,
}

/// One admitted participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub owner: Address,
    /// False once revoked; revoked ids are never issued again
    pub exists: bool,
}

/// Construction parameters for a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub name: String,
    pub symbol: String,
    /// Only caller allowed to update the census
    pub admin: Address,
    pub census_root: Hash,
    pub metadata_pointer: String,
}

/// Registry of identities and owner of their voting ledger.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    name: String,
    symbol: String,
    admin: Address,
    census: Census,
    /// Every identity ever issued, live or revoked
    identities: HashMap<IdentityId, Identity>,
    /// owner -> live ids in issuance order
    owned: HashMap<Address, Vec<IdentityId>>,
    live_count: u64,
    ledger: VotingLedger,
    events: EventLog,
    latest_timepoint: Timepoint,
}

impl IdentityRegistry {
    /// Create a registry with an initial census.
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            name: settings.name,
            symbol: settings.symbol,
            admin: settings.admin,
            census: Census {
                root: settings.census_root,
                metadata_pointer: settings.metadata_pointer,
                version: 0,
            },
            identities: HashMap::new(),
            owned: HashMap::new(),
            live_count: 0,
            ledger: VotingLedger::new(),
            events: EventLog::new(),
            latest_timepoint: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn census(&self) -> &Census {
        &self.census
    }

    pub fn merkle_root(&self) -> Hash {
        self.census.root
    }

    pub fn metadata_pointer(&self) -> &str {
        &self.census.metadata_pointer
    }

    /// Latest timepoint at which a mutation was committed.
    pub fn latest_timepoint(&self) -> Timepoint {
        self.latest_timepoint
    }

    /// Issue `id` to `caller`, who must appear with it in the current census.
    pub fn issue(
        &mut self,
        caller: Address,
        id: IdentityId,
        proof: &[Hash],
        at: Timepoint,
    ) -> Result<(), RegistryError> {
        self.check_timepoint(at)?;

        if self.identities.contains_key(&id) {
            return Err(RegistryError::AlreadyClaimed(id));
        }
        if !verify_whitelist(&caller, id, proof, &self.census.root) {
            return Err(RegistryError::NotWhitelisted { owner: caller, id });
        }

        self.latest_timepoint = at;
        self.identities.insert(
            id,
            Identity {
                id,
                owner: caller,
                exists: true,
            },
        );
        self.owned.entry(caller).or_default().push(id);
        self.live_count += 1;

        self.events.emit(RegistryEvent::IdentityIssued { id, owner: caller });
        self.ledger.create(id, at, &mut self.events);

        info!(%id, owner = %caller, live = self.live_count, "identity issued");
        Ok(())
    }

    /// Replace the census and, if `revoke_id` is live, revoke it.
    ///
    /// Both effects share one call: the census is always replaced, while
    /// revocation of a non-live id is silently skipped. Returns whether an
    /// identity was revoked.
    pub fn update_census(
        &mut self,
        caller: Address,
        revoke_id: IdentityId,
        new_root: Hash,
        new_metadata_pointer: String,
        at: Timepoint,
    ) -> Result<bool, RegistryError> {
        if caller != self.admin {
            warn!(%caller, "rejected census update from non-admin");
            return Err(RegistryError::Unauthorized { caller });
        }
        self.check_timepoint(at)?;
        self.latest_timepoint = at;

        self.census = Census {
            root: new_root,
            metadata_pointer: new_metadata_pointer.clone(),
            version: self.census.version + 1,
        };
        self.events.emit(RegistryEvent::UpdateCensus {
            revoke_id,
            root: new_root,
            metadata_pointer: new_metadata_pointer,
        });
        info!(root = %new_root, version = self.census.version, "census updated");

        let revoked = self.revoke(revoke_id, at);
        Ok(revoked)
    }

    fn revoke(&mut self, id: IdentityId, at: Timepoint) -> bool {
        let Some(identity) = self.identities.get_mut(&id).filter(|i| i.exists) else {
            return false;
        };
        identity.exists = false;
        let owner = identity.owner;

        if let Some(ids) = self.owned.get_mut(&owner) {
            ids.retain(|owned| *owned != id);
            if ids.is_empty() {
                self.owned.remove(&owner);
            }
        }
        self.live_count -= 1;
        self.ledger.retire(id, at, &mut self.events);

        info!(%id, %owner, live = self.live_count, "identity revoked");
        true
    }

    /// Delegate the unit of `from` (owned by `caller`) to the root `to`.
    pub fn delegate(
        &mut self,
        caller: Address,
        from: IdentityId,
        to: IdentityId,
        at: Timepoint,
    ) -> Result<(), RegistryError> {
        if self.owner_of(from) != Some(caller) {
            return Err(RegistryError::NotOwner { id: from, caller });
        }
        self.check_timepoint(at)?;
        self.ledger.check_delegation(from, to)?;

        self.latest_timepoint = at;
        self.ledger.delegate(from, to, at, &mut self.events)
    }

    fn check_timepoint(&self, at: Timepoint) -> Result<(), RegistryError> {
        if at < self.latest_timepoint {
            return Err(RegistryError::StaleTimepoint {
                at,
                latest: self.latest_timepoint,
            });
        }
        Ok(())
    }

    /// Owner of a live identity.
    pub fn owner_of(&self, id: IdentityId) -> Option<Address> {
        self.identities
            .get(&id)
            .filter(|identity| identity.exists)
            .map(|identity| identity.owner)
    }

    /// Identity record, including revoked ones.
    pub fn identity(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.get(&id)
    }

    pub fn is_live(&self, id: IdentityId) -> bool {
        self.owner_of(id).is_some()
    }

    /// Number of live identities owned by `owner`.
    pub fn balance_of(&self, owner: &Address) -> usize {
        self.owned.get(owner).map(Vec::len).unwrap_or(0)
    }

    pub fn token_of_owner_by_index(&self, owner: &Address, index: usize) -> Option<IdentityId> {
        self.owned.get(owner).and_then(|ids| ids.get(index)).copied()
    }

    pub fn identities_of(&self, owner: &Address) -> &[IdentityId] {
        self.owned.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn live_count(&self) -> u64 {
        self.live_count
    }

    pub fn ledger(&self) -> &VotingLedger {
        &self.ledger
    }

    pub fn get_votes(&self, id: IdentityId) -> u64 {
        self.ledger.get_votes(id)
    }

    pub fn get_delegated_ids_for_id(&self, id: IdentityId) -> Vec<IdentityId> {
        self.ledger.delegated_ids(id)
    }

    pub fn get_total_supply(&self) -> u64 {
        self.ledger.total_supply()
    }

    pub fn delegates(&self, id: IdentityId) -> Option<IdentityId> {
        self.ledger.delegates(id)
    }

    pub fn past_votes(&self, id: IdentityId, at: Timepoint) -> u64 {
        self.ledger.past_votes(id, at)
    }

    pub fn past_total_supply(&self, at: Timepoint) -> u64 {
        self.ledger.past_total_supply(at)
    }

    /// Events committed since the last drain.
    pub fn events(&self) -> &[RegistryEvent] {
        self.events.as_slice()
    }

    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.events.drain()
    }

    /// Ledger invariants plus referential integrity with the registry.
    pub fn verify_invariants(&self) -> Result<(), RegistryError> {
        self.ledger.verify_invariants()?;

        if let Some(orphan) = self.ledger.ids().find(|id| !self.is_live(*id)) {
            return Err(RegistryError::InvariantViolation(format!(
                "ledger record for non-live identity {}",
                orphan
            )));
        }
        if self.ledger.len() as u64 != self.live_count {
            return Err(RegistryError::InvariantViolation(format!(
                "ledger tracks {} ids, registry has {} live",
                self.ledger.len(),
                self.live_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_crypto::MerkleTree;

    const O: IdentityId = IdentityId::new(9_111_111_983);
    const X: IdentityId = IdentityId::new(5_380_007_180);
    const Y: IdentityId = IdentityId::new(1_111_111_188);
    const OUTSIDER_ID: IdentityId = IdentityId::new(8_888_888_890);
    const METADATA: &str = "QmdKYfvbpe3bFzNZ4uANZSnbzeTu2iUHxQyEhMrxod7eih";

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_bytes(bytes)
    }

    struct Fixture {
        registry: IdentityRegistry,
        tree: MerkleTree,
        admin: Address,
        owner: Address,
        addr1: Address,
        addr2: Address,
    }

    impl Fixture {
        fn new() -> Self {
            let admin = addr(1);
            let (owner, addr1, addr2) = (admin, addr(2), addr(3));
            let tree = MerkleTree::from_whitelist(&[(owner, O), (addr1, X), (addr2, Y)]);
            let registry = IdentityRegistry::new(RegistrySettings {
                name: "Test".to_string(),
                symbol: "T".to_string(),
                admin,
                census_root: tree.root(),
                metadata_pointer: METADATA.to_string(),
            });
            Self { registry, tree, admin, owner, addr1, addr2 }
        }

        fn proof(&self, index: usize) -> Vec<Hash> {
            self.tree.proof(index).unwrap().siblings
        }

        fn issue_all(&mut self) {
            let (p0, p1, p2) = (self.proof(0), self.proof(1), self.proof(2));
            self.registry.issue(self.owner, O, &p0, 1).unwrap();
            self.registry.issue(self.addr1, X, &p1, 1).unwrap();
            self.registry.issue(self.addr2, Y, &p2, 1).unwrap();
        }

        fn revoke(&mut self, id: IdentityId, at: Timepoint) -> bool {
            let root = self.tree.root();
            self.registry
                .update_census(self.admin, id, root, METADATA.to_string(), at)
                .unwrap()
        }
    }

    #[test]
    fn test_initial_state() {
        let fx = Fixture::new();
        assert_eq!(fx.registry.name(), "Test");
        assert_eq!(fx.registry.symbol(), "T");
        assert_eq!(fx.registry.merkle_root(), fx.tree.root());
        assert_eq!(fx.registry.metadata_pointer(), METADATA);
        assert_eq!(fx.registry.get_total_supply(), 0);
    }

    #[test]
    fn test_issue_whitelisted() {
        let mut fx = Fixture::new();
        assert_eq!(fx.registry.balance_of(&fx.owner), 0);
        fx.issue_all();

        assert_eq!(fx.registry.balance_of(&fx.owner), 1);
        assert_eq!(fx.registry.balance_of(&fx.addr1), 1);
        assert_eq!(fx.registry.token_of_owner_by_index(&fx.owner, 0), Some(O));
        assert_eq!(fx.registry.token_of_owner_by_index(&fx.addr1, 0), Some(X));
        assert_eq!(fx.registry.token_of_owner_by_index(&fx.addr2, 0), Some(Y));
        assert_eq!(fx.registry.token_of_owner_by_index(&fx.addr2, 1), None);
        assert_eq!(fx.registry.get_total_supply(), 3);
        fx.registry.verify_invariants().unwrap();
    }

    #[test]
    fn test_issue_emits_events() {
        let mut fx = Fixture::new();
        let proof = fx.proof(0);
        fx.registry.issue(fx.owner, O, &proof, 1).unwrap();

        let events = fx.registry.drain_events();
        assert_eq!(events[0], RegistryEvent::IdentityIssued { id: O, owner: fx.owner });
        assert!(events.contains(&RegistryEvent::DelegateCreated { id: O }));
        assert_eq!(fx.registry.get_votes(O), 1);
    }

    #[test]
    fn test_issue_wrong_id_rejected() {
        let mut fx = Fixture::new();
        let proof = fx.proof(0);
        let wrong = IdentityId::new(1_111_111_190);
        assert_eq!(
            fx.registry.issue(fx.owner, wrong, &proof, 1),
            Err(RegistryError::NotWhitelisted { owner: fx.owner, id: wrong })
        );
    }

    #[test]
    fn test_issue_outsider_rejected() {
        let mut fx = Fixture::new();
        let outsider = addr(9);
        let proof = fx.proof(1);
        let result = fx.registry.issue(outsider, OUTSIDER_ID, &proof, 1);
        assert!(matches!(result, Err(RegistryError::NotWhitelisted { .. })));
        assert!(fx.registry.events().is_empty());
    }

    #[test]
    fn test_issue_twice_rejected_regardless_of_proof() {
        let mut fx = Fixture::new();
        let proof = fx.proof(0);
        fx.registry.issue(fx.owner, O, &proof, 1).unwrap();

        assert_eq!(fx.registry.issue(fx.owner, O, &proof, 2), Err(RegistryError::AlreadyClaimed(O)));
        assert_eq!(fx.registry.issue(fx.owner, O, &[], 2), Err(RegistryError::AlreadyClaimed(O)));
    }

    #[test]
    fn test_revoked_id_cannot_be_reissued() {
        let mut fx = Fixture::new();
        fx.issue_all();
        assert!(fx.revoke(X, 2));

        let proof = fx.proof(1);
        assert_eq!(fx.registry.issue(fx.addr1, X, &proof, 3), Err(RegistryError::AlreadyClaimed(X)));
        assert_eq!(fx.registry.identity(X).map(|i| i.exists), Some(false));
    }

    #[test]
    fn test_update_census_emits_event() {
        let mut fx = Fixture::new();
        let new_root = Hash::compute(b"next census");
        let revoked = fx
            .registry
            .update_census(fx.admin, OUTSIDER_ID, new_root, "QmNext".to_string(), 1)
            .unwrap();

        assert!(!revoked);
        assert_eq!(fx.registry.merkle_root(), new_root);
        assert_eq!(fx.registry.metadata_pointer(), "QmNext");
        assert_eq!(fx.registry.census().version, 1);
        assert_eq!(
            fx.registry.events(),
            &[RegistryEvent::UpdateCensus {
                revoke_id: OUTSIDER_ID,
                root: new_root,
                metadata_pointer: "QmNext".to_string(),
            }]
        );
    }

    #[test]
    fn test_update_census_requires_admin() {
        let mut fx = Fixture::new();
        fx.issue_all();
        let root = fx.tree.root();
        let result = fx.registry.update_census(fx.addr1, X, root, METADATA.to_string(), 2);

        assert_eq!(result, Err(RegistryError::Unauthorized { caller: fx.addr1 }));
        assert!(fx.registry.is_live(X));
        assert_eq!(fx.registry.census().version, 0);
    }

    #[test]
    fn test_census_change_does_not_affect_issued_identities() {
        let mut fx = Fixture::new();
        fx.issue_all();
        fx.registry
            .update_census(fx.admin, OUTSIDER_ID, Hash::compute(b"other"), "Qm".to_string(), 2)
            .unwrap();

        assert_eq!(fx.registry.live_count(), 3);
        let proof = fx.proof(1);
        fx.registry.delegate(fx.addr1, X, Y, 3).unwrap();
        // issuance under the old root is no longer possible
        assert!(matches!(
            fx.registry.issue(fx.addr1, IdentityId::new(42), &proof, 3),
            Err(RegistryError::NotWhitelisted { .. })
        ));
    }

    #[test]
    fn test_delegate_requires_ownership() {
        let mut fx = Fixture::new();
        fx.issue_all();
        assert_eq!(
            fx.registry.delegate(fx.owner, X, Y, 2),
            Err(RegistryError::NotOwner { id: X, caller: fx.owner })
        );
    }

    #[test]
    fn test_delegate_to_delegated_target_rejected() {
        let mut fx = Fixture::new();
        fx.issue_all();
        fx.registry.delegate(fx.owner, O, X, 2).unwrap();

        assert_eq!(
            fx.registry.delegate(fx.addr2, Y, O, 3),
            Err(RegistryError::TargetAlreadyDelegated { target: O, delegatee: X })
        );
    }

    #[test]
    fn test_delegate_scenario() {
        let mut fx = Fixture::new();
        fx.issue_all();
        assert_eq!(fx.registry.delegates(O), Some(O));

        fx.registry.delegate(fx.owner, O, X, 2).unwrap();
        assert_eq!(fx.registry.get_votes(O), 0);
        assert_eq!(fx.registry.delegates(O), Some(X));
        assert_eq!(fx.registry.get_votes(X), 2);
        assert_eq!(fx.registry.get_total_supply(), 3);

        // X is a root receiving delegations; it may still be targeted
        fx.registry.delegate(fx.addr2, Y, X, 2).unwrap();
        assert_eq!(fx.registry.get_votes(X), 3);
        fx.registry.verify_invariants().unwrap();
    }

    #[test]
    fn test_revoke_pooled_root_returns_votes() {
        let mut fx = Fixture::new();
        fx.issue_all();
        fx.registry.delegate(fx.owner, O, X, 2).unwrap();
        fx.registry.drain_events();

        assert!(fx.revoke(X, 3));

        assert!(fx.registry.events().contains(&RegistryEvent::DelegateRemoved { id: X }));
        assert_eq!(fx.registry.get_votes(O), 1);
        assert_eq!(fx.registry.get_delegated_ids_for_id(O).len(), 1);
        assert_eq!(fx.registry.get_votes(X), 0);
        assert!(fx.registry.get_delegated_ids_for_id(X).is_empty());
        assert_eq!(fx.registry.get_total_supply(), 2);
        assert_eq!(fx.registry.balance_of(&fx.addr1), 0);
        assert_eq!(fx.registry.owner_of(X), None);
        fx.registry.verify_invariants().unwrap();
    }

    #[test]
    fn test_revoke_delegating_id_removes_its_unit() {
        let mut fx = Fixture::new();
        fx.issue_all();
        fx.registry.delegate(fx.addr1, X, Y, 2).unwrap();
        fx.registry.delegate(fx.owner, O, Y, 2).unwrap();
        assert_eq!(fx.registry.get_votes(Y), 3);

        assert!(fx.revoke(X, 3));

        assert_eq!(fx.registry.get_votes(Y), 2);
        assert_eq!(fx.registry.get_delegated_ids_for_id(Y).len(), 2);
        assert_eq!(fx.registry.get_votes(X), 0);
        assert_eq!(fx.registry.get_total_supply(), 2);
        fx.registry.verify_invariants().unwrap();
    }

    #[test]
    fn test_stale_timepoint_rejected_without_mutation() {
        let mut fx = Fixture::new();
        fx.issue_all();
        fx.registry.delegate(fx.owner, O, X, 5).unwrap();
        fx.registry.drain_events();

        assert_eq!(
            fx.registry.delegate(fx.addr2, Y, X, 4),
            Err(RegistryError::StaleTimepoint { at: 4, latest: 5 })
        );
        assert!(fx.registry.events().is_empty());
        assert_eq!(fx.registry.get_votes(X), 2);
    }
}
