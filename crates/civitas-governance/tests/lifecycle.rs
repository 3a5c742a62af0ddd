//! End-to-end flows: issue identities, delegate, propose, vote, tally.

use civitas_crypto::MerkleTree;
use civitas_governance::{
    GovernanceError, GovernanceEvent, Governor, GovernorSettings, ProposalId, ProposalState,
    VoteSupport,
};
use civitas_identity::{IdentityRegistry, RegistrySettings};
use civitas_types::{Address, IdentityId};

const OWNER_ID: IdentityId = IdentityId::new(9_111_111_983);
const ADDR1_ID: IdentityId = IdentityId::new(5_380_007_180);
const ADDR2_ID: IdentityId = IdentityId::new(1_111_111_188);
const IPFS_HASH: &str = "QmdKYfvbpe3bFzNZ4uANZSnbzeTu2iUHxQyEhMrxod7eih";
const PROPOSAL_DESCRIPTION: &str = "Proposal #1: fund the community census";

struct World {
    registry: IdentityRegistry,
    governor: Governor,
    owner: Address,
    addr1: Address,
    addr2: Address,
    height: u64,
}

impl World {
    /// Three identities issued at height 1; the clock then sits at 2.
    fn new() -> Self {
        let owner = Address::from_bytes([0x11; 20]);
        let addr1 = Address::from_bytes([0x22; 20]);
        let addr2 = Address::from_bytes([0x33; 20]);
        let tree = MerkleTree::from_whitelist(&[(owner, OWNER_ID), (addr1, ADDR1_ID), (addr2, ADDR2_ID)]);

        let mut registry = IdentityRegistry::new(RegistrySettings {
            name: "Test".to_string(),
            symbol: "T".to_string(),
            admin: owner,
            census_root: tree.root(),
            metadata_pointer: IPFS_HASH.to_string(),
        });
        for (index, (who, id)) in [(owner, OWNER_ID), (addr1, ADDR1_ID), (addr2, ADDR2_ID)]
            .into_iter()
            .enumerate()
        {
            let proof = tree.proof(index).unwrap().siblings;
            registry.issue(who, id, &proof, 1).unwrap();
        }

        Self {
            registry,
            governor: Governor::new(GovernorSettings::default()).unwrap(),
            owner,
            addr1,
            addr2,
            height: 2,
        }
    }

    fn mine(&mut self, blocks: u64) {
        self.height += blocks;
    }

    fn vote(&mut self, caller: Address, id: IdentityId, support: VoteSupport, pid: ProposalId) -> u64 {
        self.governor
            .cast_vote(&self.registry, caller, pid, support, id, self.height)
            .unwrap()
    }
}

#[test]
fn test_initialization() {
    let world = World::new();
    assert_eq!(world.registry.name(), "Test");
    assert_eq!(world.registry.symbol(), "T");
    assert_eq!(world.registry.metadata_pointer(), IPFS_HASH);
    assert_eq!(world.governor.voting_delay(), 1);
    assert_eq!(world.governor.voting_period(), 5);
    assert_eq!(world.governor.quorum_numerator(), 4);
    assert_eq!(world.governor.proposal_threshold(), 1);
}

#[test]
fn test_process_ok() {
    let mut world = World::new();
    let (owner, addr1, addr2) = (world.owner, world.addr1, world.addr2);

    let pid = world
        .governor
        .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height)
        .unwrap();
    assert!(matches!(world.governor.events()[0], GovernanceEvent::ProposalCreated { .. }));
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Pending);
    assert_eq!(world.governor.get_votes(&world.registry, OWNER_ID, world.height), 1);

    world.mine(1);

    assert_eq!(world.vote(owner, OWNER_ID, VoteSupport::For, pid), 1);
    assert!(world.governor.has_voted(pid, OWNER_ID));
    assert!(!world.governor.has_voted(pid, ADDR2_ID));

    world.vote(addr2, ADDR2_ID, VoteSupport::For, pid);
    assert!(world.governor.has_voted(pid, ADDR2_ID));
    assert!(!world.governor.has_voted(pid, ADDR1_ID));

    world.vote(addr1, ADDR1_ID, VoteSupport::Against, pid);
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Active);

    world.mine(5);
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Succeeded);

    let data = world
        .governor
        .fetch_proposal_data(&world.registry, pid, world.height)
        .unwrap();
    assert_eq!(data.voting_delay, 1);
    assert_eq!(data.for_votes, 2);
    assert_eq!(data.against_votes, 1);
    assert_eq!(data.abstain_votes, 0);
    assert_eq!(data.total_supply, 3);
    assert_eq!(data.state.as_u8(), 3);
}

#[test]
fn test_process_with_delegations() {
    let mut world = World::new();
    let (owner, addr1, addr2) = (world.owner, world.addr1, world.addr2);

    world.registry.delegate(owner, OWNER_ID, ADDR1_ID, world.height).unwrap();
    // proposing in the same step reads the prior step, before the delegation
    let pid = world
        .governor
        .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height)
        .unwrap();

    world.mine(2);
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Active);

    assert_eq!(world.vote(owner, OWNER_ID, VoteSupport::For, pid), 0);
    let votes = world.governor.proposal_votes(pid).unwrap();
    assert_eq!((votes.for_votes, votes.against_votes, votes.abstain_votes), (0, 0, 0));

    assert_eq!(world.vote(addr1, ADDR1_ID, VoteSupport::Against, pid), 2);
    assert_eq!(world.vote(addr2, ADDR2_ID, VoteSupport::For, pid), 1);

    world.mine(4);
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Defeated);
}

#[test]
fn test_cannot_propose_without_weight() {
    let mut world = World::new();
    let owner = world.owner;

    world.registry.delegate(owner, OWNER_ID, ADDR1_ID, world.height).unwrap();
    world.mine(1);

    assert_eq!(
        world
            .governor
            .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height),
        Err(GovernanceError::BelowThreshold { votes: 0, threshold: 1 })
    );
}

#[test]
fn test_cannot_act_for_foreign_identity() {
    let mut world = World::new();
    let (owner, addr1) = (world.owner, world.addr1);

    assert_eq!(
        world
            .governor
            .propose(&world.registry, addr1, OWNER_ID, PROPOSAL_DESCRIPTION, world.height),
        Err(GovernanceError::NotOwner { id: OWNER_ID, caller: addr1 })
    );

    let pid = world
        .governor
        .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height)
        .unwrap();
    world.mine(2);

    assert_eq!(
        world
            .governor
            .cast_vote(&world.registry, addr1, pid, VoteSupport::For, OWNER_ID, world.height),
        Err(GovernanceError::NotOwner { id: OWNER_ID, caller: addr1 })
    );
}

#[test]
fn test_delegation_after_start_does_not_move_tally() {
    let mut world = World::new();
    let (owner, addr1, addr2) = (world.owner, world.addr1, world.addr2);

    let pid = world
        .governor
        .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height)
        .unwrap();
    world.mine(1);

    // addr2 hands its unit to addr1 once voting is open
    world.registry.delegate(addr2, ADDR2_ID, ADDR1_ID, world.height).unwrap();
    assert_eq!(world.registry.get_votes(ADDR1_ID), 2);

    assert_eq!(world.vote(addr1, ADDR1_ID, VoteSupport::Against, pid), 1);
    assert_eq!(world.vote(addr2, ADDR2_ID, VoteSupport::For, pid), 1);
    assert_eq!(world.vote(owner, OWNER_ID, VoteSupport::For, pid), 1);

    world.mine(5);
    assert_eq!(world.governor.state(pid, world.height).unwrap(), ProposalState::Succeeded);
}

#[test]
fn test_revocation_during_vote_keeps_snapshot_supply() {
    let mut world = World::new();
    let owner = world.owner;

    let pid = world
        .governor
        .propose(&world.registry, owner, OWNER_ID, PROPOSAL_DESCRIPTION, world.height)
        .unwrap();
    world.mine(1);

    let root = world.registry.merkle_root();
    world
        .registry
        .update_census(owner, ADDR2_ID, root, IPFS_HASH.to_string(), world.height)
        .unwrap();
    assert_eq!(world.registry.get_total_supply(), 2);

    world.vote(owner, OWNER_ID, VoteSupport::For, pid);
    let data = world
        .governor
        .fetch_proposal_data(&world.registry, pid, world.height)
        .unwrap();
    assert_eq!(data.total_supply, 3);

    // a revoked identity no longer has an owner to vote through it
    let addr2 = world.addr2;
    assert!(matches!(
        world
            .governor
            .cast_vote(&world.registry, addr2, pid, VoteSupport::For, ADDR2_ID, world.height),
        Err(GovernanceError::NotOwner { .. })
    ));
}
