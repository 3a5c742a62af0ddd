use civitas_types::{Address, IdentityId, Timepoint};
use thiserror::Error;

/// Errors that can occur in registry and ledger operations.
///
/// Every variant is a precondition failure raised before any state changes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Address-id pair not in whitelist: {owner} / {id}")]
    NotWhitelisted { owner: Address, id: IdentityId },

    #[error("Identity {0} already claimed")]
    AlreadyClaimed(IdentityId),

    #[error("Unauthorized caller: {caller}")]
    Unauthorized { caller: Address },

    #[error("Caller {caller} does not own identity {id}")]
    NotOwner { id: IdentityId, caller: Address },

    #[error("Delegation target {target} has already delegated to {delegatee}")]
    TargetAlreadyDelegated { target: IdentityId, delegatee: IdentityId },

    #[error("Identity {0} cannot delegate to itself")]
    SelfDelegation(IdentityId),

    #[error("Identity {0} does not exist")]
    NonexistentIdentity(IdentityId),

    #[error("Stale timepoint: {at} < {latest}")]
    StaleTimepoint { at: Timepoint, latest: Timepoint },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}
