//! Civitas Identity - whitelist-gated identities and their voting units.
//!
//! This crate provides:
//! - The identity registry: census commitment, merkle-gated issuance,
//!   privileged revocation, ownership enumeration
//! - The voting ledger: one unit per live identity, depth-1 delegation,
//!   cascading release on revocation
//! - Checkpointed history for point-in-time vote and supply queries
//! - The observable event stream consumed by indexers

pub mod checkpoints;
pub mod error;
pub mod events;
pub mod ledger;
pub mod registry;

pub use checkpoints::{Checkpoint, Checkpoints};
pub use error::RegistryError;
pub use events::{EventLog, RegistryEvent};
pub use ledger::VotingLedger;
pub use registry::{Census, Identity, IdentityRegistry, RegistrySettings};
