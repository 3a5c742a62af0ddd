//! Civitas Crypto - Hashing primitives for the civitas registry.
//!
//! This crate provides:
//! - Blake3 hashing with domain separation
//! - The whitelist leaf encoding for `(address, identity id)` claims
//! - Sorted-pair merkle proof verification
//! - An off-line merkle tree builder for producing census commitments

pub mod hash;
pub mod merkle;
pub mod error;

pub use hash::{hash_multi, hash_with_domain, whitelist_leaf};
pub use merkle::{
    decode_proof, sorted_pair_hash, verify_encoded_whitelist, verify_whitelist, MerkleProof,
    MerkleTree, MAX_PROOF_DEPTH,
};
pub use error::CryptoError;
