//! Civitas Types - Core type definitions for the civitas identity registry.
//!
//! This crate provides the fixed-width values every other crate agrees on:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - Identity ids (opaque 64-bit integers)
//! - Timepoints (block or step heights)
//!
//! Addresses, hashes and ids stay distinct types even though callers
//! often exchange them as plain integers or byte strings.

pub mod address;
pub mod hash;
pub mod identity;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use identity::{IdentityId, Timepoint};
pub use error::TypesError;
