use thiserror::Error;

/// Errors that can occur in cryptographic operations.
///
/// Proof verification itself never fails with an error; these surface only
/// when decoding externally supplied proof material.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid proof element at index {index}: {reason}")]
    InvalidProofElement { index: usize, reason: String },

    #[error("Proof too deep: {depth} > {max}")]
    ProofTooDeep { depth: usize, max: usize },
}
