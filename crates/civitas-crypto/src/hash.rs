//! Blake3 hashing utilities.

use civitas_types::{Address, Hash, IdentityId};

/// Domain tag for whitelist leaves.
pub const LEAF_DOMAIN: &str = "civitas/census-leaf/v1";

/// Domain tag for interior merkle nodes.
pub const NODE_DOMAIN: &str = "civitas/census-node/v1";

/// Compute blake3 hash of multiple data slices
pub fn hash_multi(data: &[&[u8]]) -> Hash {
    Hash::compute_multi(data)
}

/// Hash with a domain separator
pub fn hash_with_domain(data: &[u8], domain: &str) -> Hash {
    hash_multi(&[domain.as_bytes(), data])
}

/// Leaf committed for an `(address, id)` pair in a census tree.
///
/// Field order and widths are fixed: 20 address bytes, then the id as
/// 8 big-endian bytes. Tree construction must use the same encoding.
pub fn whitelist_leaf(owner: &Address, id: IdentityId) -> Hash {
    let mut data = [0u8; 28];
    data[..20].copy_from_slice(owner.as_bytes());
    data[20..].copy_from_slice(&id.to_be_bytes());
    hash_with_domain(&data, LEAF_DOMAIN)
}
