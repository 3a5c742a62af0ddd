use civitas_types::{Address, Hash, IdentityId};
use crate::error::CryptoError;
use crate::hash::{hash_multi, whitelist_leaf, NODE_DOMAIN};

/// Longest sibling path accepted by the verifier.
pub const MAX_PROOF_DEPTH: usize = 256;

/// Hash two children in sorted-pair order: the lexicographically smaller
/// input goes first, so a proof carries no left/right flags.
pub fn sorted_pair_hash(a: &Hash, b: &Hash) -> Hash {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    hash_multi(&[NODE_DOMAIN.as_bytes(), first.as_bytes(), second.as_bytes()])
}

/// Merkle inclusion proof: the sibling hashes from leaf to root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MerkleProof {
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Compute the root reached from `leaf` by folding in every sibling.
    pub fn compute_root(&self, leaf: &Hash) -> Hash {
        self.siblings
            .iter()
            .fold(*leaf, |current, sibling| sorted_pair_hash(&current, sibling))
    }

    /// Verify this proof against an expected root.
    pub fn verify(&self, leaf: &Hash, root: &Hash) -> bool {
        if self.siblings.len() > MAX_PROOF_DEPTH {
            return false;
        }
        &self.compute_root(leaf) == root
    }

    /// Get proof size (number of siblings)
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Decide whether `(owner, id)` is committed under `root`.
///
/// Never errors: any mismatch in encoding, path or root yields `false`.
pub fn verify_whitelist(owner: &Address, id: IdentityId, proof: &[Hash], root: &Hash) -> bool {
    if proof.len() > MAX_PROOF_DEPTH {
        return false;
    }
    let leaf = whitelist_leaf(owner, id);
    let computed = proof
        .iter()
        .fold(leaf, |current, sibling| sorted_pair_hash(&current, sibling));
    &computed == root
}

/// Same as [`verify_whitelist`], for proofs still in raw byte form.
///
/// A path with any element that is not exactly 32 bytes is structurally
/// invalid and verifies as `false`.
pub fn verify_encoded_whitelist<T: AsRef<[u8]>>(
    owner: &Address,
    id: IdentityId,
    proof: &[T],
    root: &Hash,
) -> bool {
    let mut siblings = Vec::with_capacity(proof.len());
    for element in proof {
        match Hash::from_slice(element.as_ref()) {
            Ok(hash) => siblings.push(hash),
            Err(_) => return false,
        }
    }
    verify_whitelist(owner, id, &siblings, root)
}

/// Decode a hex-encoded proof path (as produced by census tooling).
pub fn decode_proof<S: AsRef<str>>(path: &[S]) -> Result<Vec<Hash>, CryptoError> {
    if path.len() > MAX_PROOF_DEPTH {
        return Err(CryptoError::ProofTooDeep {
            depth: path.len(),
            max: MAX_PROOF_DEPTH,
        });
    }
    path.iter()
        .enumerate()
        .map(|(index, element)| {
            element
                .as_ref()
                .parse::<Hash>()
                .map_err(|e| CryptoError::InvalidProofElement {
                    index,
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Sorted-pair binary merkle tree.
///
/// This is off-line tooling for publishing a census; the registry only
/// ever sees the root. An odd node at the end of a level is promoted to
/// the next level unchanged.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] are the leaves, the last level holds the root
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a Merkle tree from leaf hashes.
    pub fn from_leaves(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self { levels: vec![] };
        }

        let mut levels = vec![leaves.to_vec()];
        while let Some(current) = levels.last() {
            if current.len() <= 1 {
                break;
            }
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => sorted_pair_hash(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two elements"),
                })
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    /// Build the tree for a whitelist of `(address, id)` claims.
    pub fn from_whitelist(entries: &[(Address, IdentityId)]) -> Self {
        let leaves: Vec<Hash> = entries
            .iter()
            .map(|(owner, id)| whitelist_leaf(owner, *id))
            .collect();
        Self::from_leaves(&leaves)
    }

    /// Get the root hash.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        if index >= leaves.len() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut current_index = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = current_index ^ 1;
            if let Some(sibling) = level.get(sibling_index) {
                siblings.push(*sibling);
            }
            current_index /= 2;
        }

        Some(MerkleProof { siblings })
    }

    /// Proof for a leaf located by value.
    pub fn proof_for_leaf(&self, leaf: &Hash) -> Option<MerkleProof> {
        let index = self.levels.first()?.iter().position(|l| l == leaf)?;
        self.proof(index)
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn whitelist(n: u8) -> Vec<(Address, IdentityId)> {
        (0..n)
            .map(|i| (Address::from_bytes([i + 1; 20]), IdentityId::new(1_000 + i as u64)))
            .collect()
    }

    #[test]
    fn test_merkle_tree_empty() {
        let tree = MerkleTree::from_leaves(&[]);
        assert_eq!(tree.root(), Hash::ZERO);
        assert!(tree.is_empty());
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn test_merkle_tree_single_leaf() {
        let leaf = Hash::compute(b"single");
        let tree = MerkleTree::from_leaves(&[leaf]);

        assert_eq!(tree.root(), leaf);
        let proof = tree.proof(0).unwrap();
        assert_eq!(proof.depth(), 0);
        assert!(proof.verify(&leaf, &tree.root()));
    }

    #[test]
    fn test_sorted_pair_is_symmetric() {
        let a = Hash::compute(b"left");
        let b = Hash::compute(b"right");
        assert_eq!(sorted_pair_hash(&a, &b), sorted_pair_hash(&b, &a));
    }

    #[test]
    fn test_odd_leaf_is_promoted() {
        let leaves: Vec<Hash> = (0..3)
            .map(|i| Hash::compute(format!("leaf{}", i).as_bytes()))
            .collect();
        let tree = MerkleTree::from_leaves(&leaves);

        let expected = sorted_pair_hash(&sorted_pair_hash(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.proof(2).unwrap().depth(), 1);
    }

    #[test]
    fn test_every_whitelisted_claim_verifies() {
        let entries = whitelist(7);
        let tree = MerkleTree::from_whitelist(&entries);
        let root = tree.root();

        for (i, (owner, id)) in entries.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(verify_whitelist(owner, *id, &proof.siblings, &root));
        }
    }

    #[test]
    fn test_wrong_claims_fail() {
        let entries = whitelist(4);
        let tree = MerkleTree::from_whitelist(&entries);
        let root = tree.root();
        let (owner, id) = entries[1];
        let proof = tree.proof(1).unwrap();

        // wrong id
        assert!(!verify_whitelist(&owner, IdentityId::new(1_111_111_190), &proof.siblings, &root));
        // wrong owner
        assert!(!verify_whitelist(&Address::ZERO, id, &proof.siblings, &root));
        // wrong root
        assert!(!verify_whitelist(&owner, id, &proof.siblings, &Hash::compute(b"wrong")));
        // truncated path
        assert!(!verify_whitelist(&owner, id, &proof.siblings[1..], &root));
    }

    #[test]
    fn test_encoded_proof_rejects_bad_lengths() {
        let entries = whitelist(4);
        let tree = MerkleTree::from_whitelist(&entries);
        let root = tree.root();
        let (owner, id) = entries[0];
        let proof = tree.proof(0).unwrap();

        let mut raw: Vec<Vec<u8>> = proof.siblings.iter().map(|h| h.as_bytes().to_vec()).collect();
        assert!(verify_encoded_whitelist(&owner, id, &raw, &root));

        raw[0].pop();
        assert!(!verify_encoded_whitelist(&owner, id, &raw, &root));
    }

    #[test]
    fn test_overlong_proof_is_rejected() {
        let owner = Address::from_bytes([1u8; 20]);
        let id = IdentityId::new(1);
        let path = vec![Hash::ZERO; MAX_PROOF_DEPTH + 1];
        let root = path
            .iter()
            .fold(whitelist_leaf(&owner, id), |acc, s| sorted_pair_hash(&acc, s));
        assert!(!verify_whitelist(&owner, id, &path, &root));
    }

    #[test]
    fn test_decode_proof() {
        let h = Hash::compute(b"sibling");
        let decoded = decode_proof(&[h.to_string()]).unwrap();
        assert_eq!(decoded, vec![h]);

        let err = decode_proof(&["0x1234"]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidProofElement { index: 0, .. }));
    }

    #[test]
    fn test_proof_for_leaf() {
        let entries = whitelist(5);
        let tree = MerkleTree::from_whitelist(&entries);
        let (owner, id) = entries[3];
        let leaf = whitelist_leaf(&owner, id);
        assert_eq!(tree.proof_for_leaf(&leaf), tree.proof(3));
        assert!(tree.proof_for_leaf(&Hash::compute(b"absent")).is_none());
    }

    proptest! {
        #[test]
        fn prop_all_leaves_verify(n in 1usize..40, pick in 0usize..40) {
            let leaves: Vec<Hash> = (0..n)
                .map(|i| Hash::compute(&(i as u64).to_be_bytes()))
                .collect();
            let tree = MerkleTree::from_leaves(&leaves);
            let index = pick % n;
            let proof = tree.proof(index).unwrap();
            prop_assert!(proof.verify(&leaves[index], &tree.root()));
        }
    }
}
