//! Off-line census tooling: build a commitment and per-member proofs
//! from an allow-list.

use std::collections::HashSet;

use anyhow::Context;
use civitas_crypto::{whitelist_leaf, MerkleTree};
use civitas_types::{Address, Hash, IdentityId};
use serde::{Deserialize, Serialize};

/// One allow-list row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusEntry {
    /// Hex or bech32 address
    pub address: String,
    pub id: IdentityId,
}

/// Published census: the root plus what each member needs to claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusFile {
    pub root: Hash,
    pub members: Vec<CensusMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusMember {
    pub address: Address,
    pub id: IdentityId,
    pub leaf: Hash,
    pub proof: Vec<Hash>,
}

/// Build the tree for `entries`, in input order.
///
/// Duplicate ids are rejected: a census may admit each id once.
pub fn build_census(entries: &[CensusEntry]) -> anyhow::Result<CensusFile> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        let address: Address = entry
            .address
            .parse()
            .with_context(|| format!("Invalid address '{}' for id {}", entry.address, entry.id))?;
        if !seen.insert(entry.id) {
            anyhow::bail!("Duplicate id {} in allow-list", entry.id);
        }
        pairs.push((address, entry.id));
    }

    let tree = MerkleTree::from_whitelist(&pairs);
    let members = pairs
        .iter()
        .enumerate()
        .map(|(index, (address, id))| {
            let proof = tree
                .proof(index)
                .map(|p| p.siblings)
                .with_context(|| format!("No proof for member {}", index))?;
            Ok(CensusMember {
                address: *address,
                id: *id,
                leaf: whitelist_leaf(address, *id),
                proof,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CensusFile {
        root: tree.root(),
        members,
    })
}

impl CensusFile {
    /// Proof for `(address, id)`, if it is a member.
    pub fn proof_for(&self, address: &Address, id: IdentityId) -> Option<&[Hash]> {
        self.members
            .iter()
            .find(|m| &m.address == address && m.id == id)
            .map(|m| m.proof.as_slice())
    }
}
