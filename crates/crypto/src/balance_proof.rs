//! Historical balance proofs.
//!
//! Each finalized snapshot commits to the balances of all accounts through a
//! binary Merkle tree whose root is stored in the snapshot header:
//!
//! - Leaves are `H(0x00 || account || balance_le)`, sorted by account and
//!   padded with zero hashes to a power of two.
//! - Internal nodes are `H(0x01 || left || right)`.
//!
//! A [`BalanceProof`] carries the header, the leaf and its sibling path. The
//! verifier checks the header against the snapshot reference, then recomputes
//! the root. Any inconsistency is an error; a verifier never reports a zero
//! balance for a proof it could not check.

use std::collections::BTreeMap;

use auction_types::{Address, BalanceProof, SnapshotRef};
use sha2::{Digest, Sha256};

use crate::error::ProofError;

/// Hash used for padding leaves and for the root of an empty tree.
pub const EMPTY_HASH: [u8; 32] = [0u8; 32];

/// Longest sibling path accepted by the verifier.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Hash of a balance leaf.
pub fn leaf_hash(account: &Address, balance: u128) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(account);
    hasher.update(balance.to_le_bytes());
    hasher.finalize().into()
}

/// Hash of an internal node.
pub fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Recompute a root from a leaf, its index and the sibling path.
pub fn compute_root(
    leaf: [u8; 32],
    leaf_index: u64,
    siblings: &[[u8; 32]],
) -> Result<[u8; 32], ProofError> {
    let depth = siblings.len();
    if depth > MAX_PROOF_DEPTH {
        return Err(ProofError::PathTooLong {
            max: MAX_PROOF_DEPTH,
            got: depth,
        });
    }
    if depth < 64 && leaf_index >> depth != 0 {
        return Err(ProofError::LeafIndexOutOfRange { leaf_index, depth });
    }

    let mut current = leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        current = if (leaf_index >> level) & 1 == 0 {
            node_hash(&current, sibling)
        } else {
            node_hash(sibling, &current)
        };
    }
    Ok(current)
}

/// Merkle tree over account balances at one snapshot.
#[derive(Clone, Debug, Default)]
pub struct BalanceTree {
    accounts: Vec<(Address, u128)>,
    /// `layers[0]` holds the padded leaves, the last layer holds the root
    layers: Vec<Vec<[u8; 32]>>,
}

impl BalanceTree {
    /// Build a tree from account balances. Later entries for the same
    /// account replace earlier ones.
    pub fn build<I>(balances: I) -> Self
    where
        I: IntoIterator<Item = (Address, u128)>,
    {
        let sorted: BTreeMap<Address, u128> = balances.into_iter().collect();
        let accounts: Vec<(Address, u128)> = sorted.into_iter().collect();

        if accounts.is_empty() {
            return Self::default();
        }

        let width = accounts.len().next_power_of_two();
        let mut leaves: Vec<[u8; 32]> = accounts
            .iter()
            .map(|(account, balance)| leaf_hash(account, *balance))
            .collect();
        leaves.resize(width, EMPTY_HASH);

        let mut layers = vec![leaves];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }

        Self { accounts, layers }
    }

    /// Root committed to by the snapshot header.
    pub fn root(&self) -> [u8; 32] {
        self.layers
            .last()
            .and_then(|top| top.first().copied())
            .unwrap_or(EMPTY_HASH)
    }

    /// Number of accounts in the tree.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Balance recorded for `account`, if present.
    pub fn balance_of(&self, account: &Address) -> Option<u128> {
        self.position(account).map(|index| self.accounts[index].1)
    }

    /// Inclusion path for `account`: (leaf index, balance, siblings).
    pub fn prove(&self, account: &Address) -> Option<(u64, u128, Vec<[u8; 32]>)> {
        let index = self.position(account)?;
        let balance = self.accounts[index].1;

        let mut siblings = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut position = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            siblings.push(layer[position ^ 1]);
            position >>= 1;
        }

        Some((index as u64, balance, siblings))
    }

    fn position(&self, account: &Address) -> Option<usize> {
        self.accounts
            .binary_search_by(|(candidate, _)| candidate.cmp(account))
            .ok()
    }
}

/// Verifies that an account held a balance as of a historical snapshot.
pub trait BalanceProofVerifier {
    /// Returns the proven balance of `account` at `snapshot`.
    fn verify_balance(
        &self,
        proof: &BalanceProof,
        snapshot: &SnapshotRef,
        account: &Address,
    ) -> Result<u128, ProofError>;
}

/// Verifier for proofs produced from a [`BalanceTree`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MerkleBalanceVerifier;

impl BalanceProofVerifier for MerkleBalanceVerifier {
    fn verify_balance(
        &self,
        proof: &BalanceProof,
        snapshot: &SnapshotRef,
        account: &Address,
    ) -> Result<u128, ProofError> {
        if proof.header.hash() != *snapshot {
            return Err(ProofError::SnapshotMismatch);
        }
        if proof.account != *account {
            return Err(ProofError::AccountMismatch);
        }

        let leaf = leaf_hash(&proof.account, proof.balance);
        let root = compute_root(leaf, proof.leaf_index, &proof.siblings)?;
        if root != proof.header.state_root {
            return Err(ProofError::RootMismatch);
        }

        Ok(proof.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::SnapshotHeader;

    fn account(byte: u8) -> Address {
        [byte; 32]
    }

    fn snapshot_for(tree: &BalanceTree) -> SnapshotHeader {
        SnapshotHeader {
            number: 3,
            parent_hash: [7u8; 32],
            state_root: tree.root(),
            timestamp: 36,
        }
    }

    fn proof_for(tree: &BalanceTree, header: &SnapshotHeader, who: Address) -> BalanceProof {
        let (leaf_index, balance, siblings) = tree.prove(&who).unwrap();
        BalanceProof {
            header: header.clone(),
            account: who,
            balance,
            leaf_index,
            siblings,
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = BalanceTree::build(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.root(), EMPTY_HASH);
        assert!(tree.prove(&account(1)).is_none());
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let tree = BalanceTree::build(vec![(account(1), 10)]);
        assert_eq!(tree.root(), leaf_hash(&account(1), 10));

        let (index, balance, siblings) = tree.prove(&account(1)).unwrap();
        assert_eq!(index, 0);
        assert_eq!(balance, 10);
        assert!(siblings.is_empty());
    }

    #[test]
    fn test_every_account_verifies() {
        let balances: Vec<(Address, u128)> =
            (1..=5u8).map(|b| (account(b), b as u128 * 100)).collect();
        let tree = BalanceTree::build(balances.clone());
        let header = snapshot_for(&tree);
        let snapshot = header.hash();

        for (who, expected) in balances {
            let proof = proof_for(&tree, &header, who);
            assert_eq!(proof.siblings.len(), 3);
            let proven = MerkleBalanceVerifier
                .verify_balance(&proof, &snapshot, &who)
                .unwrap();
            assert_eq!(proven, expected);
        }
    }

    #[test]
    fn test_later_entries_replace_earlier() {
        let tree = BalanceTree::build(vec![(account(1), 10), (account(1), 25)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.balance_of(&account(1)), Some(25));
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let tree = BalanceTree::build(vec![(account(1), 10), (account(2), 20)]);
        let header = snapshot_for(&tree);
        let proof = proof_for(&tree, &header, account(1));

        let mut other = header.clone();
        other.number += 1;

        let result = MerkleBalanceVerifier.verify_balance(&proof, &other.hash(), &account(1));
        assert_eq!(result, Err(ProofError::SnapshotMismatch));
    }

    #[test]
    fn test_inflated_balance_rejected() {
        let tree = BalanceTree::build(vec![(account(1), 10), (account(2), 20)]);
        let header = snapshot_for(&tree);
        let mut proof = proof_for(&tree, &header, account(1));
        proof.balance = 1_000;

        let result = MerkleBalanceVerifier.verify_balance(&proof, &header.hash(), &account(1));
        assert_eq!(result, Err(ProofError::RootMismatch));
    }

    #[test]
    fn test_borrowed_proof_rejected() {
        let tree = BalanceTree::build(vec![(account(1), 10), (account(2), 20)]);
        let header = snapshot_for(&tree);
        let proof = proof_for(&tree, &header, account(2));

        let result = MerkleBalanceVerifier.verify_balance(&proof, &header.hash(), &account(1));
        assert_eq!(result, Err(ProofError::AccountMismatch));
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let tree = BalanceTree::build(vec![(account(1), 10), (account(2), 20)]);
        let header = snapshot_for(&tree);
        let mut proof = proof_for(&tree, &header, account(1));
        proof.leaf_index = 2;

        let result = MerkleBalanceVerifier.verify_balance(&proof, &header.hash(), &account(1));
        assert!(matches!(result, Err(ProofError::LeafIndexOutOfRange { .. })));
    }

    #[test]
    fn test_overlong_path_rejected() {
        let result = compute_root(EMPTY_HASH, 0, &vec![EMPTY_HASH; MAX_PROOF_DEPTH + 1]);
        assert!(matches!(result, Err(ProofError::PathTooLong { .. })));
    }
}
