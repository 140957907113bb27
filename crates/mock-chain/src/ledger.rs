//! In-memory host ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use auction_crypto::BalanceTree;
use auction_module::{AssetRegistry, ChainHistory, FundsLedger, HostError};
use auction_types::{Address, AssetKey, BalanceProof, SnapshotHeader, SnapshotRef};
use tracing::debug;

/// Balances, asset ownership and finalized block history.
///
/// Every finalized header commits to a Merkle tree of all balances at that
/// block, so any account's balance can later be proven against the header
/// hash.
#[derive(Clone, Debug)]
pub struct MockLedger {
    balances: BTreeMap<Address, u128>,
    owners: BTreeMap<AssetKey, Address>,
    /// (owner, operator) pairs
    approvals: BTreeSet<(Address, Address)>,
    headers: Vec<SnapshotHeader>,
    snapshots: HashMap<SnapshotRef, BalanceTree>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MockLedger {
    /// Create a ledger with a finalized genesis block.
    pub fn new(genesis_timestamp: u64) -> Self {
        let mut ledger = Self {
            balances: BTreeMap::new(),
            owners: BTreeMap::new(),
            approvals: BTreeSet::new(),
            headers: Vec::new(),
            snapshots: HashMap::new(),
        };
        ledger.finalize_block(genesis_timestamp);
        ledger
    }

    /// Create `asset` owned by `owner`. Returns false if it already exists.
    pub fn mint_asset(&mut self, asset: AssetKey, owner: Address) -> bool {
        if self.owners.contains_key(&asset) {
            return false;
        }
        self.owners.insert(asset, owner);
        true
    }

    pub fn owner(&self, asset: &AssetKey) -> Option<Address> {
        self.owners.get(asset).copied()
    }

    /// Grant or revoke `operator` the right to move all of `owner`'s assets.
    pub fn set_approval_for_all(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.approvals.insert((owner, operator));
        } else {
            self.approvals.remove(&(owner, operator));
        }
    }

    pub fn is_approved(&self, owner: &Address, operator: &Address) -> bool {
        self.approvals.contains(&(*owner, *operator))
    }

    /// Credit `amount` to `account` out of thin air.
    pub fn deposit(&mut self, account: Address, amount: u128) {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Finalize a block over the current balances.
    pub fn finalize_block(&mut self, timestamp: u64) -> SnapshotRef {
        let tree = BalanceTree::build(self.balances.iter().map(|(a, b)| (*a, *b)));
        let parent_hash = self.headers.last().map(|h| h.hash()).unwrap_or([0u8; 32]);
        let header = SnapshotHeader {
            number: self.headers.len() as u64,
            parent_hash,
            state_root: tree.root(),
            timestamp,
        };
        let hash = header.hash();

        debug!(
            number = header.number,
            accounts = tree.len(),
            hash = hex::encode(hash),
            "Finalized block"
        );

        self.headers.push(header);
        self.snapshots.insert(hash, tree);
        hash
    }

    pub fn latest_header(&self) -> Option<&SnapshotHeader> {
        self.headers.last()
    }

    pub fn header(&self, snapshot: &SnapshotRef) -> Option<&SnapshotHeader> {
        self.headers.iter().rev().find(|h| h.hash() == *snapshot)
    }

    /// Prove `account`'s balance at `snapshot`.
    ///
    /// Returns `None` for unknown snapshots and for accounts that held nothing
    /// at that block.
    pub fn prove_balance(&self, snapshot: &SnapshotRef, account: &Address) -> Option<BalanceProof> {
        let header = self.header(snapshot)?.clone();
        let (leaf_index, balance, siblings) = self.snapshots.get(snapshot)?.prove(account)?;
        Some(BalanceProof {
            header,
            account: *account,
            balance,
            leaf_index,
            siblings,
        })
    }
}

impl AssetRegistry for MockLedger {
    fn owner_of(&self, asset: &AssetKey) -> Option<Address> {
        self.owner(asset)
    }

    fn transfer_asset(
        &mut self,
        operator: &Address,
        from: &Address,
        to: &Address,
        asset: &AssetKey,
    ) -> Result<(), HostError> {
        let owner = self
            .owner(asset)
            .ok_or(HostError::AssetNotFound(*asset))?;
        if owner != *from {
            return Err(HostError::NotOwner);
        }
        if operator != from && !self.is_approved(from, operator) {
            return Err(HostError::NotAuthorized);
        }
        self.owners.insert(*asset, *to);
        Ok(())
    }
}

impl FundsLedger for MockLedger {
    fn balance_of(&self, account: &Address) -> u128 {
        self.balance(account)
    }

    fn transfer_funds(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), HostError> {
        let available = self.balance(from);
        if available < amount {
            return Err(HostError::InsufficientFunds {
                account: hex::encode(from),
                needed: amount,
                available,
            });
        }
        if available == amount {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, available - amount);
        }
        self.deposit(*to, amount);
        Ok(())
    }
}

impl ChainHistory for MockLedger {
    fn latest_finalized_block_hash(&self) -> SnapshotRef {
        self.latest_header().map(|h| h.hash()).unwrap_or([0u8; 32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::{BalanceProofVerifier, MerkleBalanceVerifier};

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    #[test]
    fn test_transfer_funds() {
        let mut ledger = MockLedger::new(0);
        ledger.deposit(ALICE, 100);

        ledger.transfer_funds(&ALICE, &BOB, 40).unwrap();
        assert_eq!(ledger.balance(&ALICE), 60);
        assert_eq!(ledger.balance(&BOB), 40);

        let err = ledger.transfer_funds(&ALICE, &BOB, 61).unwrap_err();
        assert!(matches!(err, HostError::InsufficientFunds { needed: 61, available: 60, .. }));
    }

    #[test]
    fn test_asset_transfer_authorization() {
        let mut ledger = MockLedger::new(0);
        let asset = AssetKey::new([7u8; 32], 1);
        assert!(ledger.mint_asset(asset, ALICE));
        assert!(!ledger.mint_asset(asset, BOB));

        assert_eq!(
            ledger.transfer_asset(&BOB, &ALICE, &BOB, &asset),
            Err(HostError::NotAuthorized)
        );
        assert_eq!(
            ledger.transfer_asset(&BOB, &BOB, &ALICE, &asset),
            Err(HostError::NotOwner)
        );

        ledger.set_approval_for_all(ALICE, BOB, true);
        ledger.transfer_asset(&BOB, &ALICE, &BOB, &asset).unwrap();
        assert_eq!(ledger.owner(&asset), Some(BOB));
    }

    #[test]
    fn test_snapshot_proofs() {
        let mut ledger = MockLedger::new(0);
        ledger.deposit(ALICE, 100);
        let first = ledger.finalize_block(12);
        ledger.deposit(BOB, 50);
        let second = ledger.finalize_block(24);

        assert_eq!(ledger.latest_finalized_block_hash(), second);
        assert!(ledger.prove_balance(&first, &BOB).is_none());

        let proof = ledger.prove_balance(&first, &ALICE).unwrap();
        assert_eq!(
            MerkleBalanceVerifier.verify_balance(&proof, &first, &ALICE),
            Ok(100)
        );
        assert!(MerkleBalanceVerifier
            .verify_balance(&proof, &second, &ALICE)
            .is_err());

        let header = ledger.header(&second).unwrap();
        assert_eq!(header.parent_hash, first);
        assert_eq!(header.number, 2);
    }
}
