//! In-memory host used by the module's unit tests.

use std::collections::{HashMap, HashSet};

use auction_crypto::BalanceTree;
use auction_types::{Address, AssetKey, BalanceProof, SnapshotHeader, SnapshotRef};

use crate::host::{AssetRegistry, ChainHistory, FundsLedger, HostError};

#[derive(Default)]
pub struct TestHost {
    pub balances: HashMap<Address, u128>,
    pub owners: HashMap<AssetKey, Address>,
    pub approvals: HashSet<(Address, Address)>,
    pub headers: Vec<SnapshotHeader>,
    trees: HashMap<SnapshotRef, BalanceTree>,
}

impl TestHost {
    pub fn new() -> Self {
        let mut host = Self::default();
        host.finalize_block();
        host
    }

    pub fn mint(&mut self, asset: AssetKey, owner: Address) {
        self.owners.insert(asset, owner);
    }

    pub fn fund(&mut self, account: Address, amount: u128) {
        *self.balances.entry(account).or_insert(0) += amount;
    }

    pub fn balance(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Commit current balances to a new finalized header.
    pub fn finalize_block(&mut self) -> SnapshotRef {
        let tree = BalanceTree::build(self.balances.iter().map(|(a, b)| (*a, *b)));
        let parent_hash = self.headers.last().map(|h| h.hash()).unwrap_or([0u8; 32]);
        let header = SnapshotHeader {
            number: self.headers.len() as u64,
            parent_hash,
            state_root: tree.root(),
            timestamp: 0,
        };
        let hash = header.hash();
        self.headers.push(header);
        self.trees.insert(hash, tree);
        hash
    }

    pub fn prove(&self, snapshot: &SnapshotRef, account: &Address) -> Option<BalanceProof> {
        let header = self.headers.iter().find(|h| h.hash() == *snapshot)?.clone();
        let (leaf_index, balance, siblings) = self.trees.get(snapshot)?.prove(account)?;
        Some(BalanceProof {
            header,
            account: *account,
            balance,
            leaf_index,
            siblings,
        })
    }
}

impl AssetRegistry for TestHost {
    fn owner_of(&self, asset: &AssetKey) -> Option<Address> {
        self.owners.get(asset).copied()
    }

    fn transfer_asset(
        &mut self,
        operator: &Address,
        from: &Address,
        to: &Address,
        asset: &AssetKey,
    ) -> Result<(), HostError> {
        let owner = self
            .owners
            .get(asset)
            .copied()
            .ok_or(HostError::AssetNotFound(*asset))?;
        if owner != *from {
            return Err(HostError::NotOwner);
        }
        if operator != from && !self.approvals.contains(&(owner, *operator)) {
            return Err(HostError::NotAuthorized);
        }
        self.owners.insert(*asset, *to);
        Ok(())
    }
}

impl FundsLedger for TestHost {
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
        self.balances.insert(*from, available - amount);
        self.fund(*to, amount);
        Ok(())
    }
}

impl ChainHistory for TestHost {
    fn latest_finalized_block_hash(&self) -> SnapshotRef {
        self.headers.last().map(|h| h.hash()).unwrap_or([0u8; 32])
    }
}
