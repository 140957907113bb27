//! Commitment and proof primitives for lowest-unique-bid auctions.
//!
//! # Overview
//!
//! 1. **Escrow derivation**: a bid is committed by funding an address derived
//!    from `(engine, asset, generation, bidder, value, salt)`. Nothing about
//!    the value leaks until the bidder reveals the salt.
//!
//! 2. **Balance proofs**: after the first reveal fixes a collateralization
//!    deadline, later bidders prove their escrow balance as of that snapshot
//!    with a Merkle inclusion proof against the snapshot's state root.

pub mod balance_proof;
pub mod error;
pub mod escrow;

pub use balance_proof::{BalanceProofVerifier, BalanceTree, MerkleBalanceVerifier};
pub use error::ProofError;
pub use escrow::{derive_escrow_address, EscrowTuple};
