//! Error types for escrow and proof operations.

use thiserror::Error;

/// Errors raised while verifying a balance proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("Proof header does not match the snapshot reference")]
    SnapshotMismatch,

    #[error("Proof is for a different account")]
    AccountMismatch,

    #[error("Recomputed state root does not match the header")]
    RootMismatch,

    #[error("Leaf index {leaf_index} out of range for depth {depth}")]
    LeafIndexOutOfRange { leaf_index: u64, depth: usize },

    #[error("Sibling path too long: max {max}, got {got}")]
    PathTooLong { max: usize, got: usize },
}
