use common::{Hash32, StoreError};

/// Failure modes of trie operations.
///
/// Mutations are not atomic under failure: if the store rejects a write
/// partway through an insert or remove, the trie's root is unspecified and
/// callers needing atomicity must wrap operations in a store transaction.
#[derive(Debug, thiserror::Error)]
pub enum TrieError {
    /// The requested root is not present in the backing store.
    #[error("root {} not found in the backing store", hex::encode(.0))]
    RootNotFound(Hash32),

    /// A node failed to decode: not a 2- or 17-item list, bad hex-prefix
    /// flag, or an invalid child reference.
    #[error("malformed node: {0}")]
    MalformedNode(&'static str),

    /// A hash referenced by an interior node is absent from the store.
    #[error("invalid trie: referenced node {} is missing", hex::encode(.0))]
    InvalidTrie(Hash32),

    /// A byte string longer than 32 bytes where a hash was expected.
    #[error("{0}-byte string where a 32-byte hash was expected")]
    ValueTooLarge(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = TrieError> = core::result::Result<T, E>;
