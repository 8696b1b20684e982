//! Merkle Patricia Trie: an authenticated key-value map over a
//! content-addressed backing store.
//!
//! The trie stores arbitrary byte-string keys and values; its root is a
//! 256-bit digest that uniquely identifies the entire contents. Nodes are
//! RLP encoded and addressed in the store by the keccak-256 hash of their
//! encoding, with sub-32-byte nodes embedded verbatim inside their parent.

pub mod constants;
pub mod error;
pub mod iter;
pub mod keccak;
pub mod node;
pub mod path;
pub mod secure;
pub mod trie;

#[cfg(test)]
mod tests;

pub use common::{Database, Hash32, MemoryDB, StoreError};
pub use error::TrieError;
pub use iter::TrieIterator;
pub use secure::{FatTrie, HashedTrie};
pub use trie::{Trie, Verification};
