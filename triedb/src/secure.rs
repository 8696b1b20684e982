//! Key-hashing trie wrappers.
//!
//! Both wrappers rewrite every operation onto `keccak(key)`, bounding path
//! depth and hiding key material from the node layout. The plain hashed
//! form loses iteration; the fat form keeps a `hash -> key` side map in the
//! store so iteration can restore plaintext keys.

use common::{Database, Hash32};

use crate::error::{Result, TrieError};
use crate::iter::TrieIterator;
use crate::keccak::digest_keccak;
use crate::trie::{Trie, Verification};

/// Trie whose keys are hashed before every operation.
pub struct HashedTrie<'db, D: Database> {
    inner: Trie<'db, D>,
}

impl<'db, D: Database> HashedTrie<'db, D> {
    pub fn new(db: &'db mut D) -> Result<Self> {
        Ok(Self { inner: Trie::new(db)? })
    }

    pub fn open(db: &'db mut D, root: Hash32, verification: Verification) -> Result<Self> {
        Ok(Self { inner: Trie::open(db, root, verification)? })
    }

    pub fn root(&self) -> Hash32 {
        self.inner.root()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&digest_keccak(key))
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.inner.contains(&digest_keccak(key))
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.insert(&digest_keccak(key), value)
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.inner.remove(&digest_keccak(key))
    }

    /// Hashing destroys the plaintext keys, so iteration yields nothing.
    pub fn iter(&self) -> std::iter::Empty<Result<(Vec<u8>, Vec<u8>)>> {
        std::iter::empty()
    }
}

/// Hashed trie that additionally records `hash(key) -> key` in the store's
/// auxiliary map, keeping iteration over plaintext keys possible.
pub struct FatTrie<'db, D: Database> {
    inner: Trie<'db, D>,
}

impl<'db, D: Database> FatTrie<'db, D> {
    pub fn new(db: &'db mut D) -> Result<Self> {
        Ok(Self { inner: Trie::new(db)? })
    }

    pub fn open(db: &'db mut D, root: Hash32, verification: Verification) -> Result<Self> {
        Ok(Self { inner: Trie::open(db, root, verification)? })
    }

    pub fn root(&self) -> Hash32 {
        self.inner.root()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&digest_keccak(key))
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.inner.contains(&digest_keccak(key))
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return self.remove(key);
        }
        let hashed = digest_keccak(key);
        self.inner.insert(&hashed, value)?;
        self.inner.db_mut().insert_aux(&hashed, key)?;
        Ok(())
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.inner.remove(&digest_keccak(key))
    }

    /// Iterator over `(plaintext key, value)` pairs, restored through the
    /// auxiliary map.
    pub fn iter(&self) -> Result<FatTrieIterator<'_, 'db, D>> {
        Ok(FatTrieIterator { inner: self.inner.iter()? })
    }
}

pub struct FatTrieIterator<'a, 'db, D: Database> {
    inner: TrieIterator<'a, 'db, D>,
}

impl<D: Database> FatTrieIterator<'_, '_, D> {
    fn restore_key(&self, hashed: &[u8]) -> Result<Vec<u8>> {
        if let Some(key) = self.inner.trie().db().lookup_aux(hashed)? {
            return Ok(key);
        }
        let hash: Hash32 = hashed
            .try_into()
            .map_err(|_| TrieError::MalformedNode("fat trie key is not a hash"))?;
        Err(TrieError::InvalidTrie(hash))
    }
}

impl<D: Database> Iterator for FatTrieIterator<'_, '_, D> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (hashed, value) = match self.inner.next()? {
            Ok(pair) => pair,
            Err(err) => return Some(Err(err)),
        };
        Some(self.restore_key(&hashed).map(|key| (key, value)))
    }
}
