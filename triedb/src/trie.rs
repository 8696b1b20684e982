//! The database-backed trie and its structural algorithms.
//!
//! Every mutation is copy-on-write: a walk from the root rebuilds the
//! touched spine, writing replacement nodes to the store and leaving the
//! previous version intact. The store, not the in-memory graph, is the
//! source of truth; a trie instance is only a root hash and a handle.

use nybbles::Nibbles;
use tracing::trace;

use common::{Database, Hash32};

use crate::constants::{EMPTY_ROOT_HASH, EMPTY_STRING_CODE};
use crate::error::{Result, TrieError};
use crate::keccak::digest_keccak;
use crate::node::{BranchNode, Node};
use crate::path::{common_prefix, concat};

/// Whether attaching to a root checks its presence in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Skip,
    Normal,
}

/// Merkle Patricia Trie over a backing store.
///
/// The trie borrows its store for its whole lifetime and owns nothing but
/// the current root hash. A frozen root may be read concurrently if the
/// store permits it; mutation is strictly single-threaded.
pub struct Trie<'db, D: Database> {
    db: &'db mut D,
    root: Hash32,
}

impl<'db, D: Database> Trie<'db, D> {
    /// Creates a trie on `db`, initialised to the empty root.
    pub fn new(db: &'db mut D) -> Result<Self> {
        let mut trie = Trie { db, root: EMPTY_ROOT_HASH };
        trie.init()?;
        Ok(trie)
    }

    /// Attaches to an existing `root`.
    ///
    /// Under [`Verification::Normal`] the root must be present in the
    /// store; the canonical empty root is the one exception and is written
    /// on demand. Absent anything else, this fails with `RootNotFound`.
    pub fn open(db: &'db mut D, root: Hash32, verification: Verification) -> Result<Self> {
        let mut trie = Trie { db, root };
        if verification == Verification::Normal && !trie.db.contains(&trie.root)? {
            if trie.root == EMPTY_ROOT_HASH {
                trie.init()?;
            } else {
                return Err(TrieError::RootNotFound(trie.root));
            }
        }
        Ok(trie)
    }

    /// Writes the empty node and resets the root to the empty-trie hash.
    pub fn init(&mut self) -> Result<()> {
        self.db.put(EMPTY_ROOT_HASH, vec![EMPTY_STRING_CODE])?;
        self.root = EMPTY_ROOT_HASH;
        Ok(())
    }

    /// The current root hash.
    pub fn root(&self) -> Hash32 {
        self.root
    }

    /// True when the trie holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root == EMPTY_ROOT_HASH
    }

    /// True when the store does not contain the current root node.
    pub fn is_null(&self) -> Result<bool> {
        Ok(!self.db.contains(&self.root)?)
    }

    pub fn db(&self) -> &D {
        self.db
    }

    /// Mutable access to the backing store. Writes made through this bypass
    /// the trie and can leave it unreconstructable.
    pub fn db_mut(&mut self) -> &mut D {
        self.db
    }

    /// The RLP of the root node.
    pub fn root_rlp(&self) -> Result<Vec<u8>> {
        self.db
            .get(&self.root)?
            .ok_or(TrieError::RootNotFound(self.root))
    }

    fn root_node(&self) -> Result<Option<Node>> {
        if self.is_empty() {
            return Ok(None);
        }
        let rlp = self
            .db
            .get(&self.root)?
            .ok_or(TrieError::RootNotFound(self.root))?;
        Node::decode(&rlp).map(Some)
    }

    /// Fetches the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.root_node()? {
            None => Ok(None),
            Some(node) => node.get_value(self.db, &Nibbles::unpack(key)),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts `value` under `key`. An empty value removes the key.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return self.remove(key);
        }
        trace!(key = %hex::encode(key), len = value.len(), "insert");
        let path = Nibbles::unpack(key);
        let replacement = match self.root_node()? {
            None => Node::leaf(path, value.to_vec()),
            Some(node) => node.insert_into(self.db, &path, value.to_vec())?,
        };
        self.commit_root(replacement)
    }

    /// Removes `key`, if present.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        trace!(key = %hex::encode(key), "remove");
        let path = Nibbles::unpack(key);
        match self.root_node()? {
            None => Ok(()),
            Some(node) => match node.remove_from(self.db, &path)? {
                Some(replacement) => self.commit_root(replacement),
                None => self.init(),
            },
        }
    }

    // The root is stored whatever its size: external code must be able to
    // reopen the trie from the hash alone.
    fn commit_root(&mut self, node: Node) -> Result<()> {
        let rlp = node.rlp();
        let hash = digest_keccak(&rlp);
        self.db.put(hash, rlp)?;
        self.root = hash;
        trace!(root = %hex::encode(hash), "root committed");
        Ok(())
    }
}

impl<D: Database> core::fmt::Debug for Trie<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trie")
            .field("root", &hex::encode(self.root))
            .finish()
    }
}

impl Node {
    /// Walks the remaining `path` below this node.
    pub(crate) fn get_value<D: Database>(&self, db: &D, path: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Node::Leaf(leaf) => Ok((leaf.path[..] == *path).then(|| leaf.value.clone())),
            Node::Extension(ext) => {
                if path.starts_with(&ext.path) {
                    ext.child.load(db)?.get_value(db, &path[ext.path.len()..])
                } else {
                    Ok(None)
                }
            }
            Node::Branch(branch) => match path.split_first() {
                None => Ok((!branch.value.is_empty()).then(|| branch.value.clone())),
                Some((&index, rest)) => match &branch.children[index as usize] {
                    Some(child) => child.load(db)?.get_value(db, rest),
                    None => Ok(None),
                },
            },
        }
    }

    /// Inserts below this node, consuming it and returning its replacement.
    /// `value` is never empty here; empty values are routed to removal at
    /// the trie surface.
    pub(crate) fn insert_into<D: Database>(
        self,
        db: &mut D,
        path: &[u8],
        value: Vec<u8>,
    ) -> Result<Node> {
        match self {
            Node::Leaf(leaf) => {
                if leaf.path[..] == *path {
                    Ok(Node::leaf(leaf.path, value))
                } else {
                    split_leaf(db, path, value, &leaf.path, leaf.value)
                }
            }
            Node::Extension(ext) => {
                if path.starts_with(&ext.path) {
                    let replacement =
                        ext.child.load(db)?.insert_into(db, &path[ext.path.len()..], value)?;
                    Ok(Node::extension(ext.path, replacement.store(db)?))
                } else {
                    let shared = common_prefix(path, &ext.path);
                    if shared > 0 {
                        // the extension splits in two; the diverging tail
                        // recurses into the zero-prefix case below
                        let tail =
                            Node::extension(ext.path.slice(shared..), ext.child);
                        let tail = tail.insert_into(db, &path[shared..], value)?;
                        Ok(Node::extension(ext.path.slice(..shared), tail.store(db)?))
                    } else {
                        let index = ext.path[0];
                        let rest = if ext.path.len() == 1 {
                            ext.child
                        } else {
                            Node::extension(ext.path.slice(1..), ext.child).store(db)?
                        };
                        let mut branch = BranchNode::default();
                        branch.children[index as usize] = Some(rest);
                        Node::Branch(Box::new(branch)).insert_into(db, path, value)
                    }
                }
            }
            Node::Branch(mut branch) => match path.split_first() {
                None => {
                    branch.value = value;
                    Ok(Node::Branch(branch))
                }
                Some((&index, rest)) => {
                    let index = index as usize;
                    let replacement = match branch.children[index].take() {
                        None => Node::leaf(Nibbles::from_nibbles(rest), value),
                        Some(child) => child.load(db)?.insert_into(db, rest, value)?,
                    };
                    branch.children[index] = Some(replacement.store(db)?);
                    Ok(Node::Branch(branch))
                }
            },
        }
    }

    /// Removes below this node, returning the replacement, or `None` when
    /// the subtree becomes empty.
    pub(crate) fn remove_from<D: Database>(
        self,
        db: &mut D,
        path: &[u8],
    ) -> Result<Option<Node>> {
        match self {
            Node::Leaf(leaf) => {
                if leaf.path[..] == *path {
                    Ok(None)
                } else {
                    Ok(Some(Node::Leaf(leaf)))
                }
            }
            Node::Extension(ext) => {
                if !path.starts_with(&ext.path) {
                    return Ok(Some(Node::Extension(ext)));
                }
                match ext.child.load(db)?.remove_from(db, &path[ext.path.len()..])? {
                    None => Ok(None),
                    // a surviving extension or leaf fuses with this one
                    Some(Node::Extension(next)) => Ok(Some(Node::extension(
                        concat(&ext.path, &next.path),
                        next.child,
                    ))),
                    Some(Node::Leaf(leaf)) => Ok(Some(Node::leaf(
                        concat(&ext.path, &leaf.path),
                        leaf.value,
                    ))),
                    Some(branch) => {
                        Ok(Some(Node::extension(ext.path, branch.store(db)?)))
                    }
                }
            }
            Node::Branch(mut branch) => match path.split_first() {
                None => {
                    if branch.value.is_empty() {
                        Ok(Some(Node::Branch(branch)))
                    } else {
                        branch.value.clear();
                        rejig(db, *branch)
                    }
                }
                Some((&index, rest)) => {
                    let index = index as usize;
                    match branch.children[index].take() {
                        None => Ok(Some(Node::Branch(branch))),
                        Some(child) => {
                            branch.children[index] = child
                                .load(db)?
                                .remove_from(db, rest)?
                                .map(|node| node.store(db))
                                .transpose()?;
                            rejig(db, *branch)
                        }
                    }
                }
            },
        }
    }
}

/// Restores the branch invariants after a removal underneath.
fn rejig<D: Database>(db: &mut D, branch: BranchNode) -> Result<Option<Node>> {
    match (branch.child_count(), branch.value.is_empty()) {
        (0, true) => Ok(None),
        (0, false) => Ok(Some(Node::leaf(Nibbles::default(), branch.value))),
        (1, true) => {
            // a lone child is pulled up into its parent slot
            let sole = branch.sole_child().unwrap();
            let child = branch.children[sole].as_ref().unwrap();
            let prefix = [sole as u8];
            match child.load(db)? {
                Node::Branch(_) => Ok(Some(Node::extension(
                    Nibbles::from_nibbles(prefix),
                    child.clone(),
                ))),
                Node::Extension(ext) => Ok(Some(Node::extension(
                    concat(&prefix, &ext.path),
                    ext.child,
                ))),
                Node::Leaf(leaf) => Ok(Some(Node::leaf(concat(&prefix, &leaf.path), leaf.value))),
            }
        }
        _ => Ok(Some(Node::Branch(Box::new(branch)))),
    }
}

/// Builds the subtree replacing a leaf whose path diverges from an inserted
/// key: a branch over the two suffixes, behind an extension when they share
/// a prefix. A suffix that ends at the split point parks its value on the
/// branch itself.
fn split_leaf<D: Database>(
    db: &mut D,
    key: &[u8],
    value: Vec<u8>,
    leaf_path: &[u8],
    leaf_value: Vec<u8>,
) -> Result<Node> {
    let shared = common_prefix(key, leaf_path);
    let mut branch = BranchNode::default();

    if key.len() == shared {
        branch.value = value;
        let tail = Node::leaf(Nibbles::from_nibbles(&leaf_path[shared + 1..]), leaf_value);
        branch.children[leaf_path[shared] as usize] = Some(tail.store(db)?);
    } else if leaf_path.len() == shared {
        branch.value = leaf_value;
        let tail = Node::leaf(Nibbles::from_nibbles(&key[shared + 1..]), value);
        branch.children[key[shared] as usize] = Some(tail.store(db)?);
    } else {
        let new = Node::leaf(Nibbles::from_nibbles(&key[shared + 1..]), value);
        branch.children[key[shared] as usize] = Some(new.store(db)?);
        let old = Node::leaf(Nibbles::from_nibbles(&leaf_path[shared + 1..]), leaf_value);
        branch.children[leaf_path[shared] as usize] = Some(old.store(db)?);
    }

    let branch = Node::Branch(Box::new(branch));
    if shared > 0 {
        Ok(Node::extension(
            Nibbles::from_nibbles(&key[..shared]),
            branch.store(db)?,
        ))
    } else {
        Ok(branch)
    }
}
