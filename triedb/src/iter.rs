//! Ordered lazy iteration over a database-backed trie.
//!
//! The iterator keeps a trail of frames, one per node on the path from the
//! root to the current position. Each frame records the node's RLP, the
//! path accumulated from the root, and a child cursor that walks the
//! sentinel sequence `entering(255) -> at-value(16) -> child(0..15) ->
//! exiting(17)`. Two iterators are equal when their trails are equal; the
//! end iterator has an empty trail.

use nybbles::Nibbles;

use common::Database;

use crate::error::{Result, TrieError};
use crate::node::{Node, NodeRef};
use crate::path::concat;
use crate::trie::Trie;

const ENTERING: u8 = 255;
const AT_VALUE: u8 = 16;
const EXITING: u8 = 17;

#[derive(Clone)]
struct Crumb {
    rlp: Vec<u8>,
    node: Node,
    /// Path accumulated from the root, including this node's own segment.
    path: Nibbles,
    cursor: u8,
}

impl Crumb {
    fn advance(&mut self) {
        self.cursor = match (self.cursor, &self.node) {
            (ENTERING, _) => AT_VALUE,
            (AT_VALUE, Node::Branch(_)) => 0,
            (cursor @ 0..=14, Node::Branch(_)) => cursor + 1,
            _ => EXITING,
        };
    }
}

impl PartialEq for Crumb {
    fn eq(&self, other: &Self) -> bool {
        self.rlp == other.rlp && self.path == other.path && self.cursor == other.cursor
    }
}

/// Lexicographic `(key, value)` cursor over a trie.
pub struct TrieIterator<'a, 'db, D: Database> {
    trie: &'a Trie<'db, D>,
    trail: Vec<Crumb>,
}

enum Step {
    Emit(Vec<u8>, Vec<u8>),
    Descend(NodeRef, Nibbles),
    Pop,
    Nothing,
}

impl<'a, 'db, D: Database> TrieIterator<'a, 'db, D> {
    pub(crate) fn trie(&self) -> &'a Trie<'db, D> {
        self.trie
    }

    /// True once the trail is exhausted.
    pub fn is_end(&self) -> bool {
        self.trail.is_empty()
    }

    fn push_frame(&mut self, rlp: Vec<u8>, mut path: Nibbles) -> Result<()> {
        let node = Node::decode(&rlp)?;
        match &node {
            Node::Leaf(leaf) => path = concat(&path, &leaf.path),
            Node::Extension(ext) => path = concat(&path, &ext.path),
            Node::Branch(_) => {}
        }
        self.trail.push(Crumb { rlp, node, path, cursor: ENTERING });
        Ok(())
    }

    fn descend(&mut self, child: NodeRef, path: Nibbles) -> Result<()> {
        let rlp = match child.as_hash() {
            Some(hash) => self
                .trie
                .db()
                .get(&hash)?
                .ok_or(TrieError::InvalidTrie(hash))?,
            None => child.as_slice().to_vec(),
        };
        self.push_frame(rlp, path)
    }

    fn next_pair(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let step = {
                let Some(top) = self.trail.last_mut() else {
                    return Ok(None);
                };
                top.advance();
                match top.cursor {
                    AT_VALUE => match &top.node {
                        Node::Leaf(leaf) => {
                            Step::Emit(key_bytes(&top.path), leaf.value.clone())
                        }
                        Node::Branch(branch) if !branch.value.is_empty() => {
                            Step::Emit(key_bytes(&top.path), branch.value.clone())
                        }
                        Node::Extension(ext) => {
                            Step::Descend(ext.child.clone(), top.path.clone())
                        }
                        Node::Branch(_) => Step::Nothing,
                    },
                    EXITING => Step::Pop,
                    index @ 0..=15 => match &top.node {
                        Node::Branch(branch) => match &branch.children[index as usize] {
                            Some(child) => {
                                let mut path = top.path.clone();
                                path.push(index);
                                Step::Descend(child.clone(), path)
                            }
                            None => Step::Nothing,
                        },
                        _ => unreachable!("child cursor on a non-branch node"),
                    },
                    _ => unreachable!("iterator cursor out of sequence"),
                }
            };
            match step {
                Step::Emit(key, value) => return Ok(Some((key, value))),
                Step::Descend(child, path) => self.descend(child, path)?,
                Step::Pop => {
                    self.trail.pop();
                }
                Step::Nothing => {}
            }
        }
    }

    /// Advances until the accumulated key is >= `key`.
    fn seek(&mut self, key: &[u8]) -> Result<()> {
        loop {
            let checkpoint = self.trail.clone();
            match self.next_pair()? {
                None => return Ok(()),
                Some((emitted, _)) if emitted.as_slice() >= key => {
                    self.trail = checkpoint;
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }
}

impl<D: Database> Iterator for TrieIterator<'_, '_, D> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().transpose()
    }
}

impl<D: Database> PartialEq for TrieIterator<'_, '_, D> {
    fn eq(&self, other: &Self) -> bool {
        self.trail == other.trail
    }
}

fn key_bytes(path: &Nibbles) -> Vec<u8> {
    // emission only happens where a whole key has been consumed
    assert!(path.len() % 2 == 0, "emitted key has a dangling nibble");
    path.pack().to_vec()
}

impl<'db, D: Database> Trie<'db, D> {
    /// Iterator over all `(key, value)` pairs in key order.
    pub fn iter(&self) -> Result<TrieIterator<'_, 'db, D>> {
        let mut iter = TrieIterator { trie: self, trail: Vec::new() };
        if !self.is_empty() {
            let rlp = self.root_rlp()?;
            iter.push_frame(rlp, Nibbles::default())?;
        }
        Ok(iter)
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn lower_bound(&self, key: &[u8]) -> Result<TrieIterator<'_, 'db, D>> {
        let mut iter = self.iter()?;
        iter.seek(key)?;
        Ok(iter)
    }

    /// The past-the-end iterator.
    pub fn end(&self) -> TrieIterator<'_, 'db, D> {
        TrieIterator { trie: self, trail: Vec::new() }
    }
}
