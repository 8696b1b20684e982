//! The node model: the three node variants and their canonical RLP form.

use alloy_rlp::{Encodable, Header, PayloadView, EMPTY_STRING_CODE};
use arrayvec::ArrayVec;
use nybbles::Nibbles;

use common::{Database, Hash32};

use crate::constants::{HASH_THRESHOLD, MAX_REF};
use crate::error::{Result, TrieError};
use crate::keccak::digest_keccak;
use crate::path::{hp_decode, hp_encode};

/// Compact reference to a node: the node's RLP embedded verbatim when it is
/// shorter than 32 bytes, otherwise the RLP string of its 32-byte keccak
/// hash (`0xa0 || hash`).
#[derive(Clone, PartialEq, Eq)]
pub struct NodeRef(ArrayVec<u8, MAX_REF>);

impl NodeRef {
    /// Wraps raw reference bytes. `None` if the data exceeds 33 bytes.
    pub fn from_raw(data: &[u8]) -> Option<Self> {
        let mut arr = ArrayVec::new();
        arr.try_extend_from_slice(data).ok()?;
        Some(Self(arr))
    }

    /// Given a node's RLP, returns it inlined or as `rlp(keccak(rlp))`.
    pub fn from_rlp(rlp: &[u8]) -> Self {
        if rlp.len() < HASH_THRESHOLD {
            Self::from_raw(rlp).unwrap()
        } else {
            Self::word_rlp(&digest_keccak(rlp))
        }
    }

    /// RLP-encodes a 32-byte hash as a reference.
    pub fn word_rlp(word: &Hash32) -> Self {
        let mut arr = [0u8; MAX_REF];
        arr[0] = EMPTY_STRING_CODE + 32;
        arr[1..].copy_from_slice(word);
        Self(ArrayVec::from(arr))
    }

    /// The hash, if this reference is a hash rather than an inline node.
    pub fn as_hash(&self) -> Option<Hash32> {
        if self.0.len() == MAX_REF {
            Some(self.0[1..].try_into().unwrap())
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses one child slot of a serialized parent. The slot holds either
    /// an inline node (an RLP list, necessarily shorter than 32 bytes) or a
    /// 32-byte hash string; the two are told apart by RLP item type.
    pub fn decode_child(item: &[u8]) -> Result<Self> {
        let mut buf = item;
        match Header::decode_raw(&mut buf)
            .map_err(|_| TrieError::MalformedNode("undecodable child reference"))?
        {
            PayloadView::List(_) => {
                if item.len() >= HASH_THRESHOLD {
                    return Err(TrieError::MalformedNode("inline child of 32 bytes or more"));
                }
                Ok(Self::from_raw(item).unwrap())
            }
            PayloadView::String(payload) => {
                if payload.len() > 32 {
                    Err(TrieError::ValueTooLarge(payload.len()))
                } else if payload.len() != 32 {
                    Err(TrieError::MalformedNode("child hash is not 32 bytes"))
                } else {
                    Ok(Self::word_rlp(payload.try_into().unwrap()))
                }
            }
        }
    }

    /// Loads the referenced node, reading through the store for hash
    /// references and decoding in place for inline ones.
    pub fn load<D: Database>(&self, db: &D) -> Result<Node> {
        match self.as_hash() {
            Some(hash) => {
                let rlp = db.get(&hash)?.ok_or(TrieError::InvalidTrie(hash))?;
                Node::decode(&rlp)
            }
            None => Node::decode(self.as_slice()),
        }
    }
}

impl core::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeRef({})", hex::encode_prefixed(&self.0))
    }
}

/// A node of the trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Terminal node holding a value under the remaining key path.
    Leaf(LeafNode),
    /// A shared key segment in front of a single child.
    Extension(ExtensionNode),
    /// Sixteen-way fork, with an optional value for keys ending here.
    Branch(Box<BranchNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub path: Nibbles,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNode {
    /// Shared path segment, never empty.
    pub path: Nibbles,
    pub child: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BranchNode {
    pub children: [Option<NodeRef>; 16],
    /// Value for the key that ends at this node; empty when absent.
    pub value: Vec<u8>,
}

impl BranchNode {
    /// The only occupied child slot, if exactly one is occupied.
    pub fn sole_child(&self) -> Option<usize> {
        let mut it = self.children.iter().enumerate().filter(|(_, c)| c.is_some());
        match (it.next(), it.next()) {
            (Some((i, _)), None) => Some(i),
            _ => None,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().filter(|c| c.is_some()).count()
    }
}

impl Node {
    pub fn leaf(path: Nibbles, value: Vec<u8>) -> Self {
        Node::Leaf(LeafNode { path, value })
    }

    pub fn extension(path: Nibbles, child: NodeRef) -> Self {
        Node::Extension(ExtensionNode { path, child })
    }

    /// Canonical RLP serialization.
    ///
    /// Leaf and extension nodes are 2-item lists of the hex-prefix encoded
    /// path and the value (or child reference); a branch is a 17-item list
    /// of the sixteen child slots and the value. Child references are
    /// appended raw: an inline child's RLP list lands verbatim in the
    /// parent's payload.
    pub fn rlp(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        match self {
            Node::Leaf(leaf) => {
                let path = hp_encode(&leaf.path, true);
                let payload = path.as_slice().length() + leaf.value.as_slice().length();
                Header { list: true, payload_length: payload }.encode(&mut out);
                path.as_slice().encode(&mut out);
                leaf.value.as_slice().encode(&mut out);
            }
            Node::Extension(ext) => {
                let path = hp_encode(&ext.path, false);
                let payload = path.as_slice().length() + ext.child.len();
                Header { list: true, payload_length: payload }.encode(&mut out);
                path.as_slice().encode(&mut out);
                out.extend_from_slice(ext.child.as_slice());
            }
            Node::Branch(branch) => {
                let mut payload = branch.value.as_slice().length();
                for child in &branch.children {
                    payload += child.as_ref().map_or(1, NodeRef::len);
                }
                Header { list: true, payload_length: payload }.encode(&mut out);
                for child in &branch.children {
                    match child {
                        Some(child) => out.extend_from_slice(child.as_slice()),
                        None => out.push(EMPTY_STRING_CODE),
                    }
                }
                branch.value.as_slice().encode(&mut out);
            }
        }
        out
    }

    /// The node's reference: inline RLP below the hash threshold, 32-byte
    /// hash otherwise.
    pub fn reference(&self) -> NodeRef {
        NodeRef::from_rlp(&self.rlp())
    }

    /// Serializes the node and, when the encoding reaches the hash
    /// threshold, persists it to the store. Returns the reference a parent
    /// should embed.
    pub fn store<D: Database>(&self, db: &mut D) -> Result<NodeRef> {
        let rlp = self.rlp();
        if rlp.len() < HASH_THRESHOLD {
            Ok(NodeRef::from_raw(&rlp).unwrap())
        } else {
            let hash = digest_keccak(&rlp);
            db.put(hash, rlp)?;
            Ok(NodeRef::word_rlp(&hash))
        }
    }

    /// Decodes a node from its RLP.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let items = match Header::decode_raw(&mut buf)
            .map_err(|_| TrieError::MalformedNode("node is not valid RLP"))?
        {
            PayloadView::List(items) => items,
            PayloadView::String(_) => {
                return Err(TrieError::MalformedNode("node RLP is not a list"))
            }
        };
        match items.len() {
            2 => {
                let mut slot = items[0];
                let encoded_path = Header::decode_bytes(&mut slot, false)
                    .map_err(|_| TrieError::MalformedNode("path slot is not a string"))?;
                let (path, terminator) = hp_decode(encoded_path)?;
                if terminator {
                    let mut slot = items[1];
                    let value = Header::decode_bytes(&mut slot, false)
                        .map_err(|_| TrieError::MalformedNode("leaf value is not a string"))?;
                    Ok(Node::leaf(path, value.to_vec()))
                } else {
                    if path.is_empty() {
                        return Err(TrieError::MalformedNode("extension with empty path"));
                    }
                    Ok(Node::extension(path, NodeRef::decode_child(items[1])?))
                }
            }
            17 => {
                let mut branch = BranchNode::default();
                for (i, item) in items.iter().take(16).enumerate() {
                    if *item != [EMPTY_STRING_CODE] {
                        branch.children[i] = Some(NodeRef::decode_child(item)?);
                    }
                }
                let mut slot = items[16];
                let value = Header::decode_bytes(&mut slot, false)
                    .map_err(|_| TrieError::MalformedNode("branch value is not a string"))?;
                branch.value = value.to_vec();
                Ok(Node::Branch(Box::new(branch)))
            }
            _ => Err(TrieError::MalformedNode("node list is not 2 or 17 items")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn leaf_rlp_is_canonical() {
        // leaf for the tail of "horse" under a branch: path "orse", value "stallion"
        let leaf = Node::leaf(Nibbles::unpack(b"orse"), b"stallion".to_vec());
        assert_eq!(leaf.rlp(), hex!("cf85206f727365887374616c6c696f6e"));
    }

    #[test]
    fn short_nodes_reference_inline() {
        let leaf = Node::leaf(Nibbles::unpack(b"k"), b"v".to_vec());
        let rlp = leaf.rlp();
        assert!(rlp.len() < 32);
        assert_eq!(leaf.reference().as_slice(), &rlp[..]);
        assert_eq!(leaf.reference().as_hash(), None);
    }

    #[test]
    fn long_nodes_reference_by_hash() {
        let leaf = Node::leaf(
            Nibbles::unpack(b"key"),
            b"a value comfortably past the threshold".to_vec(),
        );
        let rlp = leaf.rlp();
        assert!(rlp.len() >= 32);
        let reference = leaf.reference();
        assert_eq!(reference.as_hash(), Some(digest_keccak(&rlp)));
        assert_eq!(reference.len(), 33);
    }

    #[test]
    fn decode_roundtrip() {
        let mut branch = BranchNode::default();
        branch.children[3] =
            Some(Node::leaf(Nibbles::unpack(b"x"), b"inline".to_vec()).reference());
        branch.children[9] = Some(NodeRef::word_rlp(&[0xab; 32]));
        branch.value = b"at-branch".to_vec();
        for node in [
            Node::leaf(Nibbles::unpack(b"dog"), b"puppy".to_vec()),
            Node::leaf(Nibbles::default(), b"value".to_vec()),
            Node::extension(
                Nibbles::from_nibbles([0x6, 0x4, 0x6]),
                NodeRef::word_rlp(&[0x11; 32]),
            ),
            Node::Branch(Box::new(branch)),
        ] {
            assert_eq!(Node::decode(&node.rlp()).unwrap(), node);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        // a 3-item list
        assert!(Node::decode(&hex!("c3010203")).is_err());
        // a bare string
        assert!(Node::decode(&hex!("80")).is_err());
        // leaf path with an invalid hex-prefix flag
        assert!(Node::decode(&hex!("c4824512C0")).is_err());
    }

    #[test]
    fn decode_rejects_bad_hash_lengths() {
        // extension whose child slot is a 31-byte string
        let mut out = Vec::new();
        let path = hp_encode(&[0x1], false);
        let child = [0x22u8; 31];
        let payload = path.as_slice().length() + child.as_slice().length();
        Header { list: true, payload_length: payload }.encode(&mut out);
        path.as_slice().encode(&mut out);
        child.as_slice().encode(&mut out);
        assert!(matches!(
            Node::decode(&out),
            Err(TrieError::MalformedNode("child hash is not 32 bytes"))
        ));

        // and a 33-byte string where a hash belongs
        let mut out = Vec::new();
        let child = [0x22u8; 33];
        let payload = path.as_slice().length() + child.as_slice().length();
        Header { list: true, payload_length: payload }.encode(&mut out);
        path.as_slice().encode(&mut out);
        child.as_slice().encode(&mut out);
        assert!(matches!(Node::decode(&out), Err(TrieError::ValueTooLarge(33))));
    }
}
