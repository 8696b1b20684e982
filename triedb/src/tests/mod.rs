mod iteration;

use hex_literal::hex;

use common::{Database, Hash32, MemoryDB};

use crate::node::Node;
use crate::trie::Trie;

pub(crate) const FOUR_PAIRS: [(&[u8], &[u8]); 4] = [
    (b"dog", b"puppy"),
    (b"horse", b"stallion"),
    (b"do", b"verb"),
    (b"doge", b"coin"),
];

pub(crate) const FOUR_PAIR_ROOT: Hash32 =
    hex!("5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84");

pub(crate) const FOUR_PAIR_ROOT_HASHED: Hash32 =
    hex!("29b235a58c3c25ab83010c327d5932bcf05324b7d6b1185e650798034783ca9d");

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub(crate) fn populated<'db>(
    db: &'db mut MemoryDB,
    pairs: &[(&[u8], &[u8])],
) -> Trie<'db, MemoryDB> {
    let mut trie = Trie::new(db).unwrap();
    for (key, value) in pairs {
        trie.insert(key, value).unwrap();
    }
    trie
}

/// Walks every node reachable from `root` and checks the inline/hash
/// threshold: hash-referenced nodes are stored and at least 32 bytes,
/// inline ones are shorter and absent from the store namespace.
pub(crate) fn audit_references(db: &MemoryDB, root: Hash32) {
    let rlp = db.get(&root).unwrap().expect("root must always be stored");
    audit_node(db, &rlp);
}

fn audit_node(db: &MemoryDB, rlp: &[u8]) {
    if rlp == [0x80] {
        return;
    }
    let node = Node::decode(rlp).unwrap();
    let children = match &node {
        Node::Leaf(_) => Vec::new(),
        Node::Extension(ext) => vec![ext.child.clone()],
        Node::Branch(branch) => branch.children.iter().flatten().cloned().collect(),
    };
    for child in children {
        match child.as_hash() {
            Some(hash) => {
                let child_rlp = db
                    .get(&hash)
                    .unwrap()
                    .expect("hash-referenced child must be stored");
                assert!(child_rlp.len() >= 32);
                audit_node(db, &child_rlp);
            }
            None => {
                assert!(child.len() < 32);
                audit_node(db, child.as_slice());
            }
        }
    }
}
