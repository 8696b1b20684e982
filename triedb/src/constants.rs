use common::Hash32;

/// RLP encoding of the empty byte string, also an empty child slot.
pub const EMPTY_STRING_CODE: u8 = 0x80;

/// Nodes whose RLP is at least this long are stored under their hash;
/// shorter ones are embedded verbatim in their parent.
pub const HASH_THRESHOLD: usize = 32;

/// Max byte length of a node reference: inline RLP (< 32) or `0xa0 || hash`.
pub const MAX_REF: usize = 33;

// Hex-prefix flag nibbles, stored in the high nibble of the first byte.
pub const EXTENSION_EVEN_FLAG: u8 = 0x00;
pub const EXTENSION_ODD_FLAG: u8 = 0x10;
pub const LEAF_EVEN_FLAG: u8 = 0x20;
pub const LEAF_ODD_FLAG: u8 = 0x30;

/// `keccak256(rlp(""))`, the root of an empty trie.
pub const EMPTY_ROOT_HASH: Hash32 = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
];
