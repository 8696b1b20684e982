// Keccak-256, the hash function addressing every node in the store.

use tiny_keccak::{Hasher, Keccak};

/// Computes the Keccak-256 hash of the input bytes.
pub fn digest_keccak(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    output
}
