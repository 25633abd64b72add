//! The ring's hash reduction.
//!
//! MD5-over-UTF-8, the full 128-bit digest read as a big-endian unsigned
//! integer — the exact reduction `original_source/coordinator/consistent_hash.py`
//! performs via `int(hashlib.md5(key.encode("utf-8")).hexdigest(), 16)`.
//! MD5 is used for cross-implementation compatibility, not as a security
//! property; any uniform 64+ bit hash would satisfy the ring's invariants,
//! but the exact reduction (full 128 bits, big-endian) must match for two
//! deployments to agree on placement for the same inputs.

use digest::Digest;
use md5::Md5;

pub fn hash_key(key: &str) -> u128 {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    let digest: [u8; 16] = hasher.finalize().into();
    u128::from_be_bytes(digest)
}

/// The virtual-node key for a physical server: `{server_id}_{i}`.
pub fn virtual_node_key(server_id: &str, i: usize) -> String {
    format!("{server_id}_{i}")
}
