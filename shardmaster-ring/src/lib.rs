//! Consistent-hash ring with virtual nodes: chunk placement and replica
//! selection for the coordinator. See `ring::Ring` for the full contract.

mod hash;
mod ring;

pub use hash::hash_key;
pub use ring::{RebalanceSink, Ring, DEFAULT_VIRTUAL_NODES};
