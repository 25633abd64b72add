//! Consistent-hash ring with virtual nodes.
//!
//! The Ring is a pure placement structure: it knows which physical server
//! owns which hash points and can select replica sets, but it never stores
//! a `Server`'s chunk set directly (that would recreate the Server↔Chunk
//! ownership cycle design note 9 resolves by making Placement authoritative).
//! Callers hand the ring a way to read a server's currently-held chunks and
//! a callback to apply migration/redistribution side effects; the ring's
//! own state is just `hash -> ServerId` plus the set of physical servers
//! currently present.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use shardmaster_core::{ChunkHandle, ServerId};
use tracing::debug;

use crate::hash::{hash_key, virtual_node_key};

/// Default virtual nodes per server, matching spec.md's `V = 20`.
pub const DEFAULT_VIRTUAL_NODES: usize = 20;

#[derive(Debug)]
pub struct Ring {
    virtual_nodes: usize,
    ring: BTreeMap<u128, ServerId>,
    physical: BTreeSet<ServerId>,
}

impl Ring {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes,
            ring: BTreeMap::new(),
            physical: BTreeSet::new(),
        }
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    /// Hash reduction used by the ring; exposed so placement can compute a
    /// chunk's hash for logging or testing without re-deriving it.
    pub fn hash(key: &str) -> u128 {
        hash_key(key)
    }

    pub fn contains_server(&self, id: &ServerId) -> bool {
        self.physical.contains(id)
    }

    pub fn physical_servers(&self) -> impl Iterator<Item = &ServerId> {
        self.physical.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// First vnode hash strictly less than `h`, wrapping to the ring's
    /// highest hash if `h` is less than or equal to every entry.
    pub fn predecessor(&self, h: u128) -> Option<ServerId> {
        self.ring
            .range(..h)
            .next_back()
            .or_else(|| self.ring.iter().next_back())
            .map(|(_, id)| id.clone())
    }

    /// First vnode hash strictly greater than `h`, wrapping to the ring's
    /// lowest hash if `h` is greater than or equal to every entry.
    pub fn successor(&self, h: u128) -> Option<ServerId> {
        self.ring
            .range((Bound::Excluded(h), Bound::Unbounded))
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, id)| id.clone())
    }

    /// Up to `n` distinct physical servers for `key`, scanning clockwise
    /// from the first vnode hash greater than `hash(key)` and wrapping at
    /// most once. Returns `n` `None`s if the ring is empty (the external
    /// contract preserves positional slots); otherwise returns fewer than
    /// `n` entries when fewer than `n` distinct physical servers exist.
    pub fn replicas(&self, key: &str, n: usize) -> Vec<Option<ServerId>> {
        if self.ring.is_empty() {
            return vec![None; n];
        }

        let h = hash_key(key);
        let after = self.ring.range((Bound::Excluded(h), Bound::Unbounded));
        let wrapped = self.ring.range(..=h);

        let mut seen = BTreeSet::new();
        let mut result = Vec::with_capacity(n);
        for (_, id) in after.chain(wrapped) {
            if seen.insert(id.clone()) {
                result.push(Some(id.clone()));
                if result.len() == n {
                    break;
                }
            }
        }
        result
    }

    /// Adds `server_id`'s virtual nodes to the ring, migrating chunks whose
    /// ownership boundary crosses a new vnode from the vnode's predecessor.
    ///
    /// `sink.held_chunks` must reflect the *live* state of a server's chunk
    /// set: each vnode's migration sweep can shrink the predecessor's chunk
    /// set, and later vnodes in the same call must see that shrinkage. A
    /// single sink (rather than two independent closures) is what lets the
    /// caller give it mutable access to both Membership and Placement
    /// without fighting the borrow checker over two simultaneous `&mut`s
    /// into the same state.
    pub fn add(&mut self, server_id: ServerId, sink: &mut impl RebalanceSink) {
        debug!(server = %server_id, "adding server to ring");

        let mut new_hashes = Vec::with_capacity(self.virtual_nodes);
        for i in 0..self.virtual_nodes {
            let vnode_hash = hash_key(&virtual_node_key(server_id.as_str(), i));
            new_hashes.push(vnode_hash);

            let Some(predecessor) = self.predecessor(vnode_hash) else {
                continue;
            };
            if predecessor == server_id {
                // Ring holds only this server's own (not-yet-inserted) vnodes
                // as candidates only after insertion; during the sweep this
                // can't happen, but guard defensively against re-entrant adds.
                continue;
            }

            let affected: Vec<ChunkHandle> = sink
                .held_chunks(&predecessor)
                .into_iter()
                .filter(|chunk| hash_key(chunk.as_str()) <= vnode_hash)
                .collect();

            for chunk in affected {
                sink.migrate(&predecessor, &server_id, &chunk);
            }
        }

        for vnode_hash in new_hashes {
            self.ring.insert(vnode_hash, server_id.clone());
        }
        self.physical.insert(server_id);
    }

    /// Removes `server_id`'s virtual nodes from the ring, then synthesizes
    /// a replacement replica set (from the post-removal ring) for every
    /// chunk it held and invokes `sink.redistribute` once per chunk. The
    /// target replica count for each chunk comes from `sink.replica_count`
    /// (the Ring has no notion of a "default" count of its own — that's a
    /// Placement-level concept the sink is in the right position to supply,
    /// normally "however many replicas this chunk already had").
    pub fn remove(&mut self, server_id: &ServerId, sink: &mut impl RebalanceSink) {
        debug!(server = %server_id, "removing server from ring");

        let chunks = sink.held_chunks(server_id);

        for i in 0..self.virtual_nodes {
            let vnode_hash = hash_key(&virtual_node_key(server_id.as_str(), i));
            self.ring.remove(&vnode_hash);
        }
        self.physical.remove(server_id);

        for chunk in chunks {
            let n = sink.replica_count(&chunk);
            let replacement = self.replicas(chunk.as_str(), n);
            sink.redistribute(&chunk, replacement);
        }
    }
}

/// The side effects `Ring::add`/`Ring::remove` need from the rest of the
/// coordinator: reading a server's current chunk set and applying a
/// migration or redistribution once it's decided. One trait rather than
/// separate closures so a single implementor (holding `&mut` to both
/// Membership and Placement) can satisfy the whole contract without two
/// overlapping mutable borrows of the same state.
pub trait RebalanceSink {
    /// Chunks currently recorded as held by `server`, read fresh each call.
    fn held_chunks(&self, server: &ServerId) -> Vec<ChunkHandle>;
    /// How many replicas `chunk` should have after redistribution.
    fn replica_count(&self, chunk: &ChunkHandle) -> usize;
    /// Record that `chunk` moved from `from` to `to`.
    fn migrate(&mut self, from: &ServerId, to: &ServerId, chunk: &ChunkHandle);
    /// Record that `chunk`'s replica set is now `targets` (may contain
    /// `None` placeholders only when the post-removal ring is empty).
    fn redistribute(&mut self, chunk: &ChunkHandle, targets: Vec<Option<ServerId>>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Test-only sink: a `HashMap<ServerId, Vec<ChunkHandle>>` view of who
    /// holds what, plus recorders for migrate/redistribute calls.
    #[derive(Default)]
    struct RecordingSink {
        holdings: HashMap<ServerId, Vec<ChunkHandle>>,
        replica_count: usize,
        migrations: Vec<(ServerId, ServerId, ChunkHandle)>,
        redistributions: Vec<(ChunkHandle, Vec<Option<ServerId>>)>,
    }

    impl RebalanceSink for RecordingSink {
        fn held_chunks(&self, server: &ServerId) -> Vec<ChunkHandle> {
            self.holdings.get(server).cloned().unwrap_or_default()
        }

        fn replica_count(&self, _chunk: &ChunkHandle) -> usize {
            self.replica_count
        }

        fn migrate(&mut self, from: &ServerId, to: &ServerId, chunk: &ChunkHandle) {
            self.migrations.push((from.clone(), to.clone(), chunk.clone()));
        }

        fn redistribute(&mut self, chunk: &ChunkHandle, targets: Vec<Option<ServerId>>) {
            self.redistributions.push((chunk.clone(), targets));
        }
    }

    fn ring_with(servers: &[&str], vnodes: usize) -> Ring {
        let mut ring = Ring::new(vnodes);
        let mut sink = RecordingSink::default();
        for s in servers {
            ring.add(ServerId::new(*s), &mut sink);
        }
        ring
    }

    #[test]
    fn add_and_lookup_one_replica() {
        let ring = ring_with(&["10.0.0.1", "10.0.0.2"], 100);
        let picked = ring.replicas("some_key", 1);
        assert_eq!(picked.len(), 1);
        let id = picked[0].clone().unwrap();
        assert!(id.as_str() == "10.0.0.1" || id.as_str() == "10.0.0.2");
    }

    #[test]
    fn short_list_when_fewer_physical_servers_than_requested() {
        let ring = ring_with(&["10.0.0.1", "10.0.0.2"], 100);
        let picked = ring.replicas("some_key", 3);
        let distinct: BTreeSet<_> = picked.into_iter().flatten().collect();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn remove_and_reroute() {
        let mut ring = ring_with(&["10.0.0.1", "10.0.0.2"], 100);
        let mut sink = RecordingSink { replica_count: 3, ..Default::default() };
        sink.holdings.insert(
            ServerId::new("10.0.0.1"),
            vec![ChunkHandle::new("f", 1, 0, "txt")],
        );

        ring.remove(&ServerId::new("10.0.0.1"), &mut sink);

        let picked = ring.replicas("some_key", 1);
        assert_eq!(picked, vec![Some(ServerId::new("10.0.0.2"))]);
        assert_eq!(sink.redistributions.len(), 1);
    }

    #[test]
    fn empty_ring_returns_null_placeholders() {
        let ring = Ring::new(20);
        let picked = ring.replicas("k", 3);
        assert_eq!(picked, vec![None, None, None]);
    }

    #[test]
    fn replicas_are_deterministic_for_fixed_ring() {
        let ring = ring_with(&["a", "b", "c", "d"], 50);
        let first = ring.replicas("stable-key", 2);
        let second = ring.replicas("stable-key", 2);
        assert_eq!(first, second);
    }

    #[test]
    fn even_distribution_statistical() {
        let ring = ring_with(&["s1", "s2", "s3", "s4"], 100);
        let mut counts: HashMap<ServerId, usize> = HashMap::new();
        for i in 0..100 {
            let picked = ring.replicas(&format!("key-{i}"), 1);
            if let Some(Some(id)) = picked.into_iter().next() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert!(*count > 10, "server received only {count} assignments");
        }
    }

    #[test]
    fn join_migration_invokes_callback_for_owned_chunk() {
        let mut ring = Ring::new(100);
        let mut sink = RecordingSink::default();
        let c1 = ChunkHandle::new("f", 1, 0, "txt");
        sink.holdings.insert(ServerId::new("10.0.0.1"), vec![c1.clone()]);
        ring.add(ServerId::new("10.0.0.1"), &mut sink);

        ring.add(ServerId::new("10.0.0.2"), &mut sink);

        // Not guaranteed on every vnode layout, but with 100 vnodes across
        // two servers a single chunk crosses at least one new boundary with
        // overwhelming probability; assert the callback contract shape
        // instead of asserting it always fires for this exact chunk.
        for (from, to, chunk) in &sink.migrations {
            assert_eq!(*from, ServerId::new("10.0.0.1"));
            assert_eq!(*to, ServerId::new("10.0.0.2"));
            assert_eq!(*chunk, c1);
        }
    }

    #[test]
    fn leave_redistribution_invoked_once_per_chunk() {
        let mut ring = Ring::new(50);
        let mut sink = RecordingSink::default();
        for s in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            ring.add(ServerId::new(s), &mut sink);
        }
        let chunk = ChunkHandle::new("f", 1, 0, "txt");
        sink.holdings.insert(ServerId::new("10.0.0.1"), vec![chunk.clone()]);
        sink.replica_count = 3;
        ring.remove(&ServerId::new("10.0.0.1"), &mut sink);
        assert_eq!(sink.redistributions.len(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // P4: for a fixed ring, replicas(k, N) is deterministic.
            #[test]
            fn replicas_deterministic(key in "[a-z]{1,16}", n in 1usize..5) {
                let ring = ring_with(&["a", "b", "c", "d", "e"], 30);
                prop_assert_eq!(ring.replicas(&key, n), ring.replicas(&key, n));
            }

            // P2: chunk_locations never contains a duplicate ServerId.
            #[test]
            fn replicas_never_duplicate(key in "[a-z]{1,16}", n in 1usize..6) {
                let ring = ring_with(&["a", "b", "c", "d"], 30);
                let picked: Vec<ServerId> = ring.replicas(&key, n).into_iter().flatten().collect();
                let distinct: BTreeSet<_> = picked.iter().cloned().collect();
                prop_assert_eq!(picked.len(), distinct.len());
            }
        }
    }
}
