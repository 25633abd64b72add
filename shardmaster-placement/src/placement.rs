//! The authoritative file table and chunk→locations index.
//!
//! Placement is deliberately ignorant of `Server.chunks`: it records
//! `chunk_locations` and notifies the caller (via injected callbacks, the
//! same style `Ring` uses) of which `(ServerId, ChunkHandle)` pairs were
//! assigned or released so the caller — `shardmaster-service`, the only
//! place holding Membership and Placement together — can keep invariant
//! I3 (`h ∈ s.chunks ⇔ s.id ∈ chunk_locations[h]`) true.

use std::collections::HashMap;

use shardmaster_core::{file_name, Chunk, ChunkHandle, File, ServerId};
use shardmaster_ring::Ring;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Placement {
    files: HashMap<String, File>,
    chunk_locations: HashMap<ChunkHandle, Vec<ServerId>>,
}

impl Placement {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            chunk_locations: HashMap::new(),
        }
    }

    /// Writes a new generation of `{file_stem}.{file_suffix}`: bumps the
    /// version, mints `chunk_num` fresh handles, and places each via
    /// `ring.replicas`. `on_chunk_assigned` fires once per
    /// `(server, handle)` pair actually assigned (never for a null
    /// placeholder), letting the caller update that server's chunk set.
    ///
    /// Returns the handle→addresses map for the RPC response; a short list
    /// for a handle signals degraded placement (logged here, not an error).
    pub fn write_file(
        &mut self,
        ring: &Ring,
        file_stem: &str,
        file_suffix: &str,
        chunk_num: u64,
        replica_count: usize,
        mut on_chunk_assigned: impl FnMut(&ServerId, &ChunkHandle),
    ) -> HashMap<ChunkHandle, Vec<ServerId>> {
        let name = file_name(file_stem, file_suffix);
        let mut file = self
            .files
            .remove(&name)
            .unwrap_or_else(|| File::new(name.clone()));
        file.version += 1;

        let mut result = HashMap::with_capacity(chunk_num as usize);
        for i in 0..chunk_num {
            let handle = ChunkHandle::new(file_stem, file.version, i, file_suffix);

            let picked = ring.replicas(handle.as_str(), replica_count);
            let servers: Vec<ServerId> = picked.into_iter().flatten().collect();
            if servers.len() < replica_count {
                warn!(
                    handle = %handle,
                    available = servers.len(),
                    requested = replica_count,
                    "degraded placement: not enough chunk servers for requested replica count"
                );
            }

            for server in &servers {
                on_chunk_assigned(server, &handle);
            }

            self.chunk_locations.insert(handle.clone(), servers.clone());
            file.chunks.push(Chunk {
                handle: handle.clone(),
            });
            result.insert(handle, servers);
        }

        self.files.insert(name, file);
        result
    }

    /// Chunks in insertion order with their current replica sets, or
    /// `None` if the file is unknown.
    pub fn get_file(
        &self,
        file_stem: &str,
        file_suffix: &str,
    ) -> Option<Vec<(ChunkHandle, Vec<ServerId>)>> {
        let name = file_name(file_stem, file_suffix);
        let file = self.files.get(&name)?;
        Some(
            file.chunks
                .iter()
                .map(|chunk| {
                    let servers = self
                        .chunk_locations
                        .get(&chunk.handle)
                        .cloned()
                        .unwrap_or_default();
                    (chunk.handle.clone(), servers)
                })
                .collect(),
        )
    }

    pub fn fetch_file_info(&self, file_stem: &str, file_suffix: &str) -> Option<&File> {
        let name = file_name(file_stem, file_suffix);
        self.files.get(&name)
    }

    /// Removes the file record and every one of its chunk locations.
    /// `on_release` fires once per `(server, handle)` pair that was
    /// recorded, so the caller can drop the handle from that server's
    /// chunk set. Idempotent: absent files are a no-op.
    pub fn delete_file(
        &mut self,
        file_stem: &str,
        file_suffix: &str,
        mut on_release: impl FnMut(&ServerId, &ChunkHandle),
    ) {
        let name = file_name(file_stem, file_suffix);
        let Some(file) = self.files.remove(&name) else {
            return;
        };
        for chunk in &file.chunks {
            if let Some(servers) = self.chunk_locations.remove(&chunk.handle) {
                for server in &servers {
                    on_release(server, &chunk.handle);
                }
            }
        }
    }

    pub fn locations_of(&self, handle: &ChunkHandle) -> Vec<ServerId> {
        self.chunk_locations.get(handle).cloned().unwrap_or_default()
    }

    /// Applies a join-time migration in place: `chunk_locations[handle]`
    /// swaps `from` for `to` wherever it appears (invariant I3). A single
    /// `Ring::add` sweep can migrate the same multi-replica chunk to `to`
    /// from two different predecessors (one vnode's predecessor is `from`,
    /// a later vnode's predecessor is some other existing holder of the
    /// same chunk); if `to` already holds the chunk by the time this fires,
    /// renaming `from` to `to` again would introduce a duplicate `ServerId`
    /// (invariant I2). Drop the `from` entry instead in that case.
    pub fn apply_migration(&mut self, from: &ServerId, to: &ServerId, handle: &ChunkHandle) {
        if let Some(locations) = self.chunk_locations.get_mut(handle) {
            if locations.iter().any(|loc| loc == to) {
                locations.retain(|loc| loc != from);
            } else {
                for loc in locations.iter_mut() {
                    if loc == from {
                        *loc = to.clone();
                    }
                }
            }
        }
    }

    /// Applies a leave-time redistribution: `chunk_locations[handle]` is
    /// replaced wholesale by the ring-derived replacement set.
    pub fn apply_redistribution(&mut self, handle: &ChunkHandle, targets: Vec<ServerId>) {
        self.chunk_locations.insert(handle.clone(), targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardmaster_core::ServerId;
    use shardmaster_ring::RebalanceSink;

    /// No chunks held yet, so joins never migrate anything — these tests
    /// only need a populated ring, not rebalancing side effects.
    #[derive(Default)]
    struct NoopSink;

    impl RebalanceSink for NoopSink {
        fn held_chunks(&self, _server: &ServerId) -> Vec<ChunkHandle> {
            Vec::new()
        }
        fn replica_count(&self, _chunk: &ChunkHandle) -> usize {
            0
        }
        fn migrate(&mut self, _from: &ServerId, _to: &ServerId, _chunk: &ChunkHandle) {}
        fn redistribute(&mut self, _chunk: &ChunkHandle, _targets: Vec<Option<ServerId>>) {}
    }

    fn ring_with_servers(servers: &[&str]) -> Ring {
        let mut ring = Ring::new(100);
        let mut sink = NoopSink;
        for s in servers {
            ring.add(ServerId::new(*s), &mut sink);
        }
        ring
    }

    #[test]
    fn write_file_produces_versioned_handles_and_replica_sets() {
        let ring = ring_with_servers(&["s1", "s2", "s3", "s4"]);
        let mut placement = Placement::new();

        let map = placement.write_file(&ring, "test_file", "txt", 5, 3, |_, _| {});
        assert_eq!(map.len(), 5);
        for servers in map.values() {
            assert_eq!(servers.len(), 3);
        }

        let all_servers: std::collections::BTreeSet<_> =
            map.values().flatten().cloned().collect();
        assert!(all_servers.len() >= 2);

        let info = placement.fetch_file_info("test_file", "txt").unwrap();
        assert_eq!(info.version, 1);
    }

    #[test]
    fn second_write_bumps_version_and_changes_handles() {
        let ring = ring_with_servers(&["s1", "s2", "s3", "s4"]);
        let mut placement = Placement::new();

        let first = placement.write_file(&ring, "f", "txt", 2, 2, |_, _| {});
        let second = placement.write_file(&ring, "f", "txt", 2, 2, |_, _| {});

        assert_ne!(first, second);
        assert_eq!(placement.fetch_file_info("f", "txt").unwrap().version, 2);
    }

    #[test]
    fn get_file_returns_none_for_unknown_file() {
        let placement = Placement::new();
        assert!(placement.get_file("nope", "txt").is_none());
    }

    #[test]
    fn delete_file_is_idempotent_and_releases_locations() {
        let ring = ring_with_servers(&["s1", "s2"]);
        let mut placement = Placement::new();
        placement.write_file(&ring, "f", "txt", 1, 2, |_, _| {});

        let mut released = Vec::new();
        placement.delete_file("f", "txt", |server, handle| {
            released.push((server.clone(), handle.clone()))
        });
        assert_eq!(released.len(), 2);
        assert!(placement.get_file("f", "txt").is_none());

        // Idempotent: second delete is a no-op, no callback firing.
        let mut second_release_count = 0;
        placement.delete_file("f", "txt", |_, _| second_release_count += 1);
        assert_eq!(second_release_count, 0);
    }

    #[test]
    fn degraded_write_with_empty_ring_returns_empty_location_lists() {
        let ring = Ring::new(20);
        let mut placement = Placement::new();
        let map = placement.write_file(&ring, "f", "txt", 2, 3, |_, _| {});
        for servers in map.values() {
            assert!(servers.is_empty());
        }
    }

    /// A single `Ring::add` sweep can migrate the same multi-replica chunk
    /// to the joining server from two different predecessors (one vnode's
    /// predecessor is `a`, a later vnode's predecessor is `x`, and both `a`
    /// and `x` already hold the chunk). The second `apply_migration` must
    /// drop `a`'s entry rather than rename it to a `to` that's already
    /// present, or `chunk_locations` ends up with a duplicate `ServerId`.
    #[test]
    fn apply_migration_dedups_when_target_already_holds_the_chunk() {
        let mut placement = Placement::new();
        let handle = ChunkHandle::new("f", 1, 0, "txt");
        placement
            .chunk_locations
            .insert(handle.clone(), vec![ServerId::new("a"), ServerId::new("x")]);

        placement.apply_migration(&ServerId::new("a"), &ServerId::new("b"), &handle);
        assert_eq!(
            placement.locations_of(&handle),
            vec![ServerId::new("b"), ServerId::new("x")]
        );

        placement.apply_migration(&ServerId::new("x"), &ServerId::new("b"), &handle);
        let locations = placement.locations_of(&handle);
        let distinct: std::collections::BTreeSet<_> = locations.iter().cloned().collect();
        assert_eq!(locations.len(), distinct.len(), "duplicate ServerId after migration");
        assert_eq!(locations, vec![ServerId::new("b")]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // P6: N successive write_file calls for the same name yield
            // versions 1, 2, ..., N.
            #[test]
            fn versions_are_monotonic_across_successive_writes(
                n in 1usize..12,
                chunk_num in 1u64..5,
            ) {
                let ring = ring_with_servers(&["s1", "s2", "s3"]);
                let mut placement = Placement::new();
                for expected_version in 1..=n as u64 {
                    placement.write_file(&ring, "f", "txt", chunk_num, 2, |_, _| {});
                    let info = placement.fetch_file_info("f", "txt").unwrap();
                    prop_assert_eq!(info.version, expected_version);
                }
            }
        }
    }
}
