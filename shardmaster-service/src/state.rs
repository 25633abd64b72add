//! `CoordinatorState`: Ring, Membership, and Placement held together, the
//! one place in this workspace where all three are mutated as a unit.
//!
//! This is where design note 9's Server↔Chunk cycle actually gets resolved:
//! `Ring::add`/`Ring::remove` need to read and mutate both a server's
//! `chunks` set (Membership) and `chunk_locations` (Placement) in the same
//! pass, which `RebalanceEffects` below does by borrowing both fields at
//! once and implementing `shardmaster_ring::RebalanceSink` over them.

use std::collections::HashMap;

use shardmaster_core::{file_name, ChunkHandle, File, Result, Server, ServerId, ServerStatus};
use shardmaster_membership::{is_ring_resident, next_status, within_interval, MembershipTable, Transition};
use shardmaster_placement::{MigrationInstruction, Placement, RedistributionInstruction};
use shardmaster_ring::{RebalanceSink, Ring};
use tracing::{debug, info, warn};

pub struct CoordinatorState {
    ring: Ring,
    membership: MembershipTable,
    placement: Placement,
    default_replica_count: usize,
}

/// Borrows `MembershipTable` and `Placement` together so `Ring::add`/`remove`
/// can thread a single `&mut` through both reads and writes.
struct RebalanceEffects<'a> {
    membership: &'a mut MembershipTable,
    placement: &'a mut Placement,
    default_replica_count: usize,
}

impl RebalanceSink for RebalanceEffects<'_> {
    fn held_chunks(&self, server: &ServerId) -> Vec<ChunkHandle> {
        self.membership.chunks_of(server)
    }

    /// However many replicas this chunk already had; falls back to the
    /// configured default only if Placement has no record of it (should not
    /// happen in practice, since every chunk in a server's held set came
    /// from a `write_file` that populated `chunk_locations`).
    fn replica_count(&self, chunk: &ChunkHandle) -> usize {
        let current = self.placement.locations_of(chunk).len();
        if current == 0 {
            self.default_replica_count
        } else {
            current
        }
    }

    fn migrate(&mut self, from: &ServerId, to: &ServerId, chunk: &ChunkHandle) {
        let instruction = MigrationInstruction {
            from: from.clone(),
            to: to.clone(),
            chunk: chunk.clone(),
        };
        debug!(from = %instruction.from, to = %instruction.to, chunk = %instruction.chunk, "applying migration");
        self.membership.remove_chunk(from, chunk);
        self.membership.add_chunk(to, chunk.clone());
        self.placement.apply_migration(from, to, chunk);
    }

    fn redistribute(&mut self, chunk: &ChunkHandle, targets: Vec<Option<ServerId>>) {
        let distinct: Vec<ServerId> = targets.into_iter().flatten().collect();
        let instruction = RedistributionInstruction {
            chunk: chunk.clone(),
            targets: distinct.clone(),
        };
        debug!(chunk = %instruction.chunk, targets = instruction.targets.len(), "applying redistribution");
        for server in self.membership_holders(chunk) {
            if !distinct.contains(&server) {
                self.membership.remove_chunk(&server, chunk);
            }
        }
        for server in &distinct {
            self.membership.add_chunk(server, chunk.clone());
        }
        self.placement.apply_redistribution(chunk, distinct);
    }
}

impl RebalanceEffects<'_> {
    fn membership_holders(&self, chunk: &ChunkHandle) -> Vec<ServerId> {
        self.placement.locations_of(chunk)
    }
}

impl CoordinatorState {
    pub fn new(virtual_nodes: usize, default_replica_count: usize) -> Self {
        Self {
            ring: Ring::new(virtual_nodes),
            membership: MembershipTable::new(),
            placement: Placement::new(),
            default_replica_count,
        }
    }

    pub fn register(&mut self, id: ServerId) -> Result<()> {
        self.membership.register(id)
    }

    /// Deactivates (if ring-resident) then removes the record.
    pub fn unregister(&mut self, id: &ServerId) {
        let resident = self
            .membership
            .get(id)
            .map(|s| is_ring_resident(s.status))
            .unwrap_or(false);
        if resident {
            self.deactivate(id);
        }
        self.membership.remove(id);
    }

    pub fn heartbeat(&mut self, id: &ServerId, remains: u64, now: u64) {
        self.membership.heartbeat(id, remains, now);
    }

    pub fn get_server(&self, id: &ServerId) -> Option<&Server> {
        self.membership.get(id)
    }

    #[allow(dead_code)]
    pub fn server_count(&self) -> usize {
        self.membership.len()
    }

    pub fn write_file(
        &mut self,
        file_stem: &str,
        file_suffix: &str,
        chunk_num: u64,
        replica_count: usize,
    ) -> HashMap<ChunkHandle, Vec<ServerId>> {
        let CoordinatorState {
            ring,
            membership,
            placement,
            ..
        } = self;
        placement.write_file(ring, file_stem, file_suffix, chunk_num, replica_count, |server, handle| {
            membership.add_chunk(server, handle.clone());
        })
    }

    pub fn get_file(
        &self,
        file_stem: &str,
        file_suffix: &str,
    ) -> Option<Vec<(ChunkHandle, Vec<ServerId>)>> {
        self.placement.get_file(file_stem, file_suffix)
    }

    pub fn fetch_file_info(&self, file_stem: &str, file_suffix: &str) -> Option<File> {
        self.placement.fetch_file_info(file_stem, file_suffix).cloned()
    }

    pub fn delete_file(&mut self, file_stem: &str, file_suffix: &str) {
        let CoordinatorState {
            membership,
            placement,
            ..
        } = self;
        placement.delete_file(file_stem, file_suffix, |server, handle| {
            membership.remove_chunk(server, handle);
        });
        info!(file = %file_name(file_stem, file_suffix), "deleted file");
    }

    /// Runs one heartbeat sweep: advances every known server's status and
    /// applies the ring-level Activate/Deactivate side effect, if any, for
    /// that transition. Iteration order over the membership table is
    /// unspecified (spec's ordering guarantee); external observers only
    /// ever see the pre- or post-sweep state, never an in-between one,
    /// because the whole sweep runs under the service's single lock.
    pub fn sweep(&mut self, now: u64, interval: u64) {
        let ids = self.membership.ids();
        for id in ids {
            let Some(server) = self.membership.get(&id) else {
                continue;
            };
            let within = within_interval(now, server.last_update, interval);
            let (next, transition) = next_status(server.status, within);
            let previous = server.status;

            if next != previous {
                self.membership.set_status(&id, next);
                match next {
                    ServerStatus::Suspect => {
                        warn!(server = %id, "chunk server heartbeat timed out, suspecting");
                    }
                    ServerStatus::Failed => {
                        warn!(server = %id, "chunk server heartbeat timed out, failed");
                    }
                    ServerStatus::Healthy if previous == ServerStatus::Suspect => {
                        info!(server = %id, "chunk server recovered, healthy");
                    }
                    _ => {}
                }
            }

            match transition {
                Transition::Activate => self.activate(&id),
                Transition::Deactivate => self.deactivate(&id),
                Transition::None => {}
            }
        }
    }

    fn activate(&mut self, id: &ServerId) {
        info!(server = %id, "activating chunk server in ring");
        let CoordinatorState {
            ring,
            membership,
            placement,
            default_replica_count,
        } = self;
        let mut effects = RebalanceEffects {
            membership,
            placement,
            default_replica_count: *default_replica_count,
        };
        ring.add(id.clone(), &mut effects);
    }

    fn deactivate(&mut self, id: &ServerId) {
        info!(server = %id, "deactivating chunk server from ring");
        let CoordinatorState {
            ring,
            membership,
            placement,
            default_replica_count,
        } = self;
        let mut effects = RebalanceEffects {
            membership,
            placement,
            default_replica_count: *default_replica_count,
        };
        ring.remove(id, &mut effects);
    }
}
