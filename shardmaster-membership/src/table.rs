//! The coordinator's membership table: one record per known chunk server.

use std::collections::HashMap;

use shardmaster_core::{CoordinatorError, Result, Server, ServerId, ServerStatus};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct MembershipTable {
    servers: HashMap<ServerId, Server>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self {
            servers: HashMap::new(),
        }
    }

    /// Creates a new `Server{status=Initial, remains=0, last_update=0}`.
    /// Errors with `AlreadyExists` if `id` is already known.
    pub fn register(&mut self, id: ServerId) -> Result<()> {
        if self.servers.contains_key(&id) {
            warn!(server = %id, "register: chunk server already exists");
            return Err(CoordinatorError::AlreadyExists { id });
        }
        info!(server = %id, "registering chunk server");
        self.servers.insert(id.clone(), Server::new(id));
        Ok(())
    }

    /// Removes a server's record unconditionally. Returns the removed
    /// record (if any) so the caller can deactivate it from the ring
    /// first when its status was ring-resident. Not an error if unknown.
    pub fn remove(&mut self, id: &ServerId) -> Option<Server> {
        match self.servers.remove(id) {
            Some(server) => {
                info!(server = %id, "unregistered chunk server");
                Some(server)
            }
            None => {
                warn!(server = %id, "unregister: chunk server does not exist");
                None
            }
        }
    }

    /// Updates `last_update`/`remains` for a known server. Does not itself
    /// drive state transitions; the sweeper does. Warns and ignores an
    /// unknown address.
    pub fn heartbeat(&mut self, id: &ServerId, remains: u64, now: u64) {
        match self.servers.get_mut(id) {
            Some(server) => {
                server.last_update = now;
                server.remains = remains;
                info!(server = %id, remains, "received heartbeat");
            }
            None => {
                warn!(server = %id, "received unknown heartbeat, ignored");
            }
        }
    }

    pub fn get(&self, id: &ServerId) -> Option<&Server> {
        self.servers.get(id)
    }

    pub fn set_status(&mut self, id: &ServerId, status: ServerStatus) {
        if let Some(server) = self.servers.get_mut(id) {
            server.status = status;
        }
    }

    pub fn chunks_of(&self, id: &ServerId) -> Vec<shardmaster_core::ChunkHandle> {
        self.servers
            .get(id)
            .map(|s| s.chunks.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_chunk(&mut self, id: &ServerId, handle: shardmaster_core::ChunkHandle) {
        if let Some(server) = self.servers.get_mut(id) {
            server.chunks.insert(handle);
        }
    }

    pub fn remove_chunk(&mut self, id: &ServerId, handle: &shardmaster_core::ChunkHandle) {
        if let Some(server) = self.servers.get_mut(id) {
            server.chunks.remove(handle);
        }
    }

    pub fn ids(&self) -> Vec<ServerId> {
        self.servers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }
}
