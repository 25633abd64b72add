//! `CoordinatorService`: the RPC-addressable facade (spec.md section 6).
//!
//! One reentrant mutex guards `CoordinatorState`, matching
//! `original_source/coordinator.py`'s `threading.RLock` — reentrant because
//! the heartbeat sweeper's ring callbacks recurse back into mutations of
//! the same state from inside `CoordinatorState::sweep`, which itself runs
//! under this lock. `parking_lot::ReentrantMutex` only hands out a shared
//! `&CoordinatorState`, so the guarded value is additionally wrapped in a
//! `RefCell` for interior mutability — the same two-layer shape
//! `parking_lot`'s own docs recommend for reentrant interior mutability.
//! No `.await` ever occurs while the guard is held.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::ReentrantMutex;
use shardmaster_core::{ChunkHandle, CoordinatorConfig, File, Result, Server, ServerId};
use shardmaster_membership::{Sweeper, SweeperHandle};

use crate::metrics::CallMetrics;
use crate::state::CoordinatorState;

pub struct CoordinatorService {
    state: Arc<ReentrantMutex<RefCell<CoordinatorState>>>,
    metrics: CallMetrics,
    heartbeat_check_interval: u64,
    default_replica_count: usize,
    sweeper: SweeperHandle,
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

impl CoordinatorService {
    /// Builds the service and spawns its heartbeat sweeper immediately,
    /// matching `original_source/coordinator.py`'s `start_heartbeat_check`
    /// being called as part of server startup rather than left to the caller.
    pub fn start(config: &CoordinatorConfig) -> Self {
        let state = Arc::new(ReentrantMutex::new(RefCell::new(CoordinatorState::new(
            config.virtual_nodes_per_server,
            config.default_replica_count,
        ))));

        let sweeper = Sweeper::new(Duration::from_secs(config.heartbeat_check_interval));
        let handle = sweeper.handle();
        let interval = config.heartbeat_check_interval;
        let sweep_state = state.clone();
        sweeper.spawn(move || {
            let guard = sweep_state.lock();
            guard.borrow_mut().sweep(now_secs(), interval);
        });

        Self {
            state,
            metrics: CallMetrics::new(),
            heartbeat_check_interval: config.heartbeat_check_interval,
            default_replica_count: config.default_replica_count,
            sweeper: handle,
        }
    }

    pub fn metrics(&self) -> &CallMetrics {
        &self.metrics
    }

    /// Stops the background sweeper; the already-running tick (if any)
    /// completes cooperatively rather than being cancelled mid-sweep.
    pub fn stop_heartbeat_check(&self) {
        self.sweeper.stop();
    }

    pub async fn register_chunk_server(&self, addr: String) -> Result<()> {
        self.metrics.time("register_chunk_server", || {
            let guard = self.state.lock();
            guard.borrow_mut().register(ServerId::new(addr))
        })
    }

    pub async fn unregister_chunk_server(&self, addr: String) {
        self.metrics.time("unregister_chunk_server", || {
            let guard = self.state.lock();
            guard.borrow_mut().unregister(&ServerId::new(addr));
        });
    }

    pub async fn heartbeat(&self, addr: String, remains: u64) {
        self.metrics.time("heartbeat", || {
            let guard = self.state.lock();
            guard.borrow_mut().heartbeat(&ServerId::new(addr), remains, now_secs());
        });
    }

    pub async fn write_file(
        &self,
        file_stem: String,
        file_suffix: String,
        chunk_num: u64,
        replica_count: Option<usize>,
    ) -> HashMap<ChunkHandle, Vec<ServerId>> {
        let replica_count = replica_count.unwrap_or(self.default_replica_count);
        self.metrics.time("write_file", || {
            let guard = self.state.lock();
            guard
                .borrow_mut()
                .write_file(&file_stem, &file_suffix, chunk_num, replica_count)
        })
    }

    pub async fn get_file(
        &self,
        file_stem: String,
        file_suffix: String,
    ) -> Option<Vec<(ChunkHandle, Vec<ServerId>)>> {
        self.metrics.time("get_file", || {
            let guard = self.state.lock();
            guard.borrow().get_file(&file_stem, &file_suffix)
        })
    }

    pub async fn fetch_file_info(&self, file_stem: String, file_suffix: String) -> Option<File> {
        self.metrics.time("fetch_file_info", || {
            let guard = self.state.lock();
            guard.borrow().fetch_file_info(&file_stem, &file_suffix)
        })
    }

    pub async fn delete_file(&self, file_stem: String, file_suffix: String) {
        self.metrics.time("delete_file", || {
            let guard = self.state.lock();
            guard.borrow_mut().delete_file(&file_stem, &file_suffix);
        });
    }

    /// Read-only snapshot of a known server's record. Not spec-mandated RPC
    /// surface; kept public for tests and future `/servers` introspection.
    pub fn server_snapshot(&self, id: &ServerId) -> Option<Server> {
        let guard = self.state.lock();
        guard.borrow().get_server(id).cloned()
    }

    /// Forces an immediate sweep instead of waiting for the background
    /// timer, for deterministic tests of the heartbeat state machine.
    pub fn run_sweep_now(&self, now: u64) {
        let guard = self.state.lock();
        guard.borrow_mut().sweep(now, self.heartbeat_check_interval);
    }
}
