//! Shared identifiers and records for the coordinator's metadata model.
//!
//! `ServerId`, `ChunkHandle`, `Server`, `Chunk`, and `File` are the vocabulary
//! every other crate in this workspace builds on. None of them encode
//! behavior; `shardmaster-ring`, `shardmaster-membership`, and
//! `shardmaster-placement` own the operations that mutate them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque identity of a physical chunk server: its network address.
///
/// Equality and hashing are by this field alone, matching the original
/// Python `ChunkServerInfo.__eq__`/`__hash__` which compare on `address`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Globally unique identifier for one versioned chunk of one file.
///
/// Bit-exact format: `{file_stem}_v{version}_chunk{index}.{file_suffix}`,
/// `version` a positive integer, `index` non-negative and unpadded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkHandle(pub String);

impl ChunkHandle {
    /// Forms a handle per the coordinator's chunk-naming convention.
    pub fn new(file_stem: &str, version: u64, index: u64, file_suffix: &str) -> Self {
        Self(format!("{file_stem}_v{version}_chunk{index}.{file_suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership status driven by the heartbeat sweeper's state machine.
///
/// Ordering mirrors the original Python enum (`INITIAL = -1 .. FAILED = 2`)
/// but carries no numeric meaning here beyond variant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Initial,
    Healthy,
    Suspect,
    Failed,
}

impl ServerStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServerStatus::Healthy)
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Initial => "initial",
            ServerStatus::Healthy => "healthy",
            ServerStatus::Suspect => "suspect",
            ServerStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A physical chunk server record as tracked by the coordinator.
///
/// `chunks` is a denormalized index into `Placement::chunk_locations`,
/// maintained transactionally alongside it (invariant I3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub status: ServerStatus,
    pub remains: u64,
    /// Monotonic seconds since epoch; 0 until the first heartbeat arrives.
    pub last_update: u64,
    pub chunks: BTreeSet<ChunkHandle>,
}

impl Server {
    /// A freshly registered server: `Initial`, no chunks, never heard from.
    pub fn new(id: ServerId) -> Self {
        Self {
            id,
            status: ServerStatus::Initial,
            remains: 0,
            last_update: 0,
            chunks: BTreeSet::new(),
        }
    }
}

/// A single chunk of a file. Replica locations live in `Placement`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub handle: ChunkHandle,
}

/// A file's metadata: its current version and ordered chunk list.
///
/// Overwriting increments `version` and produces an entirely new chunk
/// list; the previous generation's handles become garbage (out of scope
/// to reclaim, per spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    pub version: u64,
    pub chunks: Vec<Chunk>,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            chunks: Vec::new(),
        }
    }
}

/// Builds the full dotted file name from a caller-supplied stem and suffix.
pub fn file_name(stem: &str, suffix: &str) -> String {
    format!("{stem}.{suffix}")
}
