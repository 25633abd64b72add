//! Migration and redistribution instructions.
//!
//! These are the two shapes `Ring::add`/`Ring::remove`'s callbacks hand
//! back to the coordinator (spec.md 4.4). Both are best-effort and
//! idempotent: replaying the same instruction converges to the same
//! ring-derived placement, so a coordinator that crashes mid-apply can
//! simply recompute and re-issue them on the next sweep. Emitting the
//! instruction to the affected chunk servers over the wire is out of
//! scope here; this module only captures the instruction shape and the
//! in-memory metadata update.

use shardmaster_core::{ChunkHandle, ServerId};

/// "Copy `chunk` from `from` to `to`, then mark ownership moved."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInstruction {
    pub from: ServerId,
    pub to: ServerId,
    pub chunk: ChunkHandle,
}

/// "Re-replicate `chunk` onto `targets`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedistributionInstruction {
    pub chunk: ChunkHandle,
    pub targets: Vec<ServerId>,
}
