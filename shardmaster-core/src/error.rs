//! Error taxonomy for the coordinator core.
//!
//! Per spec, only `AlreadyExists` is a typed error that propagates out of
//! the core; `NotFound`, `DegradedPlacement`, and `UnknownHeartbeat` are
//! recovered locally (an `Option::None`, a short `Vec`, and a logged
//! warning respectively) and never reach this enum. `Internal` is the
//! catch-all an RPC boundary converts into an opaque string payload.

use thiserror::Error;

use crate::types::ServerId;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("chunk server already exists: {id}")]
    AlreadyExists { id: ServerId },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
