//! Shared foundation crate for the ShardMaster coordinator workspace.
//!
//! Holds the data model (`types`), the typed error surfaced by the core
//! (`error`), and process configuration (`config`). Every other crate in
//! this workspace depends on this one; it depends on nothing else in the
//! workspace, by design.

pub mod config;
pub mod error;
pub mod types;

pub use config::CoordinatorConfig;
pub use error::{CoordinatorError, Result};
pub use types::{Chunk, ChunkHandle, File, Server, ServerId, ServerStatus};
