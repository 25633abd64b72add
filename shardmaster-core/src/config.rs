//! Configuration for the coordinator process.
//!
//! Recognized coordinator-semantic options (spec.md section 6):
//! `heartbeat_check_interval`, `virtual_nodes_per_server`,
//! `default_replica_count`. `bind_address`/`port` are ambient additions for
//! the RPC surface a runnable binary needs but which the distilled spec,
//! scoped to coordinator semantics, does not enumerate.
//!
//! Loading follows the pack's established pattern (see
//! `aerolithdb-core::config::AerolithsConfig::load`): try a JSON file on
//! disk, fall back to defaults and persist them for next time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seconds between heartbeat sweeps; also the per-interval timeout
    /// threshold used by the membership state machine.
    pub heartbeat_check_interval: u64,

    /// Virtual nodes contributed to the ring per physical server.
    pub virtual_nodes_per_server: usize,

    /// Replica count used when a caller omits one on `write_file`.
    pub default_replica_count: usize,

    /// Address the RPC surface binds to.
    pub bind_address: String,

    /// Port the RPC surface listens on.
    pub port: u16,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_check_interval: 10,
            virtual_nodes_per_server: 20,
            default_replica_count: 3,
            bind_address: "0.0.0.0".to_string(),
            port: 4242,
        }
    }
}

impl CoordinatorConfig {
    const DEFAULT_PATH: &'static str = "coordinator.json";

    /// Loads configuration from `coordinator.json`, writing defaults to
    /// that path if it doesn't exist yet.
    pub async fn load() -> Result<Self> {
        Self::load_from(Self::DEFAULT_PATH).await
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config at {}", path.display())),
            Err(_) => {
                let config = Self::default();
                config.save_to(path).await?;
                Ok(config)
            }
        }
    }

    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialize coordinator config")?;
        tokio::fs::write(path, content)
            .await
            .context("failed to write coordinator config")
    }
}
