//! The coordinator's service facade: `CoordinatorState` (Ring + Membership +
//! Placement under one lock) and `CoordinatorService` (the RPC-addressable
//! surface spec.md section 6 describes), plus ambient per-call metrics.

mod metrics;
mod service;
mod state;

pub use metrics::CallMetrics;
pub use service::CoordinatorService;
pub use state::CoordinatorState;
