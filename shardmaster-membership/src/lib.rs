//! Membership: per-server status, heartbeat clock, and the periodic
//! sweeper that drives the `Initial -> Healthy <-> Suspect -> Failed`
//! state machine.

mod state_machine;
mod sweeper;
mod table;

pub use state_machine::{is_ring_resident, next_status, within_interval, Transition};
pub use sweeper::{Sweeper, SweeperHandle};
pub use table::MembershipTable;
