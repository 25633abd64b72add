//! Pure heartbeat state-machine transition table.
//!
//! Kept free of any Ring/Placement coupling so it can be unit- and
//! property-tested in isolation; `shardmaster-service` is the only place
//! that wires `Transition::Activate`/`Deactivate` to actual ring mutations,
//! since only it holds Ring, Membership, and Placement under one lock.

use shardmaster_core::ServerStatus;

/// What the sweeper must additionally do when a transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No ring-level side effect.
    None,
    /// Join the ring: triggers migration inbound from the vnode predecessor.
    Activate,
    /// Leave the ring: triggers redistribution of the server's chunks.
    Deactivate,
}

/// A server is ring-resident exactly while Healthy or Suspect: activation
/// happens once (`Initial`/`Failed` -> `Healthy`) and deactivation happens
/// once (`Suspect` -> `Failed`); the `Healthy` <-> `Suspect` oscillation in
/// between does not re-touch the ring. This is the behavior
/// `original_source/coordinator/coordinator.py`'s `heartbeat_check` actually
/// implements, and is the interpretation this workspace follows wherever
/// spec.md's prose and transition table could otherwise be read two ways.
pub fn is_ring_resident(status: ServerStatus) -> bool {
    matches!(status, ServerStatus::Healthy | ServerStatus::Suspect)
}

/// Computes the next status and any required ring transition, given the
/// current status and whether the server is within the heartbeat window
/// (`now - last_update <= interval`).
pub fn next_status(current: ServerStatus, within_interval: bool) -> (ServerStatus, Transition) {
    use ServerStatus::*;
    use Transition as T;

    match (current, within_interval) {
        (Initial, true) => (Healthy, T::Activate),
        (Initial, false) => (Initial, T::None),
        (Healthy, true) => (Healthy, T::None),
        (Healthy, false) => (Suspect, T::None),
        (Suspect, true) => (Healthy, T::None),
        (Suspect, false) => (Failed, T::Deactivate),
        (Failed, true) => (Healthy, T::Activate),
        (Failed, false) => (Failed, T::None),
    }
}

/// `now - last_update <= interval`, saturating so a heartbeat in the future
/// (clock skew) is never treated as a timeout.
pub fn within_interval(now: u64, last_update: u64, interval: u64) -> bool {
    now.saturating_sub(last_update) <= interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn two_consecutive_misses_fail_a_healthy_server() {
        let (s1, t1) = next_status(ServerStatus::Healthy, false);
        assert_eq!(s1, ServerStatus::Suspect);
        assert_eq!(t1, Transition::None);

        let (s2, t2) = next_status(s1, false);
        assert_eq!(s2, ServerStatus::Failed);
        assert_eq!(t2, Transition::Deactivate);
    }

    #[test]
    fn heartbeat_in_between_restores_healthy() {
        let (suspect, _) = next_status(ServerStatus::Healthy, false);
        let (restored, transition) = next_status(suspect, true);
        assert_eq!(restored, ServerStatus::Healthy);
        assert_eq!(transition, Transition::None);
    }

    #[test]
    fn initial_activates_on_first_heartbeat() {
        let (status, transition) = next_status(ServerStatus::Initial, true);
        assert_eq!(status, ServerStatus::Healthy);
        assert_eq!(transition, Transition::Activate);
    }

    #[test]
    fn failed_reactivates_on_heartbeat() {
        let (status, transition) = next_status(ServerStatus::Failed, true);
        assert_eq!(status, ServerStatus::Healthy);
        assert_eq!(transition, Transition::Activate);
    }

    proptest! {
        // P7 shape: Activate/Deactivate only ever fire on the documented edges.
        #[test]
        fn transition_side_effects_only_on_documented_edges(
            status in prop_oneof![
                Just(ServerStatus::Initial),
                Just(ServerStatus::Healthy),
                Just(ServerStatus::Suspect),
                Just(ServerStatus::Failed),
            ],
            within in any::<bool>(),
        ) {
            let (_, transition) = next_status(status, within);
            match transition {
                Transition::Activate => prop_assert!(matches!(status, ServerStatus::Initial | ServerStatus::Failed) && within),
                Transition::Deactivate => prop_assert!(matches!(status, ServerStatus::Suspect) && !within),
                Transition::None => {}
            }
        }
    }
}
