//! Status state machine
//!
//! Validates and applies status transitions on client entities. A transition
//! not present in the table is rejected with a logged warning and leaves the
//! entity untouched; malformed or duplicate client messages must never corrupt
//! state.

use chrono::Utc;

use super::ClientStore;
use crate::types::{ClientId, ClientStatus, MonitorEvent};

/// Allowed target statuses for a given source status
///
/// `Disconnected` is terminal. `WaitingInput` carries no transitions of its
/// own; it exists for protocol compatibility and is never entered through the
/// state machine.
#[must_use]
pub fn allowed_targets(from: ClientStatus) -> &'static [ClientStatus] {
    use ClientStatus::*;
    match from {
        Connected => &[Idle, Running, Disconnected],
        Idle => &[Running, Paused, Disconnected],
        Running => &[Idle, Completed, Error, Paused],
        Paused => &[Running, Idle, Disconnected],
        Error => &[Idle, Running, Disconnected],
        Completed => &[Idle, Running, Disconnected],
        WaitingInput | Disconnected => &[],
    }
}

/// Whether `from -> to` is present in the transition table
#[must_use]
pub fn is_allowed(from: ClientStatus, to: ClientStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Accepted status transition, as applied to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the transition
    pub from: ClientStatus,
    /// Status after the transition
    pub to: ClientStatus,
}

impl ClientStore {
    /// Apply a status transition through the state machine
    ///
    /// On success updates the status, touches `last_activity_at`, publishes
    /// `ClientStatusChanged`, and returns the applied change. A transition not
    /// in the table, or an unknown id, is logged and returns `None` without
    /// mutating anything.
    pub async fn apply_transition(
        &self,
        id: &ClientId,
        target: ClientStatus,
    ) -> Option<StatusChange> {
        let change = {
            let mut clients = self.clients.lock().await;
            let Some(entity) = clients.get_mut(id) else {
                log::warn!("Status transition for unknown client {id}; ignoring");
                return None;
            };

            let from = entity.status;
            if !is_allowed(from, target) {
                log::warn!("Rejected status transition for {id}: {from} -> {target}");
                return None;
            }

            entity.status = target;
            let now = Utc::now();
            if now > entity.last_activity_at {
                entity.last_activity_at = now;
            }
            StatusChange { from, to: target }
        };

        log::debug!("Client {id} status: {} -> {}", change.from, change.to);
        self.bus().publish(&MonitorEvent::ClientStatusChanged {
            client_id: id.clone(),
            from: change.from,
            to: change.to,
            timestamp: Utc::now(),
        });

        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClientStatus::*;

    #[test]
    fn terminal_states_have_no_targets() {
        assert!(allowed_targets(Disconnected).is_empty());
        assert!(allowed_targets(WaitingInput).is_empty());
    }

    #[test]
    fn running_cannot_disconnect_directly() {
        assert!(!is_allowed(Running, Disconnected));
        assert!(is_allowed(Running, Idle));
        assert!(is_allowed(Running, Completed));
        assert!(is_allowed(Running, Error));
        assert!(is_allowed(Running, Paused));
    }

    #[test]
    fn completed_can_rearm() {
        assert!(is_allowed(Completed, Idle));
        assert!(is_allowed(Completed, Running));
        assert!(is_allowed(Completed, Disconnected));
        assert!(!is_allowed(Completed, Paused));
    }

    #[test]
    fn self_transitions_are_rejected() {
        for status in [
            Connected,
            Idle,
            Running,
            WaitingInput,
            Paused,
            Error,
            Completed,
            Disconnected,
        ] {
            assert!(!is_allowed(status, status), "{status} -> {status} must be rejected");
        }
    }

    #[test]
    fn nothing_enters_waiting_input() {
        for status in [Connected, Idle, Running, Paused, Error, Completed, Disconnected] {
            assert!(!is_allowed(status, WaitingInput));
        }
    }
}
