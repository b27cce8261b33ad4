//! The three per-user tables guarded by the synchronizer lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use spectator_protocol::{RawSessionState, UserId};

use crate::types::{GameplayState, WatchedUser};

/// Lifecycle of a synchronizer instance. Only `Active` accepts events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Active,
    TornDown,
}

#[derive(Default)]
pub(crate) struct SyncTables {
    pub(crate) phase: SyncPhase,
    pub(crate) watched_users: HashMap<UserId, WatchedUser>,
    pub(crate) raw_states: HashMap<UserId, RawSessionState>,
    pub(crate) gameplay_states: HashMap<UserId, Arc<GameplayState>>,
}

impl SyncTables {
    /// True when an event for `user_id` should be applied.
    pub(crate) fn accepts(&self, user_id: UserId) -> bool {
        self.phase == SyncPhase::Active && self.watched_users.contains_key(&user_id)
    }

    /// gameplay ⇒ raw ⇒ watched. Returns the first violation found.
    pub(crate) fn invariant_violation(&self) -> Option<String> {
        if let Some(user_id) = self
            .gameplay_states
            .keys()
            .find(|id| !self.raw_states.contains_key(id))
        {
            return Some(format!("gameplay state for {} without raw state", user_id));
        }
        if let Some(user_id) = self
            .raw_states
            .keys()
            .find(|id| !self.watched_users.contains_key(id))
        {
            return Some(format!("raw state for {} without watched user", user_id));
        }
        None
    }

    pub(crate) fn debug_check_invariants(&self) {
        if cfg!(debug_assertions) {
            if let Some(violation) = self.invariant_violation() {
                panic!("sync table invariant violated: {}", violation);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.gameplay_states.clear();
        self.raw_states.clear();
        self.watched_users.clear();
    }

    pub(crate) fn snapshot(&self) -> SyncSnapshot {
        let mut watched: Vec<UserId> = self.watched_users.keys().copied().collect();
        watched.sort();
        let mut in_progress: Vec<UserId> = self.gameplay_states.keys().copied().collect();
        in_progress.sort();
        SyncSnapshot {
            phase: self.phase,
            watched,
            raw_states: self
                .raw_states
                .iter()
                .map(|(id, state)| (*id, state.clone()))
                .collect(),
            in_progress,
        }
    }
}

/// Point-in-time copy of the tables, ordered by user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub watched: Vec<UserId>,
    pub raw_states: BTreeMap<UserId, RawSessionState>,
    pub in_progress: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserProfile;
    use spectator_protocol::{ActivityId, CapabilityId};

    fn watched(id: u64) -> WatchedUser {
        WatchedUser {
            id: UserId(id),
            profile: UserProfile::new(UserId(id), format!("user{}", id)),
        }
    }

    #[test]
    fn accepts_only_watched_users_while_active() {
        let mut tables = SyncTables::default();
        tables.watched_users.insert(UserId(7), watched(7));
        assert!(!tables.accepts(UserId(7)));

        tables.phase = SyncPhase::Active;
        assert!(tables.accepts(UserId(7)));
        assert!(!tables.accepts(UserId(8)));

        tables.phase = SyncPhase::TornDown;
        assert!(!tables.accepts(UserId(7)));
    }

    #[test]
    fn detects_raw_state_without_watched_user() {
        let mut tables = SyncTables::default();
        tables.raw_states.insert(
            UserId(9),
            RawSessionState::playing(ActivityId(1), CapabilityId(1)),
        );
        assert_eq!(
            tables.invariant_violation().as_deref(),
            Some("raw state for 9 without watched user")
        );

        tables.watched_users.insert(UserId(9), watched(9));
        assert!(tables.invariant_violation().is_none());
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut tables = SyncTables::default();
        for id in [9, 3, 5] {
            tables.watched_users.insert(UserId(id), watched(id));
        }
        let snapshot = tables.snapshot();
        assert_eq!(snapshot.watched, vec![UserId(3), UserId(5), UserId(9)]);
        assert!(snapshot.in_progress.is_empty());
    }
}
