//! Resolved records handed to lifecycle consumers.
//! Wire-level payloads live in `spectator-protocol`; everything here is
//! produced by the synchronizer after catalog resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spectator_protocol::{ActivityId, CapabilityId, FrameHeader, SessionStatus, UserId};

use crate::catalog::CapabilitySet;

/// Identity data returned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl UserProfile {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            country_code: None,
        }
    }
}

/// A user the synchronizer tracks. Only created once identity resolution
/// has succeeded, so the profile is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedUser {
    pub id: UserId,
    pub profile: UserProfile,
}

/// One playable activity in the activity catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub id: ActivityId,
    pub set_id: u64,
    pub version: String,
    pub capability_id: CapabilityId,
    #[serde(default)]
    pub length_ms: u64,
}

/// A group of activity definitions published together. Catalog change
/// notifications carry whole sets.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySet {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub activities: Vec<Arc<ActivityDefinition>>,
}

impl ActivitySet {
    pub fn contains(&self, activity_id: ActivityId) -> bool {
        self.activities.iter().any(|a| a.id == activity_id)
    }

    pub fn get(&self, activity_id: ActivityId) -> Option<&Arc<ActivityDefinition>> {
        self.activities.iter().find(|a| a.id == activity_id)
    }
}

/// A modifier after the session's capability set has interpreted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierInstance {
    pub acronym: String,
    pub settings: BTreeMap<String, Value>,
    /// False when the capability set does not know this acronym. The
    /// modifier is still carried so consumers see the full list.
    pub recognized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A decoded input frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFrame {
    pub time: f64,
    pub position: Option<Position>,
    pub actions: Vec<String>,
}

/// Append-only frame log for one in-progress activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayBuffer {
    pub frames: Vec<ReplayFrame>,
    pub complete: bool,
    pub latest_header: Option<FrameHeader>,
    /// Status reported by the finished event, once complete.
    pub outcome: Option<SessionStatus>,
}

impl ReplayBuffer {
    pub fn frame_times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }
}

/// Everything a consumer needs to present one user's activity.
#[derive(Clone)]
pub struct SpectatorSession {
    pub user: UserProfile,
    pub activity: Arc<ActivityDefinition>,
    pub capability: Arc<dyn CapabilitySet>,
    pub modifiers: Vec<ModifierInstance>,
    pub started_at: DateTime<Utc>,
}

impl fmt::Debug for SpectatorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectatorSession")
            .field("user", &self.user)
            .field("activity", &self.activity)
            .field("capability", &self.capability.short_name())
            .field("modifiers", &self.modifiers)
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Resolved per-user state for an activity in progress.
///
/// Shared with the consumer as `Arc<GameplayState>`. The synchronizer keeps
/// appending frames until the activity ends; after that nothing mutates it.
pub struct GameplayState {
    user_id: UserId,
    session: SpectatorSession,
    replay: RwLock<ReplayBuffer>,
}

impl GameplayState {
    pub(crate) fn new(user_id: UserId, session: SpectatorSession) -> Self {
        Self {
            user_id,
            session,
            replay: RwLock::new(ReplayBuffer::default()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn session(&self) -> &SpectatorSession {
        &self.session
    }

    /// Copy of the replay buffer at this instant.
    pub fn replay(&self) -> ReplayBuffer {
        self.read_replay().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.read_replay().frames.len()
    }

    pub fn is_complete(&self) -> bool {
        self.read_replay().complete
    }

    pub(crate) fn append_frames(&self, frames: Vec<ReplayFrame>, header: Option<FrameHeader>) {
        let mut replay = self.write_replay();
        replay.frames.extend(frames);
        if header.is_some() {
            replay.latest_header = header;
        }
    }

    pub(crate) fn mark_complete(&self, outcome: SessionStatus) {
        let mut replay = self.write_replay();
        replay.complete = true;
        replay.outcome = Some(outcome);
    }

    // Recover from poisoning - frames are only ever appended, so a panicked
    // writer cannot leave a half-applied buffer behind.
    fn read_replay(&self) -> RwLockReadGuard<'_, ReplayBuffer> {
        self.replay
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_replay(&self) -> RwLockWriteGuard<'_, ReplayBuffer> {
        self.replay
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for GameplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameplayState")
            .field("user_id", &self.user_id)
            .field("session", &self.session)
            .field("replay", &*self.read_replay())
            .finish()
    }
}
