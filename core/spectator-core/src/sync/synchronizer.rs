//! `SpectatorSync`: reconciles feed events against the catalogs.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Utc;
use spectator_protocol::{FeedEvent, FrameBundle, RawSessionState, UserId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::tables::{SyncPhase, SyncSnapshot, SyncTables};
use crate::catalog::{ActivityCatalog, CapabilityCatalog};
use crate::config::SyncConfig;
use crate::feed::SpectatorFeed;
use crate::identity::IdentityResolver;
use crate::lifecycle::{Notification, NotificationSender};
use crate::types::{ActivitySet, GameplayState, SpectatorSession, UserProfile, WatchedUser};

/// External services the synchronizer reconciles against.
#[derive(Clone)]
pub struct SyncCollaborators {
    pub feed: Arc<dyn SpectatorFeed>,
    pub identities: Arc<dyn IdentityResolver>,
    pub activities: Arc<dyn ActivityCatalog>,
    pub capabilities: Arc<dyn CapabilityCatalog>,
}

pub struct SpectatorSync {
    user_ids: Vec<UserId>,
    config: SyncConfig,
    feed: Arc<dyn SpectatorFeed>,
    identities: Arc<dyn IdentityResolver>,
    activities: Arc<dyn ActivityCatalog>,
    capabilities: Arc<dyn CapabilityCatalog>,
    notifications: NotificationSender,
    tables: Mutex<SyncTables>,
    torn_down: watch::Sender<bool>,
}

impl SpectatorSync {
    /// Duplicate ids are collapsed, keeping first-occurrence order.
    pub fn new<I>(
        user_ids: I,
        collaborators: SyncCollaborators,
        notifications: NotificationSender,
        config: SyncConfig,
    ) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut unique = Vec::new();
        for user_id in user_ids {
            if !unique.contains(&user_id) {
                unique.push(user_id);
            }
        }

        let (torn_down, _) = watch::channel(false);
        Self {
            user_ids: unique,
            config,
            feed: collaborators.feed,
            identities: collaborators.identities,
            activities: collaborators.activities,
            capabilities: collaborators.capabilities,
            notifications,
            tables: Mutex::new(SyncTables::default()),
            torn_down,
        }
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn phase(&self) -> SyncPhase {
        self.lock_tables().phase
    }

    /// Flips to `true` once teardown starts. Also closes when the
    /// synchronizer is dropped.
    pub(crate) fn teardown_signal(&self) -> watch::Receiver<bool> {
        self.torn_down.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscription lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Starts identity resolution for every configured user.
    ///
    /// Each resolution runs as its own task; the handles are returned so
    /// callers can await them, and dropping them detaches the tasks. A
    /// second call is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn activate(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        {
            let mut tables = self.lock_tables();
            if tables.phase != SyncPhase::Idle {
                debug!(phase = ?tables.phase, "Activate ignored");
                return Vec::new();
            }
            tables.phase = SyncPhase::Active;
        }
        info!(users = self.user_ids.len(), "Spectator sync activated");

        self.user_ids
            .iter()
            .map(|&user_id| {
                let sync: Weak<Self> = Arc::downgrade(self);
                let identities = Arc::clone(&self.identities);
                tokio::spawn(async move {
                    let profile = identities.resolve(user_id).await;
                    match sync.upgrade() {
                        Some(sync) => sync.apply_identity(user_id, profile),
                        None => debug!(user_id = %user_id, "Identity resolved after sync dropped"),
                    }
                })
            })
            .collect()
    }

    fn apply_identity(&self, user_id: UserId, profile: Option<UserProfile>) {
        let Some(profile) = profile else {
            debug!(user_id = %user_id, "Identity not found; user will not be watched");
            return;
        };

        let mut tables = self.lock_tables();
        if tables.phase != SyncPhase::Active {
            debug!(user_id = %user_id, phase = ?tables.phase, "Identity resolved after teardown");
            return;
        }

        info!(user_id = %user_id, username = %profile.username, "Watching user");
        tables.watched_users.insert(
            user_id,
            WatchedUser {
                id: user_id,
                profile,
            },
        );
        // Inside the lock so teardown cannot slip in between.
        self.feed.watch_user(user_id);
    }

    /// Detaches from the feed and unwatches every watched user. No
    /// notifications are emitted for activities still in progress.
    pub fn teardown(&self) {
        let watched = {
            let mut tables = self.lock_tables();
            if tables.phase == SyncPhase::TornDown {
                return;
            }
            tables.phase = SyncPhase::TornDown;

            let mut watched: Vec<UserId> = tables.watched_users.keys().copied().collect();
            watched.sort();
            let in_progress = tables.gameplay_states.len();
            tables.clear();
            info!(
                watched = watched.len(),
                in_progress, "Spectator sync torn down"
            );
            watched
        };
        self.torn_down.send_replace(true);

        for user_id in watched {
            self.feed.unwatch_user(user_id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Feed callbacks
    // ─────────────────────────────────────────────────────────────────────

    pub fn handle_feed_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Began { user_id, state } => self.on_user_began_activity(user_id, state),
            FeedEvent::Frames { user_id, bundle } => self.on_user_sent_data_batch(user_id, bundle),
            FeedEvent::Finished { user_id, state } => {
                self.on_user_finished_activity(user_id, state)
            }
        }
    }

    pub fn on_user_began_activity(&self, user_id: UserId, state: RawSessionState) {
        if !state.is_resolvable() {
            trace!(user_id = %user_id, "Ignoring began event without references");
            return;
        }

        let mut tables = self.lock_tables();
        if !tables.accepts(user_id) {
            debug!(user_id = %user_id, "Ignoring began event for unwatched user");
            return;
        }

        tables.raw_states.insert(user_id, state.clone());
        self.notifications
            .send(Notification::StateChanged { user_id, state });
        self.try_resolve(&mut tables, user_id);
        tables.debug_check_invariants();
    }

    pub fn on_user_sent_data_batch(&self, user_id: UserId, bundle: FrameBundle) {
        let tables = self.lock_tables();
        if !tables.accepts(user_id) {
            debug!(user_id = %user_id, "Ignoring frames for unwatched user");
            return;
        }
        let Some(gameplay) = tables.gameplay_states.get(&user_id) else {
            debug!(
                user_id = %user_id,
                frames = bundle.frames.len(),
                "Dropping frames; no activity in progress"
            );
            return;
        };

        let capability = &gameplay.session().capability;
        let mut decoded = Vec::with_capacity(bundle.frames.len());
        for frame in &bundle.frames {
            match capability.decode_frame(frame) {
                Ok(replay_frame) => decoded.push(replay_frame),
                Err(err) => warn!(
                    user_id = %user_id,
                    time = frame.time,
                    error = %err,
                    "Skipping undecodable frame"
                ),
            }
        }

        trace!(user_id = %user_id, frames = decoded.len(), "Appending frames");
        gameplay.append_frames(decoded, bundle.header);
    }

    pub fn on_user_finished_activity(&self, user_id: UserId, state: RawSessionState) {
        let mut tables = self.lock_tables();
        if !tables.accepts(user_id) {
            debug!(user_id = %user_id, "Ignoring finished event for unwatched user");
            return;
        }
        let Some(gameplay) = tables.gameplay_states.remove(&user_id) else {
            debug!(user_id = %user_id, "Ignoring finished event; no activity in progress");
            return;
        };

        if !state.status.is_terminal() {
            debug!(
                user_id = %user_id,
                status = %state.status,
                "Finished event carries a non-terminal status"
            );
        }
        gameplay.mark_complete(state.status);
        if self.config.prune_finished_states {
            tables.raw_states.remove(&user_id);
        }

        info!(
            user_id = %user_id,
            status = %state.status,
            frames = gameplay.frame_count(),
            "Activity ended"
        );
        self.notifications
            .send(Notification::ActivityEnded { user_id });
        tables.debug_check_invariants();
    }

    /// Re-resolves every user whose raw state references an activity in
    /// `set`. Users are visited in id order.
    pub fn on_activity_catalog_changed(&self, set: &ActivitySet) {
        let mut tables = self.lock_tables();
        if tables.phase != SyncPhase::Active {
            debug!(set_id = set.id, "Ignoring catalog change; sync not active");
            return;
        }

        let mut affected: Vec<UserId> = tables
            .raw_states
            .iter()
            .filter(|(_, raw)| raw.activity_id.is_some_and(|id| set.contains(id)))
            .map(|(user_id, _)| *user_id)
            .collect();
        affected.sort();

        debug!(set_id = set.id, affected = affected.len(), "Activity catalog changed");
        for user_id in affected {
            self.try_resolve(&mut tables, user_id);
        }
        tables.debug_check_invariants();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolves `user_id`'s raw state into a gameplay state, replacing any
    /// existing one. Unknown references abort silently; a later catalog
    /// change retries.
    fn try_resolve(&self, tables: &mut SyncTables, user_id: UserId) {
        let Some(raw) = tables.raw_states.get(&user_id) else {
            debug_assert!(false, "resolving user {} without raw state", user_id);
            error!(user_id = %user_id, "Resolution requested without raw state");
            return;
        };
        let (Some(activity_id), Some(capability_id)) = (raw.activity_id, raw.capability_id)
        else {
            return;
        };

        let Some(capability) = self.capabilities.lookup(capability_id) else {
            debug!(
                user_id = %user_id,
                capability_id = %capability_id,
                "Capability unavailable; resolution deferred"
            );
            return;
        };
        let Some(activity) = self.activities.query(activity_id) else {
            debug!(
                user_id = %user_id,
                activity_id = %activity_id,
                "Activity unavailable; resolution deferred"
            );
            return;
        };
        let Some(watched) = tables.watched_users.get(&user_id) else {
            debug_assert!(false, "resolving user {} who is not watched", user_id);
            error!(user_id = %user_id, "Resolution requested for unwatched user");
            return;
        };

        let modifiers = raw
            .modifiers
            .iter()
            .map(|descriptor| capability.create_modifier(descriptor))
            .collect();
        let session = SpectatorSession {
            user: watched.profile.clone(),
            activity,
            capability,
            modifiers,
            started_at: Utc::now(),
        };
        let gameplay = Arc::new(GameplayState::new(user_id, session));

        if tables
            .gameplay_states
            .insert(user_id, Arc::clone(&gameplay))
            .is_some()
        {
            debug!(user_id = %user_id, "Replacing gameplay state");
        }
        info!(
            user_id = %user_id,
            activity_id = %activity_id,
            capability = gameplay.session().capability.short_name(),
            "Activity started"
        );
        self.notifications
            .send(Notification::ActivityStarted { user_id, gameplay });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SyncSnapshot {
        self.lock_tables().snapshot()
    }

    pub fn watched_user(&self, user_id: UserId) -> Option<WatchedUser> {
        self.lock_tables().watched_users.get(&user_id).cloned()
    }

    pub fn raw_state(&self, user_id: UserId) -> Option<RawSessionState> {
        self.lock_tables().raw_states.get(&user_id).cloned()
    }

    pub fn gameplay_state(&self, user_id: UserId) -> Option<Arc<GameplayState>> {
        self.lock_tables().gameplay_states.get(&user_id).cloned()
    }

    fn lock_tables(&self) -> MutexGuard<'_, SyncTables> {
        // Tables only move forward, so state left by a panicked holder is
        // still consistent enough to keep serving.
        self.tables.lock().unwrap_or_else(|poisoned| {
            warn!("Sync tables lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

impl Drop for SpectatorSync {
    fn drop(&mut self) {
        self.teardown();
    }
}
