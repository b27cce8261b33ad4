//! Drives a synchronizer from a config fixture and a feed script.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use spectator_core::{
    notification_channel, spawn_dispatcher, ActivityId, ActivitySet, DetachedFeed, GameplayState,
    InMemoryActivityCatalog, LifecycleConsumer, ModifierInstance, RawSessionState, Result,
    SessionStatus, SpectatorConfig, SpectatorError, SpectatorSync, StaticCapabilityCatalog,
    StaticIdentityResolver, SyncCollaborators, SyncSnapshot, UserId,
};
use spectator_protocol::ErrorInfo;
use tracing::{debug, info, warn};

use crate::script::{parse_line, ScriptStep};

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Overrides the config's watch list when non-empty.
    pub watch: Vec<UserId>,
    /// Abort on the first invalid line instead of skipping it.
    pub strict: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub steps: usize,
    pub rejected: usize,
    pub notifications: usize,
    pub final_state: SyncSnapshot,
    pub sessions: Vec<SessionSummary>,
}

/// One activity the consumer saw start, as it stood when the replay ended.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub user_id: UserId,
    pub username: String,
    pub activity_id: ActivityId,
    pub version: String,
    pub capability: String,
    pub modifiers: Vec<ModifierInstance>,
    pub frames: usize,
    pub complete: bool,
    pub outcome: Option<SessionStatus>,
    pub latest_score: Option<i64>,
}

impl SessionSummary {
    fn from_gameplay(gameplay: &GameplayState) -> Self {
        let session = gameplay.session();
        let replay = gameplay.replay();
        Self {
            user_id: gameplay.user_id(),
            username: session.user.username.clone(),
            activity_id: session.activity.id,
            version: session.activity.version.clone(),
            capability: session.capability.short_name().to_string(),
            modifiers: session.modifiers.clone(),
            frames: replay.frames.len(),
            complete: replay.complete,
            outcome: replay.outcome,
            latest_score: replay.latest_header.map(|header| header.total_score),
        }
    }
}

/// Logs every notification and keeps the started activities for the summary.
#[derive(Default)]
struct LoggingConsumer {
    started: Mutex<Vec<Arc<GameplayState>>>,
}

impl LoggingConsumer {
    fn sessions(&self) -> Vec<SessionSummary> {
        self.lock_started()
            .iter()
            .map(|gameplay| SessionSummary::from_gameplay(gameplay))
            .collect()
    }

    fn lock_started(&self) -> MutexGuard<'_, Vec<Arc<GameplayState>>> {
        self.started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LifecycleConsumer for LoggingConsumer {
    fn on_state_changed(&self, user_id: UserId, state: &RawSessionState) {
        info!(
            user_id = %user_id,
            activity_id = ?state.activity_id.map(ActivityId::get),
            status = %state.status,
            "State changed"
        );
    }

    fn on_activity_started(&self, user_id: UserId, gameplay: Arc<GameplayState>) {
        let session = gameplay.session();
        info!(
            user_id = %user_id,
            username = %session.user.username,
            activity_id = %session.activity.id,
            capability = session.capability.short_name(),
            modifiers = session.modifiers.len(),
            "Activity started"
        );
        self.lock_started().push(gameplay);
    }

    fn on_activity_ended(&self, user_id: UserId) {
        info!(user_id = %user_id, "Activity ended");
    }
}

/// Replays `script` against collaborators built from `config`.
///
/// Steps are applied in file order on the calling task, so catalog steps
/// land exactly between the feed events around them.
pub async fn replay(
    config: SpectatorConfig,
    script: &str,
    options: &ReplayOptions,
) -> Result<ReplaySummary> {
    let activities = Arc::new(InMemoryActivityCatalog::from_fixtures(&config.activity_sets));
    let capabilities = StaticCapabilityCatalog::from_fixtures(&config.capabilities)?;
    let identities = StaticIdentityResolver::new(config.users.iter().cloned());
    let watch = if options.watch.is_empty() {
        config.watch.clone()
    } else {
        options.watch.clone()
    };

    let (notifications, receiver) = notification_channel();
    let consumer = Arc::new(LoggingConsumer::default());
    let dispatcher = spawn_dispatcher(consumer.clone(), receiver);

    let sync = Arc::new(SpectatorSync::new(
        watch,
        SyncCollaborators {
            feed: Arc::new(DetachedFeed),
            identities: Arc::new(identities),
            activities: activities.clone(),
            capabilities: Arc::new(capabilities),
        },
        notifications,
        config.sync.clone(),
    ));

    for handle in sync.activate() {
        if let Err(err) = handle.await {
            warn!(error = %err, "Identity resolution task failed");
        }
    }
    info!(watched = sync.snapshot().watched.len(), "Replay started");

    let mut steps = 0;
    let mut rejected = 0;
    for (index, line) in script.lines().enumerate() {
        let line_no = index + 1;
        match parse_line(line) {
            Ok(None) => {}
            Ok(Some(ScriptStep::Feed(event))) => {
                debug!(
                    line = line_no,
                    kind = event.kind(),
                    user_id = %event.user_id(),
                    "Applying feed event"
                );
                sync.handle_feed_event(event);
                steps += 1;
            }
            Ok(Some(ScriptStep::PublishSet(fixture))) => {
                debug!(line = line_no, set_id = fixture.id, "Publishing activity set");
                let set = activities.publish(ActivitySet::from_fixture(&fixture));
                sync.on_activity_catalog_changed(&set);
                steps += 1;
            }
            Err(err) if options.strict => {
                return Err(SpectatorError::Protocol(ErrorInfo::new(
                    &err.code,
                    format!("line {}: {}", line_no, err.message),
                )));
            }
            Err(err) => {
                warn!(line = line_no, error = %err, "Skipping script line");
                rejected += 1;
            }
        }
    }

    let final_state = sync.snapshot();
    sync.teardown();
    // Last strong handle; dropping it closes the notification stream.
    drop(sync);
    let notifications = dispatcher.join().await;
    info!(steps, rejected, notifications, "Replay finished");

    Ok(ReplaySummary {
        steps,
        rejected,
        notifications,
        final_state,
        sessions: consumer.sessions(),
    })
}
