//! Recording doubles and fixtures shared by unit tests.

use std::sync::{Arc, Mutex};

use spectator_protocol::{ActivityId, CapabilityId, RawSessionState, UserId};

use crate::catalog::{ButtonBinding, ButtonCapabilitySet, InMemoryActivityCatalog, StaticCapabilityCatalog};
use crate::config::SyncConfig;
use crate::feed::SpectatorFeed;
use crate::identity::StaticIdentityResolver;
use crate::lifecycle::{notification_channel, LifecycleConsumer, NotificationReceiver};
use crate::sync::{SpectatorSync, SyncCollaborators};
use crate::types::{ActivityDefinition, ActivitySet, GameplayState, UserProfile};

pub const OSU: CapabilityId = CapabilityId(3);

/// Records feed commands as "watch:<id>" / "unwatch:<id>".
#[derive(Default)]
pub struct RecordingFeed {
    commands: Mutex<Vec<String>>,
}

impl RecordingFeed {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl SpectatorFeed for RecordingFeed {
    fn watch_user(&self, user_id: UserId) {
        self.commands.lock().unwrap().push(format!("watch:{}", user_id));
    }

    fn unwatch_user(&self, user_id: UserId) {
        self.commands.lock().unwrap().push(format!("unwatch:{}", user_id));
    }
}

/// Records notifications as "<kind>:<id>" and keeps started gameplay states.
#[derive(Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<String>>,
    started: Mutex<Vec<Arc<GameplayState>>>,
}

impl RecordingConsumer {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<Arc<GameplayState>> {
        self.started.lock().unwrap().clone()
    }
}

impl LifecycleConsumer for RecordingConsumer {
    fn on_state_changed(&self, user_id: UserId, _state: &RawSessionState) {
        self.events
            .lock()
            .unwrap()
            .push(format!("state_changed:{}", user_id));
    }

    fn on_activity_started(&self, user_id: UserId, gameplay: Arc<GameplayState>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("activity_started:{}", user_id));
        self.started.lock().unwrap().push(gameplay);
    }

    fn on_activity_ended(&self, user_id: UserId) {
        self.events
            .lock()
            .unwrap()
            .push(format!("activity_ended:{}", user_id));
    }
}

pub fn osu_capability() -> ButtonCapabilitySet {
    ButtonCapabilitySet::new(
        OSU,
        "osu",
        true,
        vec![
            ButtonBinding {
                bit: 0,
                action: "left".to_string(),
            },
            ButtonBinding {
                bit: 1,
                action: "right".to_string(),
            },
        ],
    )
    .with_modifiers(["HD", "HR", "DT"])
}

pub fn activity_set(set_id: u64, activity_ids: &[u64]) -> ActivitySet {
    ActivitySet {
        id: set_id,
        title: format!("Set {}", set_id),
        artist: "Artist".to_string(),
        activities: activity_ids
            .iter()
            .map(|id| {
                Arc::new(ActivityDefinition {
                    id: ActivityId(*id),
                    set_id,
                    version: format!("v{}", id),
                    capability_id: OSU,
                    length_ms: 90_000,
                })
            })
            .collect(),
    }
}

/// A synchronizer wired to recording doubles.
pub struct Harness {
    pub sync: Arc<SpectatorSync>,
    pub feed: Arc<RecordingFeed>,
    pub activities: Arc<InMemoryActivityCatalog>,
    pub notifications: NotificationReceiver,
}

impl Harness {
    /// Watches `user_ids`; every id in `known` resolves to "user<id>".
    pub fn new(user_ids: &[u64], known: &[u64], config: SyncConfig) -> Self {
        let feed = Arc::new(RecordingFeed::default());
        let activities = Arc::new(InMemoryActivityCatalog::new());
        let capabilities = StaticCapabilityCatalog::new().with(Arc::new(osu_capability()));
        let identities = StaticIdentityResolver::new(
            known
                .iter()
                .map(|id| UserProfile::new(UserId(*id), format!("user{}", id))),
        );
        let (tx, rx) = notification_channel();

        let sync = Arc::new(SpectatorSync::new(
            user_ids.iter().map(|id| UserId(*id)),
            SyncCollaborators {
                feed: feed.clone(),
                identities: Arc::new(identities),
                activities: activities.clone(),
                capabilities: Arc::new(capabilities),
            },
            tx,
            config,
        ));

        Self {
            sync,
            feed,
            activities,
            notifications: rx,
        }
    }

    /// Activates and waits for every identity resolution to land.
    pub async fn activate(&self) {
        for handle in self.sync.activate() {
            handle.await.expect("identity task");
        }
    }

    /// Queued notifications rendered as "<kind>:<id>".
    pub fn drain(&mut self) -> Vec<String> {
        self.notifications
            .drain()
            .into_iter()
            .map(|n| format!("{}:{}", n.kind(), n.user_id()))
            .collect()
    }
}
