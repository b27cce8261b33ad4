//! In-memory activity catalog with a broadcast change stream.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use spectator_protocol::ActivityId;
use tokio::sync::broadcast;

use super::ActivityCatalog;
use crate::config::ActivitySetFixture;
use crate::types::{ActivityDefinition, ActivitySet};

pub const CATALOG_CHANGE_CAPACITY: usize = 64;

struct CatalogIndex {
    sets: HashMap<u64, Arc<ActivitySet>>,
    activities: HashMap<ActivityId, Arc<ActivityDefinition>>,
}

pub struct InMemoryActivityCatalog {
    index: RwLock<CatalogIndex>,
    changes: broadcast::Sender<Arc<ActivitySet>>,
}

impl InMemoryActivityCatalog {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CATALOG_CHANGE_CAPACITY);
        Self {
            index: RwLock::new(CatalogIndex {
                sets: HashMap::new(),
                activities: HashMap::new(),
            }),
            changes,
        }
    }

    /// Builds a catalog already holding the fixture sets. Nothing is
    /// broadcast for them since no one can be subscribed yet.
    pub fn from_fixtures(fixtures: &[ActivitySetFixture]) -> Self {
        let catalog = Self::new();
        for fixture in fixtures {
            catalog.insert(ActivitySet::from_fixture(fixture));
        }
        catalog
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ActivitySet>> {
        self.changes.subscribe()
    }

    /// Inserts or replaces a set and notifies subscribers.
    pub fn publish(&self, set: ActivitySet) -> Arc<ActivitySet> {
        let set = self.insert(set);
        // No subscribers is fine; the catalog is still updated.
        let receivers = self.changes.send(Arc::clone(&set)).unwrap_or(0);
        tracing::debug!(set_id = set.id, receivers, "Activity set published");
        set
    }

    pub fn set(&self, set_id: u64) -> Option<Arc<ActivitySet>> {
        self.read_index().sets.get(&set_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_index().activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, set: ActivitySet) -> Arc<ActivitySet> {
        let set = Arc::new(set);
        let mut index = self
            .index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = index.sets.insert(set.id, Arc::clone(&set)) {
            // Ids a later set has taken over stay with that set.
            for activity in &previous.activities {
                let owned = index
                    .activities
                    .get(&activity.id)
                    .is_some_and(|current| Arc::ptr_eq(current, activity));
                if owned {
                    index.activities.remove(&activity.id);
                }
            }
        }
        for activity in &set.activities {
            index.activities.insert(activity.id, Arc::clone(activity));
        }
        set
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, CatalogIndex> {
        self.index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryActivityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityCatalog for InMemoryActivityCatalog {
    fn query(&self, activity_id: ActivityId) -> Option<Arc<ActivityDefinition>> {
        self.read_index().activities.get(&activity_id).cloned()
    }
}

impl ActivitySet {
    pub fn from_fixture(fixture: &ActivitySetFixture) -> Self {
        Self {
            id: fixture.id,
            title: fixture.title.clone(),
            artist: fixture.artist.clone(),
            activities: fixture
                .activities
                .iter()
                .map(|a| {
                    Arc::new(ActivityDefinition {
                        id: a.id,
                        set_id: fixture.id,
                        version: a.version.clone(),
                        capability_id: a.capability_id,
                        length_ms: a.length_ms,
                    })
                })
                .collect(),
        }
    }
}
