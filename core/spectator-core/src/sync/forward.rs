//! Channel pumps for hosts that receive feed events and catalog changes
//! as streams instead of direct callbacks.
//!
//! Both pumps hold the synchronizer weakly and watch its teardown signal, so
//! teardown (or dropping the last strong handle) ends them even while the
//! channel stays open and idle. The receiver is dropped when a pump ends.

use std::sync::{Arc, Weak};

use spectator_protocol::FeedEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::synchronizer::SpectatorSync;
use super::tables::SyncPhase;
use crate::types::ActivitySet;

/// Applies feed events in arrival order until the channel closes or the
/// synchronizer is torn down. Returns how many events were applied.
pub async fn forward_feed_events(
    sync: Arc<SpectatorSync>,
    mut events: mpsc::Receiver<FeedEvent>,
) -> usize {
    let mut torn_down = sync.teardown_signal();
    let weak = Arc::downgrade(&sync);
    drop(sync);
    let mut applied = 0;

    loop {
        tokio::select! {
            biased;
            _ = wait_for_teardown(&mut torn_down) => {
                debug!("Feed forwarding stopped; sync torn down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(sync) = live(&weak) else {
                    debug!(kind = event.kind(), "Feed forwarding stopped; sync torn down");
                    break;
                };
                sync.handle_feed_event(event);
                applied += 1;
            }
        }
    }

    debug!(applied, "Feed forwarding finished");
    applied
}

/// Applies activity catalog changes until the channel closes or the
/// synchronizer is torn down. Lagging loses the skipped changes.
pub async fn forward_catalog_changes(
    sync: Arc<SpectatorSync>,
    mut changes: broadcast::Receiver<Arc<ActivitySet>>,
) -> usize {
    let mut torn_down = sync.teardown_signal();
    let weak = Arc::downgrade(&sync);
    drop(sync);
    let mut applied = 0;

    loop {
        tokio::select! {
            biased;
            _ = wait_for_teardown(&mut torn_down) => {
                debug!("Catalog forwarding stopped; sync torn down");
                break;
            }
            change = changes.recv() => match change {
                Ok(set) => {
                    let Some(sync) = live(&weak) else {
                        debug!(set_id = set.id, "Catalog forwarding stopped; sync torn down");
                        break;
                    };
                    sync.on_activity_catalog_changed(&set);
                    applied += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Catalog change stream lagged; changes were lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    debug!(applied, "Catalog forwarding finished");
    applied
}

/// Resolves once teardown has started or the synchronizer is gone.
async fn wait_for_teardown(signal: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped along with the synchronizer.
    let _ = signal.wait_for(|torn_down| *torn_down).await;
}

fn live(sync: &Weak<SpectatorSync>) -> Option<Arc<SpectatorSync>> {
    sync.upgrade()
        .filter(|sync| sync.phase() != SyncPhase::TornDown)
}
