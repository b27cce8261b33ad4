//! Subscription control for the spectator feed.
//!
//! Feed callbacks flow the other way, into `SpectatorSync::handle_feed_event`
//! (or the per-kind `on_user_*` methods).

use spectator_protocol::UserId;

/// Fire-and-forget subscription commands sent to the feed transport.
///
/// `watch_user` is called while the synchronizer lock is held, so a watch is
/// never issued after teardown. `unwatch_user` is called after the lock is
/// released. Both must be non-blocking: queue the command and return.
pub trait SpectatorFeed: Send + Sync {
    fn watch_user(&self, user_id: UserId);

    fn unwatch_user(&self, user_id: UserId);
}

/// Feed that drops every command. Useful when events are replayed from a
/// recording rather than a live transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedFeed;

impl SpectatorFeed for DetachedFeed {
    fn watch_user(&self, user_id: UserId) {
        tracing::trace!(user_id = %user_id, "watch ignored by detached feed");
    }

    fn unwatch_user(&self, user_id: UserId) {
        tracing::trace!(user_id = %user_id, "unwatch ignored by detached feed");
    }
}
