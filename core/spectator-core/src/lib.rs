//! # spectator-core
//!
//! Keeps a consistent local replica of what a set of remote users are doing,
//! driven by a push-based spectator feed and resolved against an activity
//! catalog and a capability catalog.
//!
//! ## Design Principles
//!
//! - **Reactive**: The synchronizer performs no I/O and runs no loops of its
//!   own. Feed events, catalog changes and identity results call into it.
//! - **One lock**: All per-user tables sit behind a single mutex, and every
//!   catalog lookup made during resolution happens under it.
//! - **Silent degradation**: Malformed events, unknown users and unresolvable
//!   references are dropped, never surfaced to the consumer.
//! - **Ordered delivery**: Lifecycle notifications are queued under the lock
//!   and delivered serially on a context the consumer chooses.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spectator_core::*;
//!
//! let (tx, rx) = notification_channel();
//! let sync = Arc::new(SpectatorSync::new(user_ids, collaborators, tx, SyncConfig::default()));
//! let _dispatcher = spawn_dispatcher(consumer, rx);
//! sync.activate();
//! // feed transport calls sync.handle_feed_event(event) ...
//! sync.teardown();
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod lifecycle;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use catalog::{
    ActivityCatalog, ButtonBinding, ButtonCapabilitySet, CapabilityCatalog, CapabilitySet,
    InMemoryActivityCatalog, StaticCapabilityCatalog,
};
pub use config::{load_config, SpectatorConfig, SyncConfig};
pub use error::{DecodeError, Result, SpectatorError};
pub use feed::{DetachedFeed, SpectatorFeed};
pub use identity::{IdentityResolver, StaticIdentityResolver};
pub use lifecycle::{
    notification_channel, spawn_dispatcher, DispatcherHandle, LifecycleConsumer, Notification,
    NotificationReceiver, NotificationSender,
};
pub use sync::{
    forward_catalog_changes, forward_feed_events, SpectatorSync, SyncCollaborators, SyncPhase,
    SyncSnapshot,
};
pub use types::*;

pub use spectator_protocol::{
    ActivityId, CapabilityId, FeedEvent, FrameBundle, FrameHeader, ModifierDescriptor, RawFrame,
    RawSessionState, SessionStatus, UserId,
};
