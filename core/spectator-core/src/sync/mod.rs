//! Live spectator state synchronization.
//!
//! Keeps a local replica of what each watched user is doing, reconciled
//! against the activity and capability catalogs.
//!
//! ```text
//! Feed ──events──▶ SpectatorSync ──lookups──▶ Activity / Capability catalogs
//!                      │  ▲
//!                      │  └── identity resolution (async, once per user)
//!                      ▼
//!              NotificationSender ──▶ consumer's serial context
//! ```
//!
//! # Tables
//!
//! One mutex guards three maps keyed by user id:
//!
//! 1. **watched users**: filled as identity resolution succeeds, cleared only
//!    at teardown.
//! 2. **raw states**: the latest began payload per user, overwritten on every
//!    began event.
//! 3. **gameplay states**: present only while an activity is in progress.
//!
//! gameplay ⇒ raw ⇒ watched holds after every critical section; debug builds
//! check it.
//!
//! # Ordering
//!
//! Every notification is enqueued while the lock is held, so for a single
//! user the consumer always sees state-changed, activity-started and
//! activity-ended in the order the feed produced them. Nothing is promised
//! across users.
//!
//! # Module Structure
//!
//! - `tables`: the guarded maps, [`SyncPhase`] and [`SyncSnapshot`]
//! - `synchronizer`: [`SpectatorSync`] feed callbacks, resolution, teardown
//! - `forward`: [`forward_feed_events`] and [`forward_catalog_changes`] for
//!   stream-based hosts

mod forward;
mod synchronizer;
mod tables;


pub use forward::{forward_catalog_changes, forward_feed_events};
pub use synchronizer::{SpectatorSync, SyncCollaborators};
pub use tables::{SyncPhase, SyncSnapshot};
