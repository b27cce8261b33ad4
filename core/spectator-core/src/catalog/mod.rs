//! Reference-data seams: the activity catalog and the capability catalog.
//!
//! Both lookups run inside the synchronizer's critical section, so
//! implementations must answer from memory. A catalog that needs network
//! I/O should fetch ahead of time and publish a change notification once
//! the data is available.

mod activity;
mod capability;

pub use activity::{InMemoryActivityCatalog, CATALOG_CHANGE_CAPACITY};
pub use capability::{ButtonBinding, ButtonCapabilitySet, StaticCapabilityCatalog};

use std::sync::Arc;

use spectator_protocol::{ActivityId, CapabilityId, ModifierDescriptor, RawFrame};

use crate::error::DecodeError;
use crate::types::{ActivityDefinition, ModifierInstance, ReplayFrame};

/// Synchronous activity-definition lookup.
pub trait ActivityCatalog: Send + Sync {
    /// Returns None when the definition is not available locally (yet).
    fn query(&self, activity_id: ActivityId) -> Option<Arc<ActivityDefinition>>;
}

/// Synchronous capability-set lookup.
pub trait CapabilityCatalog: Send + Sync {
    /// Returns None for unknown or unsupported capability ids.
    fn lookup(&self, capability_id: CapabilityId) -> Option<Arc<dyn CapabilitySet>>;
}

/// Interprets modifiers and input frames for one kind of activity.
///
/// Implementors should:
/// - Decode frames without blocking; decoding runs under the sync lock
/// - Preserve the raw frame's timestamp exactly
/// - Never panic on hostile input; return a `DecodeError` instead
pub trait CapabilitySet: Send + Sync {
    fn id(&self) -> CapabilityId;

    /// Short machine name (e.g., "osu", "taiko")
    fn short_name(&self) -> &str;

    /// Turn a wire modifier into an instance. Unknown acronyms are kept as
    /// unrecognized instances rather than rejected.
    fn create_modifier(&self, descriptor: &ModifierDescriptor) -> ModifierInstance {
        ModifierInstance {
            acronym: descriptor.acronym.clone(),
            settings: descriptor.settings.clone(),
            recognized: false,
        }
    }

    fn decode_frame(&self, frame: &RawFrame) -> Result<ReplayFrame, DecodeError>;
}
