//! Button-bitmask capability sets and a fixed capability catalog.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spectator_protocol::{CapabilityId, ModifierDescriptor, RawFrame};

use super::{CapabilityCatalog, CapabilitySet};
use crate::config::{CapabilityFixture, CapabilityKind};
use crate::error::{DecodeError, Result, SpectatorError};
use crate::types::{ModifierInstance, Position, ReplayFrame};

/// Maps one bit of a raw frame's button mask to a named action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub bit: u8,
    pub action: String,
}

/// Capability set for activities whose input is a button bitmask,
/// optionally paired with a cursor position.
#[derive(Debug, Clone)]
pub struct ButtonCapabilitySet {
    id: CapabilityId,
    short_name: String,
    uses_position: bool,
    buttons: Vec<ButtonBinding>,
    modifiers: BTreeSet<String>,
}

impl ButtonCapabilitySet {
    pub fn new(
        id: CapabilityId,
        short_name: impl Into<String>,
        uses_position: bool,
        buttons: Vec<ButtonBinding>,
    ) -> Self {
        Self {
            id,
            short_name: short_name.into(),
            uses_position,
            buttons,
            modifiers: BTreeSet::new(),
        }
    }

    pub fn with_modifiers<I, S>(mut self, acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = acronyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_fixture(fixture: &CapabilityFixture) -> Result<Self> {
        if let Some(binding) = fixture.buttons.iter().find(|b| b.bit >= 8) {
            return Err(SpectatorError::InvalidFixture(format!(
                "capability {} binds bit {} but button masks are 8 bits",
                fixture.id, binding.bit
            )));
        }
        let set = match fixture.kind {
            CapabilityKind::Buttons => Self::new(
                fixture.id,
                fixture.short_name.clone(),
                fixture.uses_position,
                fixture.buttons.clone(),
            ),
        };
        Ok(set.with_modifiers(fixture.modifiers.iter().cloned()))
    }
}

impl CapabilitySet for ButtonCapabilitySet {
    fn id(&self) -> CapabilityId {
        self.id
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn create_modifier(&self, descriptor: &ModifierDescriptor) -> ModifierInstance {
        ModifierInstance {
            acronym: descriptor.acronym.clone(),
            settings: descriptor.settings.clone(),
            recognized: self.modifiers.contains(&descriptor.acronym),
        }
    }

    fn decode_frame(&self, frame: &RawFrame) -> std::result::Result<ReplayFrame, DecodeError> {
        if !frame.time.is_finite() {
            return Err(DecodeError::NonFiniteTime(frame.time));
        }

        let position = if self.uses_position {
            if !frame.x.is_finite() || !frame.y.is_finite() {
                return Err(DecodeError::NonFinitePosition {
                    x: frame.x,
                    y: frame.y,
                });
            }
            Some(Position {
                x: frame.x,
                y: frame.y,
            })
        } else {
            None
        };

        // Unbound bits are ignored.
        let actions = self
            .buttons
            .iter()
            .filter(|binding| frame.buttons & (1u8 << binding.bit) != 0)
            .map(|binding| binding.action.clone())
            .collect();

        Ok(ReplayFrame {
            time: frame.time,
            position,
            actions,
        })
    }
}

/// Capability catalog fixed at construction.
#[derive(Default)]
pub struct StaticCapabilityCatalog {
    sets: HashMap<CapabilityId, Arc<dyn CapabilitySet>>,
}

impl StaticCapabilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, set: Arc<dyn CapabilitySet>) -> Self {
        self.register(set);
        self
    }

    pub fn register(&mut self, set: Arc<dyn CapabilitySet>) {
        self.sets.insert(set.id(), set);
    }

    pub fn from_fixtures(fixtures: &[CapabilityFixture]) -> Result<Self> {
        let mut catalog = Self::new();
        for fixture in fixtures {
            if catalog.sets.contains_key(&fixture.id) {
                return Err(SpectatorError::InvalidFixture(format!(
                    "capability {} is declared twice",
                    fixture.id
                )));
            }
            catalog.register(Arc::new(ButtonCapabilitySet::from_fixture(fixture)?));
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl CapabilityCatalog for StaticCapabilityCatalog {
    fn lookup(&self, capability_id: CapabilityId) -> Option<Arc<dyn CapabilitySet>> {
        self.sets.get(&capability_id).cloned()
    }
}
