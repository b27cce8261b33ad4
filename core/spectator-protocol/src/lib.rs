//! Feed protocol types and validation for the spectator synchronizer.
//!
//! This crate is shared by the synchronizer and whatever transport delivers
//! feed events to it, so the two cannot drift apart. Validation here only
//! rejects payloads that are structurally unusable; incomplete began events
//! (missing activity or capability ids) are valid on the wire and are
//! dropped later by the synchronizer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_FRAMES_PER_BUNDLE: usize = 1024;
pub const MAX_MODIFIERS: usize = 64;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a remote user.
    UserId(u64)
);
id_type!(
    /// Reference into the activity catalog.
    ActivityId(u64)
);
id_type!(
    /// Reference into the capability catalog.
    CapabilityId(u32)
);

/// What the remote user is doing, as reported by the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Playing,
    Paused,
    Passed,
    Failed,
    Quit,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Playing => "playing",
            SessionStatus::Paused => "paused",
            SessionStatus::Passed => "passed",
            SessionStatus::Failed => "failed",
            SessionStatus::Quit => "quit",
        }
    }

    /// True for statuses that describe how an activity ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Passed | SessionStatus::Failed | SessionStatus::Quit
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A modifier as it travels on the wire: an acronym plus free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDescriptor {
    pub acronym: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, Value>,
}

impl ModifierDescriptor {
    pub fn new(acronym: impl Into<String>) -> Self {
        Self {
            acronym: acronym.into(),
            settings: BTreeMap::new(),
        }
    }
}

/// Latest "this user started doing X" payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSessionState {
    #[serde(default)]
    pub activity_id: Option<ActivityId>,
    #[serde(default)]
    pub capability_id: Option<CapabilityId>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDescriptor>,
    #[serde(default)]
    pub status: SessionStatus,
}

impl RawSessionState {
    pub fn playing(activity_id: ActivityId, capability_id: CapabilityId) -> Self {
        Self {
            activity_id: Some(activity_id),
            capability_id: Some(capability_id),
            modifiers: Vec::new(),
            status: SessionStatus::Playing,
        }
    }

    /// Both catalog references are present, so the state can be resolved.
    pub fn is_resolvable(&self) -> bool {
        self.activity_id.is_some() && self.capability_id.is_some()
    }
}

/// One undecoded input frame. Interpretation of `buttons` and the cursor
/// position belongs to the capability set the session resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub time: f64,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub buttons: u8,
}

impl RawFrame {
    pub fn at(time: f64) -> Self {
        Self {
            time,
            x: 0.0,
            y: 0.0,
            buttons: 0,
        }
    }
}

/// Live score statistics sent alongside a frame bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameHeader {
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub combo: u32,
    #[serde(default)]
    pub max_combo: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statistics: BTreeMap<String, u32>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameBundle {
    #[serde(default)]
    pub header: Option<FrameHeader>,
    pub frames: Vec<RawFrame>,
}

impl FrameBundle {
    pub fn from_frames(frames: Vec<RawFrame>) -> Self {
        Self {
            header: None,
            frames,
        }
    }
}

/// Events pushed by the spectator feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    Began {
        user_id: UserId,
        state: RawSessionState,
    },
    Frames {
        user_id: UserId,
        bundle: FrameBundle,
    },
    Finished {
        user_id: UserId,
        state: RawSessionState,
    },
}

impl FeedEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            FeedEvent::Began { user_id, .. }
            | FeedEvent::Frames { user_id, .. }
            | FeedEvent::Finished { user_id, .. } => *user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::Began { .. } => "began",
            FeedEvent::Frames { .. } => "frames",
            FeedEvent::Finished { .. } => "finished",
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.user_id().get() == 0 {
            return Err(ErrorInfo::new("invalid_user_id", "user_id must be non-zero"));
        }

        match self {
            FeedEvent::Began { state, .. } | FeedEvent::Finished { state, .. } => {
                validate_modifiers(&state.modifiers)
            }
            FeedEvent::Frames { bundle, .. } => {
                if bundle.frames.len() > MAX_FRAMES_PER_BUNDLE {
                    return Err(ErrorInfo::new(
                        "bundle_too_large",
                        format!(
                            "bundle carries {} frames, limit is {}",
                            bundle.frames.len(),
                            MAX_FRAMES_PER_BUNDLE
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

pub fn parse_event(params: Value) -> Result<FeedEvent, ErrorInfo> {
    let event: FeedEvent = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_event",
            format!("feed event payload is invalid: {}", err),
        )
    })?;
    event.validate()?;
    Ok(event)
}

/// Parses one line of a JSON-lines feed stream.
pub fn parse_event_line(line: &str) -> Result<FeedEvent, ErrorInfo> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("feed line is not JSON: {}", err))
    })?;
    parse_event(value)
}

fn validate_modifiers(modifiers: &[ModifierDescriptor]) -> Result<(), ErrorInfo> {
    if modifiers.len() > MAX_MODIFIERS {
        return Err(ErrorInfo::new(
            "too_many_modifiers",
            format!("at most {} modifiers are allowed", MAX_MODIFIERS),
        ));
    }
    if modifiers.iter().any(|m| m.acronym.trim().is_empty()) {
        return Err(ErrorInfo::new(
            "missing_field",
            "modifier acronym is required",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_began_event() {
        let event = parse_event(json!({
            "type": "began",
            "user_id": 7,
            "state": {
                "activity_id": 42,
                "capability_id": 3,
                "modifiers": [{"acronym": "HD"}],
                "status": "playing"
            }
        }))
        .expect("parse began");

        match event {
            FeedEvent::Began { user_id, state } => {
                assert_eq!(user_id, UserId(7));
                assert_eq!(state.activity_id, Some(ActivityId(42)));
                assert_eq!(state.capability_id, Some(CapabilityId(3)));
                assert_eq!(state.modifiers, vec![ModifierDescriptor::new("HD")]);
                assert_eq!(state.status, SessionStatus::Playing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn began_without_references_is_valid_on_the_wire() {
        let event = parse_event(json!({"type": "began", "user_id": 7, "state": {}}))
            .expect("parse began");
        match event {
            FeedEvent::Began { state, .. } => {
                assert!(!state.is_resolvable());
                assert_eq!(state.status, SessionStatus::Idle);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_frames_with_header() {
        let event = parse_event_line(
            r#"{"type":"frames","user_id":7,"bundle":{"header":{"total_score":1200,"combo":4,"received_at":"2026-01-30T12:00:00Z"},"frames":[{"time":100.0,"x":1.5,"y":2.5,"buttons":1},{"time":150.0}]}}"#,
        )
        .expect("parse frames");

        match event {
            FeedEvent::Frames { bundle, .. } => {
                assert_eq!(bundle.frames.len(), 2);
                assert_eq!(bundle.frames[1], RawFrame::at(150.0));
                let header = bundle.header.expect("header");
                assert_eq!(header.total_score, 1200);
                assert_eq!(header.combo, 4);
                assert_eq!(header.received_at.to_rfc3339(), "2026-01-30T12:00:00+00:00");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn rejects_zero_user_id() {
        let err = parse_event(json!({"type": "finished", "user_id": 0, "state": {}}))
            .expect_err("zero user id");
        assert_eq!(err.code, "invalid_user_id");
    }

    #[test]
    fn rejects_oversized_bundle() {
        let event = FeedEvent::Frames {
            user_id: UserId(7),
            bundle: FrameBundle::from_frames(vec![RawFrame::at(0.0); MAX_FRAMES_PER_BUNDLE + 1]),
        };
        assert_eq!(event.validate().unwrap_err().code, "bundle_too_large");
    }

    #[test]
    fn rejects_blank_modifier_acronym() {
        let mut state = RawSessionState::playing(ActivityId(1), CapabilityId(1));
        state.modifiers.push(ModifierDescriptor::new("  "));
        let event = FeedEvent::Began {
            user_id: UserId(7),
            state,
        };
        assert_eq!(event.validate().unwrap_err().code, "missing_field");
    }

    #[test]
    fn rejects_unknown_event_type() {
        let err = parse_event(json!({"type": "paused", "user_id": 7}))
            .expect_err("unknown type");
        assert_eq!(err.code, "invalid_event");
    }

    #[test]
    fn rejects_non_json_line() {
        let err = parse_event_line("not json").expect_err("bad line");
        assert_eq!(err.code, "invalid_json");
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Passed.is_terminal());
        assert!(SessionStatus::Quit.is_terminal());
        assert!(!SessionStatus::Playing.is_terminal());
    }
}
