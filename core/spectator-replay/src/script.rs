//! Feed script parsing.
//!
//! A script is JSON lines. Each line is either a feed event as defined by
//! `spectator-protocol` or a catalog step:
//!
//! ```text
//! {"type":"began","user_id":7,"state":{"activity_id":42,"capability_id":3}}
//! {"type":"publish_set","set":{"id":2,"activities":[{"id":77,"capability_id":3}]}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use serde::Deserialize;
use serde_json::Value;
use spectator_core::config::ActivitySetFixture;
use spectator_protocol::{parse_event, ErrorInfo, FeedEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Feed(FeedEvent),
    /// Insert or replace an activity set, then notify the synchronizer.
    PublishSet(ActivitySetFixture),
}

#[derive(Deserialize)]
struct PublishSetLine {
    set: ActivitySetFixture,
}

pub fn parse_line(line: &str) -> Result<Option<ScriptStep>, ErrorInfo> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| ErrorInfo::new("invalid_json", format!("line is not JSON: {}", err)))?;

    if value.get("type").and_then(Value::as_str) == Some("publish_set") {
        let line: PublishSetLine = serde_json::from_value(value).map_err(|err| {
            ErrorInfo::new(
                "invalid_step",
                format!("publish_set step is invalid: {}", err),
            )
        })?;
        return Ok(Some(ScriptStep::PublishSet(line.set)));
    }

    parse_event(value).map(|event| Some(ScriptStep::Feed(event)))
}
