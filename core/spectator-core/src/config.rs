//! Configuration loading.
//!
//! A config file holds the synchronizer options plus optional fixtures
//! (identities, capability sets, activity sets) used to stand up the
//! in-memory collaborators. A missing file yields defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spectator_protocol::{ActivityId, CapabilityId, UserId};

use crate::catalog::ButtonBinding;
use crate::error::{Result, SpectatorError};
use crate::types::UserProfile;

const CONFIG_DIR_NAME: &str = "spectator";
const CONFIG_FILE_NAME: &str = "spectator.toml";

/// Options consumed by the synchronizer itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drop a user's raw state when their activity ends, so a later catalog
    /// change cannot re-resolve a finished activity.
    pub prune_finished_states: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectatorConfig {
    pub sync: SyncConfig,
    /// Users to watch, in order.
    pub watch: Vec<UserId>,
    /// Identity directory for the static resolver.
    pub users: Vec<UserProfile>,
    pub capabilities: Vec<CapabilityFixture>,
    pub activity_sets: Vec<ActivitySetFixture>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Buttons,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFixture {
    pub id: CapabilityId,
    pub short_name: String,
    pub kind: CapabilityKind,
    #[serde(default)]
    pub uses_position: bool,
    #[serde(default)]
    pub buttons: Vec<ButtonBinding>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySetFixture {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub activities: Vec<ActivityFixture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFixture {
    pub id: ActivityId,
    #[serde(default)]
    pub version: String,
    pub capability_id: CapabilityId,
    #[serde(default)]
    pub length_ms: u64,
}

impl SpectatorConfig {
    /// Checks cross-references the deserializer cannot see.
    pub fn validate(&self) -> Result<()> {
        let mut user_ids = HashSet::new();
        for user in &self.users {
            if !user_ids.insert(user.id) {
                return Err(SpectatorError::InvalidFixture(format!(
                    "user {} is declared twice",
                    user.id
                )));
            }
        }

        let mut activity_ids = HashSet::new();
        for set in &self.activity_sets {
            for activity in &set.activities {
                if !activity_ids.insert(activity.id) {
                    return Err(SpectatorError::InvalidFixture(format!(
                        "activity {} appears in more than one place",
                        activity.id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Returns the default config path (`<config dir>/spectator/spectator.toml`).
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(SpectatorError::ConfigDirUnavailable)
}

/// Loads the config at `path` (or the default path). Missing files yield
/// `SpectatorConfig::default()`.
pub fn load_config(path: Option<PathBuf>) -> Result<SpectatorConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "Config file missing; using defaults");
        return Ok(SpectatorConfig::default());
    }

    let content =
        fs_err::read_to_string(&config_path).map_err(|source| SpectatorError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;
    parse_config(&content, &config_path)
}

pub fn parse_config(content: &str, path: &Path) -> Result<SpectatorConfig> {
    let config: SpectatorConfig =
        toml::from_str(content).map_err(|err| SpectatorError::ConfigParse {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("missing.toml");
        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config, SpectatorConfig::default());
        assert!(!config.sync.prune_finished_states);
    }

    #[test]
    fn load_config_parses_sync_and_fixtures() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("spectator.toml");
        fs_err::write(
            &path,
            r#"
watch = [7, 8]

[sync]
prune_finished_states = true

[[users]]
id = 7
username = "peppy"
country_code = "AU"

[[capabilities]]
id = 3
short_name = "osu"
kind = "buttons"
uses_position = true
buttons = [{ bit = 0, action = "left" }, { bit = 1, action = "right" }]
modifiers = ["HD", "DT"]

[[activity_sets]]
id = 100
title = "Example"
activities = [{ id = 42, version = "Insane", capability_id = 3 }]
"#,
        )
        .expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert!(config.sync.prune_finished_states);
        assert_eq!(config.watch, vec![UserId(7), UserId(8)]);
        assert_eq!(config.users[0].username, "peppy");
        assert_eq!(config.users[0].country_code.as_deref(), Some("AU"));
        assert_eq!(config.capabilities[0].buttons.len(), 2);
        assert_eq!(config.capabilities[0].kind, CapabilityKind::Buttons);
        let activity = &config.activity_sets[0].activities[0];
        assert_eq!(activity.id, ActivityId(42));
        assert_eq!(activity.capability_id, CapabilityId(3));
        assert_eq!(activity.length_ms, 0);
    }

    #[test]
    fn parse_config_rejects_unknown_capability_kind() {
        let err = parse_config(
            r#"
[[capabilities]]
id = 3
short_name = "osu"
kind = "joystick"
"#,
            Path::new("inline.toml"),
        )
        .expect_err("unknown kind");
        assert!(matches!(err, SpectatorError::ConfigParse { .. }));
    }

    #[test]
    fn parse_config_rejects_duplicate_users() {
        let err = parse_config(
            r#"
[[users]]
id = 7
username = "a"

[[users]]
id = 7
username = "b"
"#,
            Path::new("inline.toml"),
        )
        .expect_err("duplicate users");
        assert!(matches!(err, SpectatorError::InvalidFixture(_)));
    }

    #[test]
    fn parse_config_rejects_duplicate_activities() {
        let err = parse_config(
            r#"
[[activity_sets]]
id = 1
activities = [{ id = 42, capability_id = 3 }]

[[activity_sets]]
id = 2
activities = [{ id = 42, capability_id = 3 }]
"#,
            Path::new("inline.toml"),
        )
        .expect_err("duplicate activities");
        assert!(matches!(err, SpectatorError::InvalidFixture(_)));
    }
}
