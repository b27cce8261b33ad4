//! spectator-replay: replays a recorded feed script through the synchronizer.
//!
//! Loads sync options and collaborator fixtures (identities, capability
//! sets, activity sets) from TOML, applies a JSON-lines script of feed
//! events and catalog steps, logs every lifecycle notification to stderr,
//! and prints a JSON summary to stdout.
//!
//! ## Environment
//!
//! - `SPECTATOR_DEBUG_LOG=1`: force debug logging
//! - `RUST_LOG`: standard filter otherwise (defaults to `info`)

mod replay;
mod script;

use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use spectator_core::{load_config, Result, SpectatorError, UserId};
use tracing_subscriber::EnvFilter;

use crate::replay::{replay, ReplayOptions};

#[derive(Parser)]
#[command(name = "spectator-replay")]
#[command(about = "Replay a spectator feed script through the synchronizer")]
#[command(version)]
struct Cli {
    /// Config file with sync options and fixtures
    /// (defaults to <config dir>/spectator/spectator.toml)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Feed script in JSON lines; reads stdin when omitted or "-"
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Users to watch, overriding the config's watch list
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    watch: Vec<u64>,

    /// Fail on the first invalid script line instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "spectator-replay failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config)?;
    let script = read_script(cli.script.as_deref())?;
    let options = ReplayOptions {
        watch: cli.watch.into_iter().map(UserId).collect(),
        strict: cli.strict,
    };

    let summary = replay(config, &script, &options).await?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    }
    .map_err(|err| SpectatorError::Io {
        context: "rendering summary".to_string(),
        source: err.into(),
    })?;
    println!("{}", rendered);
    Ok(())
}

fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs_err::read_to_string(path).map_err(|source| SpectatorError::Io {
                context: "reading feed script".to_string(),
                source,
            })
        }
        _ => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .map_err(|source| SpectatorError::Io {
                    context: "reading feed script from stdin".to_string(),
                    source,
                })?;
            Ok(script)
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("SPECTATOR_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_script_from_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("feed.jsonl");
        fs_err::write(&path, "{\"type\":\"began\",\"user_id\":7,\"state\":{}}\n")
            .expect("write script");

        let script = read_script(Some(path.as_path())).expect("read script");
        assert_eq!(script.lines().count(), 1);
    }

    #[test]
    fn missing_script_is_an_io_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let err = read_script(Some(temp_dir.path().join("missing.jsonl").as_path())).unwrap_err();
        assert!(matches!(err, SpectatorError::Io { .. }));
        assert!(err.to_string().contains("reading feed script"));
    }

    #[test]
    fn parses_cli_flags() {
        let cli = Cli::try_parse_from([
            "spectator-replay",
            "--config",
            "fixture.toml",
            "--watch",
            "7,8",
            "--strict",
            "feed.jsonl",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("fixture.toml")));
        assert_eq!(cli.watch, vec![7, 8]);
        assert!(cli.strict);
        assert!(!cli.pretty);
        assert_eq!(cli.script, Some(PathBuf::from("feed.jsonl")));
    }
}
