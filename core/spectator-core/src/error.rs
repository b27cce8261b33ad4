//! Error types for spectator-core operations.
//!
//! None of these cross into the lifecycle consumer. They surface from
//! configuration loading and from capability decoders, and the synchronizer
//! absorbs decode failures itself.

use std::path::PathBuf;

use spectator_protocol::ErrorInfo;

// ═══════════════════════════════════════════════════════════════════════════════
// Frame decoding
// ═══════════════════════════════════════════════════════════════════════════════

/// A single raw frame a capability set could not turn into a replay frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame timestamp {0} is not finite")]
    NonFiniteTime(f64),

    #[error("frame position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f32, y: f32 },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Crate errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SpectatorError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration directory could not be determined")]
    ConfigDirUnavailable,

    #[error("Configuration read failed: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigParse { path: PathBuf, details: String },

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    // ─────────────────────────────────────────────────────────────────────
    // Feed Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Feed event rejected: {0}")]
    Protocol(#[from] ErrorInfo),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using SpectatorError.
pub type Result<T> = std::result::Result<T, SpectatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_convert() {
        let err: SpectatorError = ErrorInfo::new("invalid_user_id", "user_id must be non-zero").into();
        assert_eq!(
            err.to_string(),
            "Feed event rejected: invalid_user_id: user_id must be non-zero"
        );
    }

    #[test]
    fn decode_errors_render_values() {
        let err = DecodeError::NonFinitePosition {
            x: f32::INFINITY,
            y: 1.0,
        };
        assert_eq!(err.to_string(), "frame position (inf, 1) is not finite");
    }
}
