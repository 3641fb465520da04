//! Crate-level error types.
//!
//! Decode failures are deliberately absent: a malformed frame is an
//! [`Ignore`](crate::decoder::Decoded::Ignore) result, never an error.

use thiserror::Error;

/// A rejected session configuration. One variant per offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("channel name must not be empty")]
    EmptyChannel,
    #[error("code word must not be empty")]
    EmptyCodeWord,
    #[error("response time must be at least 1 second (got {0})")]
    InvalidResponseTimeout(i64),
}

/// Errors surfaced by the reconciliation core and its collaborators.
#[derive(Debug, Error)]
pub enum RouletteError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Selection was requested while the participant set is empty.
    #[error("no participants yet")]
    NoParticipants,

    #[error("channel lookup failed for '{channel}': {detail}")]
    Lookup { channel: String, detail: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to load config file {path}: {detail}")]
    ConfigFile { path: String, detail: String },

    /// The session loop has stopped and no longer accepts commands.
    #[error("session runtime has shut down")]
    RuntimeClosed,
}

pub type Result<T> = std::result::Result<T, RouletteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_field() {
        assert!(ConfigError::EmptyChannel.to_string().contains("channel"));
        assert!(ConfigError::EmptyCodeWord.to_string().contains("code word"));
        assert!(ConfigError::InvalidResponseTimeout(0)
            .to_string()
            .contains("at least 1 second"));
    }

    #[test]
    fn test_config_error_converts_into_roulette_error() {
        let err: RouletteError = ConfigError::EmptyChannel.into();
        assert!(matches!(err, RouletteError::Config(ConfigError::EmptyChannel)));
    }

    #[test]
    fn test_lookup_error_display_includes_channel() {
        let err = RouletteError::Lookup {
            channel: "everonn".into(),
            detail: "HTTP 404".into(),
        };
        let s = err.to_string();
        assert!(s.contains("everonn"), "{s}");
        assert!(s.contains("HTTP 404"), "{s}");
    }
}
