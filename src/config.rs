//! Session settings and the optional TOML configuration file.
//!
//! Layering, later wins: built-in defaults, then the file given with
//! `--config`, then command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, RouletteError};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_CHANNEL: &str = "everonn";
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u32 = 30;
pub const DEFAULT_PUSHER_URL: &str = "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=js&version=8.4.0-rc2&flash=false";
pub const DEFAULT_CHANNEL_API_BASE: &str = "https://kick.com/api/v2/channels";
pub const DEFAULT_BASE_DELAY_MS: u64 = 3_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 6_500;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// The operator-facing settings of one tracking session.
///
/// The code word is stored trimmed and lower-cased. An empty code word means
/// watch-only: chat is displayed but nobody becomes a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    channel: String,
    code_word: String,
    response_timeout_secs: u32,
}

impl SessionConfig {
    /// Validate raw operator input.
    ///
    /// Fields are checked in order (channel, code word, response time) and
    /// the first failure is returned.
    pub fn new(
        channel: &str,
        code_word: &str,
        response_timeout_secs: i64,
    ) -> Result<Self, ConfigError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        let code_word = code_word.trim().to_lowercase();
        if code_word.is_empty() {
            return Err(ConfigError::EmptyCodeWord);
        }
        if response_timeout_secs < 1 || response_timeout_secs > u32::MAX as i64 {
            return Err(ConfigError::InvalidResponseTimeout(response_timeout_secs));
        }
        Ok(Self {
            channel: channel.to_string(),
            code_word,
            response_timeout_secs: response_timeout_secs as u32,
        })
    }

    /// A session that only displays chat for `channel`.
    pub fn watch_only(channel: &str) -> Result<Self, ConfigError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        Ok(Self {
            channel: channel.to_string(),
            code_word: String::new(),
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn code_word(&self) -> &str {
        &self.code_word
    }

    pub fn response_timeout_secs(&self) -> u32 {
        self.response_timeout_secs
    }

    pub fn is_watch_only(&self) -> bool {
        self.code_word.is_empty()
    }

    /// Drop the code word, keeping channel and response time.
    pub(crate) fn clear_code_word(&mut self) {
        self.code_word.clear();
    }
}

// ---------------------------------------------------------------------------
// Connection / selection settings
// ---------------------------------------------------------------------------

/// Settings for the connection supervisor.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Pusher WebSocket endpoint, including app key and protocol query.
    pub pusher_url: String,
    /// Base URL for `GET {base}/{channel}` chatroom lookups.
    pub channel_api_base: String,
    /// Backoff unit: the n-th consecutive retry waits `n * base_delay`.
    pub base_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pusher_url: DEFAULT_PUSHER_URL.to_string(),
            channel_api_base: DEFAULT_CHANNEL_API_BASE.to_string(),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub channel: Option<String>,
    pub code_word: Option<String>,
    pub response_timeout_secs: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub pusher_url: Option<String>,
    pub channel_api_base: Option<String>,
    pub base_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionSection {
    pub reveal_delay_ms: Option<u64>,
}

/// Contents of a TOML configuration file. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub session: SessionSection,
    pub connection: ConnectionSection,
    pub selection: SelectionSection,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, RouletteError> {
        let text = std::fs::read_to_string(path).map_err(|e| RouletteError::ConfigFile {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_toml_str(&text).map_err(|e| RouletteError::ConfigFile {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let defaults = ConnectionConfig::default();
        let c = &self.connection;
        ConnectionConfig {
            pusher_url: c.pusher_url.clone().unwrap_or(defaults.pusher_url),
            channel_api_base: c
                .channel_api_base
                .clone()
                .unwrap_or(defaults.channel_api_base),
            base_delay: c
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_attempts: c.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(
            self.selection
                .reveal_delay_ms
                .unwrap_or(DEFAULT_REVEAL_DELAY_MS),
        )
    }

    /// Build the starting session, with command-line overrides taking
    /// precedence over the file. Without a code word the session is watch-only.
    pub fn session_config(
        &self,
        channel: Option<&str>,
        code_word: Option<&str>,
        response_timeout_secs: Option<i64>,
    ) -> Result<SessionConfig, ConfigError> {
        let channel = channel
            .or(self.session.channel.as_deref())
            .unwrap_or(DEFAULT_CHANNEL);
        let timeout = response_timeout_secs
            .or(self.session.response_timeout_secs)
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_SECS as i64);
        match code_word.or(self.session.code_word.as_deref()) {
            Some(word) if !word.trim().is_empty() => SessionConfig::new(channel, word, timeout),
            _ => SessionConfig::watch_only(channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_session_config_normalizes_input() {
        let cfg = SessionConfig::new("  everonn ", "  JoIn  ", 30).unwrap();
        assert_eq!(cfg.channel(), "everonn");
        assert_eq!(cfg.code_word(), "join");
        assert_eq!(cfg.response_timeout_secs(), 30);
        assert!(!cfg.is_watch_only());
    }

    #[rstest]
    #[case("", "join", 30, ConfigError::EmptyChannel)]
    #[case("   ", "join", 30, ConfigError::EmptyChannel)]
    #[case("chan", "", 30, ConfigError::EmptyCodeWord)]
    #[case("chan", "  ", 30, ConfigError::EmptyCodeWord)]
    #[case("chan", "join", 0, ConfigError::InvalidResponseTimeout(0))]
    #[case("chan", "join", -5, ConfigError::InvalidResponseTimeout(-5))]
    fn test_session_config_rejects_bad_field(
        #[case] channel: &str,
        #[case] word: &str,
        #[case] secs: i64,
        #[case] expected: ConfigError,
    ) {
        assert_eq!(SessionConfig::new(channel, word, secs), Err(expected));
    }

    #[test]
    fn test_channel_is_checked_before_code_word() {
        assert_eq!(
            SessionConfig::new("", "", 0),
            Err(ConfigError::EmptyChannel)
        );
    }

    #[test]
    fn test_minimum_timeout_accepted() {
        assert_ok!(SessionConfig::new("chan", "join", 1));
    }

    #[test]
    fn test_watch_only_has_empty_code_word() {
        let cfg = SessionConfig::watch_only("chan").unwrap();
        assert!(cfg.is_watch_only());
        assert_err!(SessionConfig::watch_only(" "));
    }

    #[test]
    fn test_app_config_empty_file_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        let conn = cfg.connection_config();
        assert_eq!(conn.base_delay, Duration::from_secs(3));
        assert_eq!(conn.max_attempts, 5);
        assert_eq!(conn.pusher_url, DEFAULT_PUSHER_URL);
        assert_eq!(cfg.reveal_delay(), Duration::from_millis(6_500));
        let session = cfg.session_config(None, None, None).unwrap();
        assert_eq!(session.channel(), DEFAULT_CHANNEL);
        assert!(session.is_watch_only());
    }

    #[test]
    fn test_app_config_file_values_and_cli_overrides() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [session]
            channel = "filechan"
            code_word = "FileWord"
            response_timeout_secs = 12

            [connection]
            base_delay_ms = 100
            max_attempts = 2

            [selection]
            reveal_delay_ms = 50
            "#,
        )
        .unwrap();
        let session = cfg.session_config(None, None, None).unwrap();
        assert_eq!(session.channel(), "filechan");
        assert_eq!(session.code_word(), "fileword");
        assert_eq!(session.response_timeout_secs(), 12);

        let overridden = cfg
            .session_config(Some("clichan"), Some("cli"), Some(5))
            .unwrap();
        assert_eq!(overridden.channel(), "clichan");
        assert_eq!(overridden.code_word(), "cli");
        assert_eq!(overridden.response_timeout_secs(), 5);

        assert_eq!(cfg.connection_config().base_delay, Duration::from_millis(100));
        assert_eq!(cfg.connection_config().max_attempts, 2);
        assert_eq!(cfg.reveal_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_app_config_rejects_unknown_fields() {
        assert_err!(AppConfig::from_toml_str("[session]\nchanel = \"typo\"\n"));
    }

    #[test]
    fn test_app_config_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\nchannel = \"tmpchan\"").unwrap();
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.session.channel.as_deref(), Some("tmpchan"));
    }

    #[test]
    fn test_app_config_load_missing_file_is_config_file_error() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, RouletteError::ConfigFile { .. }));
    }
}
