//! # Stage: Event Decoder
//!
//! ## Responsibility
//! Turn one raw Pusher frame into a [`Decoded`] value: a subscription ack, a
//! chat message, an event we do not handle, or an explicit ignore.
//!
//! ## Guarantees
//! - Never returns an error: malformed input is `Decoded::Ignore(reason)`
//! - A `ChatMessage` always has a non-empty id, a sender, and content that is
//!   non-empty once emote markup is stripped
//! - Raw text keeps its emote markup; stripping and rendering are separate
//!
//! ## NOT Responsible For
//! - Deduplication (see `dedup`)
//! - Code-word matching (see `tracker`)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Event name of the Pusher subscription acknowledgement.
pub const SUBSCRIPTION_ACK_EVENT: &str = "pusher_internal:subscription_succeeded";
/// Event name of a Kick chat message.
pub const CHAT_MESSAGE_EVENT: &str = "App\\Events\\ChatMessageEvent";
/// Sender label used when the payload has no username.
pub const ANONYMOUS_SENDER: &str = "Anonymous";
/// Display color used when the payload has no identity color.
pub const FALLBACK_COLOR: &str = "#ffffff";

static EMOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[emote:(\d+):([^\]]+)\]").expect("emote pattern is valid"));

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One chat line as received from the provider. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    id: String,
    sender: String,
    raw_text: String,
    color: String,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        raw_text: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            raw_text: raw_text.into(),
            color: color.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Text exactly as sent, emote markup included.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Text for display, with emote markup replaced by emote names.
    pub fn display_text(&self) -> String {
        render_emotes(&self.raw_text)
    }
}

// ---------------------------------------------------------------------------
// Decode results
// ---------------------------------------------------------------------------

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Outer envelope is not valid JSON or lacks an `event` name.
    MalformedEnvelope,
    /// Chat envelope whose `data` is not a JSON string holding a JSON object.
    MalformedPayload,
    MissingId,
    EmptyContent,
    /// Content consisted only of emote markup and whitespace.
    EmoteOnly,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IgnoreReason::MalformedEnvelope => "malformed_envelope",
            IgnoreReason::MalformedPayload => "malformed_payload",
            IgnoreReason::MissingId => "missing_id",
            IgnoreReason::EmptyContent => "empty_content",
            IgnoreReason::EmoteOnly => "emote_only",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    SubscriptionAck,
    Chat(ChatMessage),
    /// A well-formed envelope for an event we do not handle.
    Unhandled(String),
    Ignore(IgnoreReason),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    sender: Option<SenderPayload>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SenderPayload {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    identity: Option<IdentityPayload>,
}

#[derive(Debug, Deserialize)]
struct IdentityPayload {
    #[serde(default)]
    color: Option<String>,
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one raw frame.
pub fn decode_frame(frame: &str) -> Decoded {
    let envelope: Envelope = match serde_json::from_str(frame) {
        Ok(env) => env,
        Err(_) => return Decoded::Ignore(IgnoreReason::MalformedEnvelope),
    };

    match envelope.event.as_str() {
        SUBSCRIPTION_ACK_EVENT => Decoded::SubscriptionAck,
        CHAT_MESSAGE_EVENT => decode_chat(&envelope.data),
        other => Decoded::Unhandled(other.to_string()),
    }
}

fn decode_chat(data: &serde_json::Value) -> Decoded {
    let Some(inner) = data.as_str() else {
        return Decoded::Ignore(IgnoreReason::MalformedPayload);
    };
    let payload: ChatPayload = match serde_json::from_str(inner) {
        Ok(p) => p,
        Err(_) => return Decoded::Ignore(IgnoreReason::MalformedPayload),
    };

    let Some(id) = payload.id.as_ref().and_then(id_to_string) else {
        return Decoded::Ignore(IgnoreReason::MissingId);
    };
    let Some(content) = non_empty(payload.content) else {
        return Decoded::Ignore(IgnoreReason::EmptyContent);
    };
    if strip_emotes(&content).is_empty() {
        return Decoded::Ignore(IgnoreReason::EmoteOnly);
    }

    let (username, color) = match payload.sender {
        Some(sender) => (
            non_empty(sender.username),
            non_empty(sender.identity.and_then(|i| i.color)),
        ),
        None => (None, None),
    };

    Decoded::Chat(ChatMessage::new(
        id,
        username.unwrap_or_else(|| ANONYMOUS_SENDER.to_string()),
        content,
        color.unwrap_or_else(|| FALLBACK_COLOR.to_string()),
    ))
}

// ---------------------------------------------------------------------------
// Emote markup
// ---------------------------------------------------------------------------

/// Remove every `[emote:<id>:<name>]` token and trim the result.
pub fn strip_emotes(text: &str) -> String {
    EMOTE_RE.replace_all(text, "").trim().to_string()
}

/// Replace every `[emote:<id>:<name>]` token with `<name>`.
pub fn render_emotes(text: &str) -> String {
    EMOTE_RE.replace_all(text, "$2").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn chat_frame(payload: serde_json::Value) -> String {
        serde_json::json!({
            "event": CHAT_MESSAGE_EVENT,
            "data": payload.to_string(),
        })
        .to_string()
    }

    #[test]
    fn test_decode_full_chat_message() {
        let frame = chat_frame(serde_json::json!({
            "id": "abc-1",
            "sender": {"username": "alice", "identity": {"color": "#ff0000"}},
            "content": "hello [emote:37226:KEKW]",
        }));
        let Decoded::Chat(msg) = decode_frame(&frame) else {
            panic!("expected chat");
        };
        assert_eq!(msg.id(), "abc-1");
        assert_eq!(msg.sender(), "alice");
        assert_eq!(msg.color(), "#ff0000");
        assert_eq!(msg.raw_text(), "hello [emote:37226:KEKW]");
        assert_eq!(msg.display_text(), "hello KEKW");
    }

    #[test]
    fn test_decode_applies_sender_defaults() {
        let frame = chat_frame(serde_json::json!({"id": 7, "content": "hi"}));
        let Decoded::Chat(msg) = decode_frame(&frame) else {
            panic!("expected chat");
        };
        assert_eq!(msg.id(), "7");
        assert_eq!(msg.sender(), ANONYMOUS_SENDER);
        assert_eq!(msg.color(), FALLBACK_COLOR);
    }

    #[test]
    fn test_decode_subscription_ack() {
        let frame = serde_json::json!({"event": SUBSCRIPTION_ACK_EVENT, "data": "{}"}).to_string();
        assert_eq!(decode_frame(&frame), Decoded::SubscriptionAck);
    }

    #[test]
    fn test_decode_other_event_is_unhandled_not_ignored() {
        let frame = serde_json::json!({"event": "pusher:pong", "data": "{}"}).to_string();
        assert_eq!(decode_frame(&frame), Decoded::Unhandled("pusher:pong".into()));
    }

    #[rstest]
    #[case("not json", IgnoreReason::MalformedEnvelope)]
    #[case(r#"{"data": "{}"}"#, IgnoreReason::MalformedEnvelope)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{oops"}"#, IgnoreReason::MalformedPayload)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": {"id": "1"}}"#, IgnoreReason::MalformedPayload)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{\"content\": \"hi\"}"}"#, IgnoreReason::MissingId)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{\"id\": \"1\", \"content\": \"\"}"}"#, IgnoreReason::EmptyContent)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{\"id\": \"1\"}"}"#, IgnoreReason::EmptyContent)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{\"id\": \"1\", \"content\": \"[emote:1:Kappa]\"}"}"#, IgnoreReason::EmoteOnly)]
    #[case(r#"{"event": "App\\Events\\ChatMessageEvent", "data": "{\"id\": \"1\", \"content\": \" [emote:1:Kappa] [emote:2:LUL] \"}"}"#, IgnoreReason::EmoteOnly)]
    fn test_decode_ignores(#[case] frame: &str, #[case] reason: IgnoreReason) {
        assert_eq!(decode_frame(frame), Decoded::Ignore(reason));
    }

    #[test]
    fn test_strip_emotes_trims() {
        assert_eq!(strip_emotes("  CodeWord [emote:9:Pog] "), "CodeWord");
        assert_eq!(strip_emotes("[emote:1:Kappa]"), "");
    }

    #[test]
    fn test_render_keeps_non_emote_brackets() {
        assert_eq!(render_emotes("[not an emote] [emote:12:Wave]"), "[not an emote] Wave");
        assert_eq!(render_emotes("[emote:x:Bad]"), "[emote:x:Bad]");
    }

    #[test]
    fn test_ignore_reason_display() {
        assert_eq!(IgnoreReason::EmoteOnly.to_string(), "emote_only");
    }
}
