//! # Stage: Participation Tracker
//!
//! ## Responsibility
//! Maintain the set of distinct senders who typed the code word, in the
//! order they first did, along with each participant's code-word messages
//! and the last display color seen for every sender.
//!
//! ## Guarantees
//! - A sender is a participant iff at least one accepted message of theirs
//!   matched the code word since the last clear (or their manual removal)
//! - Matching ignores case, surrounding whitespace and emote markup
//! - With an empty code word, `on_message` never mutates membership
//!
//! ## NOT Responsible For
//! - Deduplication (callers pass each message once)
//! - Choosing a winner

use std::collections::HashMap;

use serde::Serialize;

use crate::decoder::{strip_emotes, ChatMessage, FALLBACK_COLOR};

/// True when `raw_text`, emote-stripped and trimmed, equals `code_word`
/// ignoring case. An empty code word or empty stripped text never matches.
pub fn matches_code_word(raw_text: &str, code_word: &str) -> bool {
    if code_word.is_empty() {
        return false;
    }
    let stripped = strip_emotes(raw_text);
    !stripped.is_empty() && stripped.to_lowercase() == code_word.to_lowercase()
}

/// Outcome of feeding one message to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// No code word configured, or the text did not match.
    NotMatched,
    /// First match from this sender; the participant list changed.
    Joined,
    /// Repeat match from an existing participant.
    Appended,
}

/// Read-only view of one participant, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub name: String,
    pub color: String,
    pub message_count: usize,
}

#[derive(Debug, Default)]
pub struct ParticipationTracker {
    code_word: String,
    /// Participants in first-match order.
    order: Vec<String>,
    /// Code-word messages per participant, created on first match.
    messages: HashMap<String, Vec<String>>,
    /// Most recent color of every sender, participant or not.
    colors: HashMap<String, String>,
}

impl ParticipationTracker {
    pub fn new(code_word: &str) -> Self {
        Self {
            code_word: code_word.to_lowercase(),
            ..Self::default()
        }
    }

    pub fn code_word(&self) -> &str {
        &self.code_word
    }

    pub fn set_code_word(&mut self, code_word: &str) {
        self.code_word = code_word.to_lowercase();
    }

    /// Remember `msg`'s color and, on a code-word match, record the message.
    pub fn on_message(&mut self, msg: &ChatMessage) -> TrackOutcome {
        self.colors
            .insert(msg.sender().to_string(), msg.color().to_string());

        if !matches_code_word(msg.raw_text(), &self.code_word) {
            return TrackOutcome::NotMatched;
        }

        let outcome = if self.messages.contains_key(msg.sender()) {
            TrackOutcome::Appended
        } else {
            self.order.push(msg.sender().to_string());
            TrackOutcome::Joined
        };
        self.messages
            .entry(msg.sender().to_string())
            .or_default()
            .push(msg.raw_text().to_string());
        outcome
    }

    /// Drop `sender` and their message history. Returns whether they were present.
    pub fn remove_participant(&mut self, sender: &str) -> bool {
        if self.messages.remove(sender).is_none() {
            return false;
        }
        self.order.retain(|name| name != sender);
        true
    }

    pub fn contains(&self, sender: &str) -> bool {
        self.messages.contains_key(sender)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Participant names in first-match order.
    pub fn participants(&self) -> &[String] {
        &self.order
    }

    pub fn messages_of(&self, sender: &str) -> &[String] {
        self.messages.get(sender).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn color_of(&self, sender: &str) -> &str {
        self.colors
            .get(sender)
            .map(String::as_str)
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn views(&self) -> Vec<ParticipantView> {
        self.order
            .iter()
            .map(|name| ParticipantView {
                name: name.clone(),
                color: self.color_of(name).to_string(),
                message_count: self.messages_of(name).len(),
            })
            .collect()
    }

    /// Forget participants, histories and colors. The code word is kept.
    pub fn clear(&mut self) {
        self.order.clear();
        self.messages.clear();
        self.colors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn msg(id: &str, sender: &str, text: &str) -> ChatMessage {
        ChatMessage::new(id, sender, text, "#123456")
    }

    #[rstest]
    #[case("  CodeWord  ", "codeword", true)]
    #[case("CODEWORD", "codeword", true)]
    #[case("codeword [emote:5:Pog]", "codeword", true)]
    #[case("[emote:1:Kappa]", "codeword", false)]
    #[case("codeword please", "codeword", false)]
    #[case("codeword", "", false)]
    #[case("", "", false)]
    fn test_matches_code_word(#[case] text: &str, #[case] word: &str, #[case] expected: bool) {
        assert_eq!(matches_code_word(text, word), expected);
    }

    #[test]
    fn test_first_match_joins_then_appends() {
        let mut t = ParticipationTracker::new("join");
        assert_eq!(t.on_message(&msg("1", "alice", "JOIN")), TrackOutcome::Joined);
        assert_eq!(t.on_message(&msg("2", "alice", " join ")), TrackOutcome::Appended);
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages_of("alice"), &["JOIN".to_string(), " join ".to_string()]);
    }

    #[test]
    fn test_non_matching_message_only_records_color() {
        let mut t = ParticipationTracker::new("join");
        assert_eq!(t.on_message(&msg("1", "bob", "hello")), TrackOutcome::NotMatched);
        assert!(t.is_empty());
        assert_eq!(t.color_of("bob"), "#123456");
        assert!(t.messages_of("bob").is_empty());
    }

    #[test]
    fn test_empty_code_word_is_noop() {
        let mut t = ParticipationTracker::new("");
        assert_eq!(t.on_message(&msg("1", "alice", "")), TrackOutcome::NotMatched);
        assert_eq!(t.on_message(&msg("2", "alice", "join")), TrackOutcome::NotMatched);
        assert!(t.is_empty());
    }

    #[test]
    fn test_participants_keep_first_match_order() {
        let mut t = ParticipationTracker::new("join");
        t.on_message(&msg("1", "carol", "join"));
        t.on_message(&msg("2", "alice", "join"));
        t.on_message(&msg("3", "carol", "join"));
        t.on_message(&msg("4", "bob", "join"));
        assert_eq!(t.participants(), &["carol", "alice", "bob"]);
    }

    #[test]
    fn test_remove_participant_discards_history() {
        let mut t = ParticipationTracker::new("join");
        t.on_message(&msg("1", "alice", "join"));
        t.on_message(&msg("2", "bob", "join"));
        assert!(t.remove_participant("alice"));
        assert!(!t.contains("alice"));
        assert!(t.messages_of("alice").is_empty());
        assert_eq!(t.participants(), &["bob"]);
        assert!(!t.remove_participant("alice"));

        assert_eq!(t.on_message(&msg("3", "alice", "join")), TrackOutcome::Joined);
        assert_eq!(t.messages_of("alice").len(), 1);
    }

    #[test]
    fn test_views_use_latest_color() {
        let mut t = ParticipationTracker::new("join");
        t.on_message(&ChatMessage::new("1", "alice", "join", "#111111"));
        t.on_message(&ChatMessage::new("2", "alice", "hi", "#222222"));
        let views = t.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].color, "#222222");
        assert_eq!(views[0].message_count, 1);
    }

    #[test]
    fn test_clear_keeps_code_word() {
        let mut t = ParticipationTracker::new("Join");
        t.on_message(&msg("1", "alice", "join"));
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.code_word(), "join");
        assert_eq!(t.color_of("alice"), FALLBACK_COLOR);
    }

    proptest! {
        #[test]
        fn test_match_ignores_case_and_padding(word in "[a-zA-Z]{1,12}", left in " {0,3}", right in " {0,3}") {
            let text = format!("{left}{}{right}", word.to_uppercase());
            prop_assert!(matches_code_word(&text, &word.to_lowercase()));
        }
    }
}
