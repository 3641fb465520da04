//! # Stage: Session (reconciliation core)
//!
//! ## Responsibility
//! Own all mutable state of one tracking session and route every decoded
//! chat event through deduplication, chat history, participation tracking
//! and winner response monitoring. Operator commands mutate the same state.
//!
//! ## Guarantees
//! - A message id is recorded in the seen set before any of its effects
//! - After the seen-set check nothing can fail, so a message either applies
//!   all of its effects or none
//! - At most one winner monitor exists; a new draw clears the previous one
//! - Between a draw and its reveal no message is attributed to the winner
//! - Reset and reconfigure clear everything before emitting a single
//!   `SessionCleared`
//!
//! ## NOT Responsible For
//! - Scheduling: the caller delivers reveal and tick events (see `runtime`)
//! - Connection management

use tracing::{debug, info, trace};

use crate::config::SessionConfig;
use crate::decoder::{decode_frame, render_emotes, ChatMessage, Decoded, IgnoreReason};
use crate::dedup::Deduplicator;
use crate::error::RouletteError;
use crate::monitor::{TickOutcome, WinnerResponseMonitor};
use crate::selector::{Selection, Selector};
use crate::sink::{DisplaySink, Notification};
use crate::tracker::{ParticipantView, ParticipationTracker, TrackOutcome};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    SubscriptionAck,
    /// Well-formed, but not an event this session handles.
    Unhandled,
    /// Dropped by the decoder.
    Ignored(IgnoreReason),
    /// A chat message whose id was already processed.
    Duplicate,
    Accepted(MessageEffects),
}

/// Effects of one accepted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageEffects {
    pub participation: TrackOutcome,
    /// The sender is the armed winner; the text was added to the since-victory list.
    pub from_winner: bool,
    /// This message stopped the winner's countdown.
    pub winner_responded: bool,
}

pub struct Session<S: DisplaySink> {
    config: SessionConfig,
    seen: Deduplicator,
    tracker: ParticipationTracker,
    selector: Selector,
    chat_history: Vec<ChatMessage>,
    pending_reveal: Option<Selection>,
    monitor: Option<WinnerResponseMonitor>,
    sink: S,
}

impl<S: DisplaySink> Session<S> {
    pub fn new(config: SessionConfig, selector: Selector, sink: S) -> Self {
        let tracker = ParticipationTracker::new(config.code_word());
        Self {
            config,
            seen: Deduplicator::new(),
            tracker,
            selector,
            chat_history: Vec::new(),
            pending_reveal: None,
            monitor: None,
            sink,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn tracker(&self) -> &ParticipationTracker {
        &self.tracker
    }

    pub fn seen_ids(&self) -> &Deduplicator {
        &self.seen
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    pub fn pending_reveal(&self) -> Option<&Selection> {
        self.pending_reveal.as_ref()
    }

    pub fn winner_monitor(&self) -> Option<&WinnerResponseMonitor> {
        self.monitor.as_ref()
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn participant_views(&self) -> Vec<ParticipantView> {
        self.tracker.views()
    }

    // -----------------------------------------------------------------------
    // Inbound events
    // -----------------------------------------------------------------------

    pub fn set_status(&mut self, text: impl Into<String>, connected: bool) {
        self.sink.notify(Notification::Status {
            text: text.into(),
            connected,
        });
    }

    /// Decode and apply one raw frame.
    pub fn handle_frame(&mut self, frame: &str) -> FrameOutcome {
        match decode_frame(frame) {
            Decoded::SubscriptionAck => FrameOutcome::SubscriptionAck,
            Decoded::Unhandled(event) => {
                trace!(event = %event, "unhandled event");
                FrameOutcome::Unhandled
            }
            Decoded::Ignore(reason) => {
                trace!(%reason, "frame dropped");
                FrameOutcome::Ignored(reason)
            }
            Decoded::Chat(msg) => self.handle_message(msg),
        }
    }

    /// Apply one decoded chat message.
    pub fn handle_message(&mut self, msg: ChatMessage) -> FrameOutcome {
        if !self.seen.accept(msg.id()) {
            trace!(id = msg.id(), "duplicate message");
            return FrameOutcome::Duplicate;
        }

        let display = msg.display_text();
        self.sink.notify(Notification::ChatLine {
            sender: msg.sender().to_string(),
            text: display.clone(),
            color: msg.color().to_string(),
        });

        let participation = self.tracker.on_message(&msg);
        if participation == TrackOutcome::Joined {
            debug!(sender = msg.sender(), "participant joined");
            self.sink.notify(Notification::ParticipantsChanged {
                participants: self.tracker.views(),
            });
        }

        let mut effects = MessageEffects {
            participation,
            from_winner: false,
            winner_responded: false,
        };
        if let Some(monitor) = self.monitor.as_mut() {
            if monitor.winner() == msg.sender() {
                effects.from_winner = true;
                effects.winner_responded = monitor.on_winner_message(msg.raw_text());
                self.sink
                    .notify(Notification::WinnerResponseAppended { text: display });
                if effects.winner_responded {
                    info!(winner = msg.sender(), "winner responded");
                    self.sink.notify(Notification::CountdownTick {
                        seconds_left: monitor.time_left(),
                        has_responded: true,
                    });
                    self.sink.notify(Notification::ShowBackButton);
                }
            }
        }

        self.chat_history.push(msg);
        FrameOutcome::Accepted(effects)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Validate and install new settings. On a validation error nothing changes.
    pub fn configure(
        &mut self,
        channel: &str,
        code_word: &str,
        response_timeout_secs: i64,
    ) -> Result<(), RouletteError> {
        let config = SessionConfig::new(channel, code_word, response_timeout_secs)?;
        self.apply_config(config);
        Ok(())
    }

    /// Install already-validated settings, clearing all session state.
    pub fn apply_config(&mut self, config: SessionConfig) {
        info!(
            channel = config.channel(),
            code_word = config.code_word(),
            response_timeout_secs = config.response_timeout_secs(),
            "session reconfigured"
        );
        self.tracker.set_code_word(config.code_word());
        self.config = config;
        self.clear_all();
    }

    /// Clear all state and the code word. The channel is kept.
    pub fn reset(&mut self) {
        info!(channel = self.config.channel(), "session reset");
        self.config.clear_code_word();
        self.tracker.set_code_word("");
        self.clear_all();
    }

    fn clear_all(&mut self) {
        self.seen.clear();
        self.tracker.clear();
        self.chat_history.clear();
        self.pending_reveal = None;
        self.monitor = None;
        self.sink.notify(Notification::SessionCleared);
    }

    pub fn clear_chat_history(&mut self) {
        self.chat_history.clear();
        self.sink.notify(Notification::ChatCleared);
    }

    /// Returns whether `name` was a participant.
    pub fn remove_participant(&mut self, name: &str) -> bool {
        if !self.tracker.remove_participant(name) {
            return false;
        }
        debug!(participant = name, "participant removed");
        self.sink.notify(Notification::ParticipantsChanged {
            participants: self.tracker.views(),
        });
        true
    }

    /// Draw a winner. The winner is not armed until [`complete_reveal`]
    /// is called; any previous winner is cleared immediately.
    ///
    /// [`complete_reveal`]: Session::complete_reveal
    pub fn start_selection(&mut self) -> Result<Selection, RouletteError> {
        let selection = self.selector.draw(self.tracker.participants())?;
        self.monitor = None;
        info!(
            chosen = %selection.chosen,
            index = selection.index,
            candidates = selection.candidates.len(),
            "winner drawn"
        );
        let candidates = selection
            .candidates
            .iter()
            .map(|name| ParticipantView {
                name: name.clone(),
                color: self.tracker.color_of(name).to_string(),
                message_count: self.tracker.messages_of(name).len(),
            })
            .collect();
        self.sink.notify(Notification::RevealStarted {
            candidates,
            chosen_index: selection.index,
            reveal_delay: self.selector.reveal_delay(),
        });
        self.pending_reveal = Some(selection.clone());
        Ok(selection)
    }

    /// Announce the pending winner and arm the response monitor. Returns
    /// `false` when no draw is pending.
    pub fn complete_reveal(&mut self) -> bool {
        let Some(selection) = self.pending_reveal.take() else {
            return false;
        };
        let name = selection.chosen;
        let timeout_secs = self.config.response_timeout_secs();
        info!(winner = %name, timeout_secs, "winner announced");
        self.sink.notify(Notification::WinnerAnnounced {
            name: name.clone(),
            color: self.tracker.color_of(&name).to_string(),
            history: self
                .tracker
                .messages_of(&name)
                .iter()
                .map(|m| render_emotes(m))
                .collect(),
            timeout_secs,
        });
        self.monitor = Some(WinnerResponseMonitor::arm(name, timeout_secs));
        true
    }

    /// Advance the winner countdown by one second.
    pub fn tick_countdown(&mut self) -> TickOutcome {
        let Some(monitor) = self.monitor.as_mut() else {
            return TickOutcome::Inactive;
        };
        let outcome = monitor.tick();
        match outcome {
            TickOutcome::Running { seconds_left } => {
                self.sink.notify(Notification::CountdownTick {
                    seconds_left,
                    has_responded: false,
                });
            }
            TickOutcome::Expired => {
                info!(winner = monitor.winner(), "winner response window expired");
                self.sink.notify(Notification::CountdownTick {
                    seconds_left: 0,
                    has_responded: false,
                });
                self.sink.notify(Notification::CountdownExpired);
                self.sink.notify(Notification::ShowBackButton);
            }
            TickOutcome::Inactive => {}
        }
        outcome
    }

    /// Dismiss the response view early. Returns whether a live countdown stopped.
    pub fn close_winner_view(&mut self) -> bool {
        self.monitor.as_mut().map(|m| m.close()).unwrap_or(false)
    }

    /// True while the winner countdown is live.
    pub fn countdown_active(&self) -> bool {
        self.monitor.as_ref().map(|m| m.is_counting()).unwrap_or(false)
    }
}

impl<S: DisplaySink> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("participants", &self.tracker.len())
            .field("seen_ids", &self.seen.len())
            .field("chat_history", &self.chat_history.len())
            .field("pending_reveal", &self.pending_reveal)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}
