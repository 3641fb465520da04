//! # Stage: Winner Response Monitor
//!
//! ## Responsibility
//! Track one winner's response window: a countdown of whole seconds that
//! ends either when the winner sends a message or when time runs out.
//!
//! ## Guarantees
//! - Pure state machine: ticks are fed in by the caller, nothing is scheduled here
//! - Exactly one terminal transition (`Responded` or `Expired`) per arming
//! - Once the countdown has stopped, `tick` is inert and reports `Inactive`
//! - Winner messages are always appended, whatever the state
//!
//! ## NOT Responsible For
//! - Driving the one-second cadence (see `timer`)
//! - Deciding which messages come from the winner (the session routes them)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseState {
    /// Counting down, `time_left` whole seconds remain.
    Armed { time_left: u32 },
    /// The winner answered with `time_left` seconds to spare.
    Responded { time_left: u32 },
    Expired,
    /// The countdown was stopped by [`WinnerResponseMonitor::close`] before
    /// the winner responded or time ran out.
    Closed { time_left: u32 },
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still armed; display `seconds_left`.
    Running { seconds_left: u32 },
    /// This tick ran the clock out. The countdown has stopped.
    Expired,
    /// Not counting down; the tick was ignored.
    Inactive,
}

#[derive(Debug, Clone)]
pub struct WinnerResponseMonitor {
    winner: String,
    since_victory: Vec<String>,
    state: ResponseState,
}

impl WinnerResponseMonitor {
    /// Start a fresh response window for `winner`.
    pub fn arm(winner: impl Into<String>, timeout_secs: u32) -> Self {
        Self {
            winner: winner.into(),
            since_victory: Vec::new(),
            state: ResponseState::Armed {
                time_left: timeout_secs,
            },
        }
    }

    pub fn winner(&self) -> &str {
        &self.winner
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn since_victory(&self) -> &[String] {
        &self.since_victory
    }

    pub fn has_responded(&self) -> bool {
        matches!(self.state, ResponseState::Responded { .. })
    }

    /// True while the countdown is live.
    pub fn is_counting(&self) -> bool {
        matches!(self.state, ResponseState::Armed { .. })
    }

    pub fn tick(&mut self) -> TickOutcome {
        let ResponseState::Armed { time_left } = self.state else {
            return TickOutcome::Inactive;
        };
        let time_left = time_left.saturating_sub(1);
        if time_left == 0 {
            self.state = ResponseState::Expired;
            TickOutcome::Expired
        } else {
            self.state = ResponseState::Armed { time_left };
            TickOutcome::Running {
                seconds_left: time_left,
            }
        }
    }

    /// Record a message from the winner. Returns `true` when this message
    /// was the response that stopped a live countdown.
    pub fn on_winner_message(&mut self, text: impl Into<String>) -> bool {
        self.since_victory.push(text.into());
        match self.state {
            ResponseState::Armed { time_left } => {
                self.state = ResponseState::Responded { time_left };
                true
            }
            _ => false,
        }
    }

    /// Seconds left on the clock, frozen once the countdown stops.
    pub fn time_left(&self) -> u32 {
        match self.state {
            ResponseState::Armed { time_left }
            | ResponseState::Responded { time_left }
            | ResponseState::Closed { time_left } => time_left,
            ResponseState::Expired => 0,
        }
    }

    /// Stop the countdown if it is live. History is kept. Idempotent.
    pub fn close(&mut self) -> bool {
        match self.state {
            ResponseState::Armed { time_left } => {
                self.state = ResponseState::Closed { time_left };
                true
            }
            _ => false,
        }
    }
}
