//! Display Sink: where the core pushes rendering instructions.
//!
//! The core never renders anything itself. It emits [`Notification`]s and a
//! sink decides what to do with them: print them, forward them over a
//! channel, or record them for inspection.

use std::io::Write;
use std::time::Duration;

use colored::*;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::tracker::ParticipantView;

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Status {
        text: String,
        connected: bool,
    },
    /// A new chat line; `text` is already emote-rendered.
    ChatLine {
        sender: String,
        text: String,
        color: String,
    },
    ChatCleared,
    ParticipantsChanged {
        participants: Vec<ParticipantView>,
    },
    /// A draw was made; the announcement follows after `reveal_delay`.
    RevealStarted {
        candidates: Vec<ParticipantView>,
        chosen_index: usize,
        #[serde(with = "duration_ms")]
        reveal_delay: Duration,
    },
    WinnerAnnounced {
        name: String,
        color: String,
        /// The winner's recorded code-word messages, emote-rendered.
        history: Vec<String>,
        timeout_secs: u32,
    },
    CountdownTick {
        seconds_left: u32,
        has_responded: bool,
    },
    WinnerResponseAppended {
        text: String,
    },
    CountdownExpired,
    ShowBackButton,
    /// Participants, seen ids, winner and chat history were all cleared.
    SessionCleared,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait DisplaySink: Send {
    fn notify(&mut self, notification: Notification);
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub notifications: Vec<Notification>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

impl DisplaySink for RecordingSink {
    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// Forwards notifications to an unbounded channel. Sends to a closed
/// channel are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl DisplaySink for ChannelSink {
    fn notify(&mut self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into an RGB triple.
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn paint(text: &str, color: &str) -> ColoredString {
    match parse_hex_color(color) {
        Some((r, g, b)) => text.truecolor(r, g, b),
        None => text.normal(),
    }
}

/// Renders notifications as terminal lines.
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn render(notification: &Notification) -> String {
        match notification {
            Notification::Status { text, connected } => {
                if *connected {
                    format!("{}", text.green())
                } else {
                    format!("{}", text.red())
                }
            }
            Notification::ChatLine { sender, text, color } => {
                format!("{}: {}", paint(sender, color), text)
            }
            Notification::ChatCleared => format!("{}", "-- chat cleared --".dimmed()),
            Notification::ParticipantsChanged { participants } => {
                let names: Vec<String> = participants
                    .iter()
                    .map(|p| paint(&p.name, &p.color).to_string())
                    .collect();
                format!(
                    "{} ({}): {}",
                    "Participants".bold(),
                    participants.len(),
                    names.join(", ")
                )
            }
            Notification::RevealStarted {
                candidates,
                reveal_delay,
                ..
            } => format!(
                "{} {} participants, revealing in {:.1}s...",
                "Rolling".bold().yellow(),
                candidates.len(),
                reveal_delay.as_secs_f64()
            ),
            Notification::WinnerAnnounced {
                name,
                color,
                history,
                timeout_secs,
            } => {
                let mut s = format!(
                    "{} {} ({}s to respond)",
                    "Winner:".bold().yellow(),
                    paint(name, color).bold(),
                    timeout_secs
                );
                if history.is_empty() {
                    s.push_str("\n  No messages recorded.");
                }
                for line in history {
                    s.push_str("\n  ");
                    s.push_str(line);
                }
                s
            }
            Notification::CountdownTick {
                seconds_left,
                has_responded,
            } => {
                let text = format!("Time left: {seconds_left}s");
                if *has_responded {
                    format!("{}", text.green())
                } else {
                    format!("{}", text.red())
                }
            }
            Notification::WinnerResponseAppended { text } => {
                format!("{} {}", ">>".green().bold(), text)
            }
            Notification::CountdownExpired => format!("{}", "Time is up.".red().bold()),
            Notification::ShowBackButton => format!("{}", "(type `close` to dismiss)".dimmed()),
            Notification::SessionCleared => format!("{}", "-- session cleared --".dimmed()),
        }
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn notify(&mut self, notification: Notification) {
        let line = Self::render(&notification);
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }
}
