//! Uniform random winner selection.
//!
//! The chosen index is produced synchronously; announcing the winner is the
//! caller's job once [`Selector::reveal_delay`] has elapsed.

use std::time::Duration;

use rand::Rng;

use crate::config::DEFAULT_REVEAL_DELAY_MS;
use crate::error::RouletteError;

/// Source of indices in `[0, len)`. Injected so tests can fix the outcome.
pub trait IndexSource: Send {
    /// `len` is always greater than zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl IndexSource for ThreadRngSource {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Always returns the same index (clamped into range).
#[derive(Debug, Clone, Copy)]
pub struct FixedIndex(pub usize);

impl IndexSource for FixedIndex {
    fn pick(&mut self, len: usize) -> usize {
        self.0.min(len - 1)
    }
}

/// The result of one roulette draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub chosen: String,
    /// Participants as they stood when the draw was made.
    pub candidates: Vec<String>,
}

/// Pick one participant uniformly at random. An out-of-range pick from the
/// source is clamped to the last participant.
pub fn select(
    participants: &[String],
    source: &mut dyn IndexSource,
) -> Result<(usize, String), RouletteError> {
    if participants.is_empty() {
        return Err(RouletteError::NoParticipants);
    }
    let index = source.pick(participants.len()).min(participants.len() - 1);
    Ok((index, participants[index].clone()))
}

pub struct Selector {
    source: Box<dyn IndexSource>,
    reveal_delay: Duration,
    last_index: Option<usize>,
}

impl Selector {
    pub fn new(source: Box<dyn IndexSource>, reveal_delay: Duration) -> Self {
        Self {
            source,
            reveal_delay,
            last_index: None,
        }
    }

    /// Draw a winner. Only the chosen index is recorded.
    pub fn draw(&mut self, participants: &[String]) -> Result<Selection, RouletteError> {
        let (index, chosen) = select(participants, self.source.as_mut())?;
        self.last_index = Some(index);
        Ok(Selection {
            index,
            chosen,
            candidates: participants.to_vec(),
        })
    }

    /// How long the announcement is deferred after a draw.
    pub fn reveal_delay(&self) -> Duration {
        self.reveal_delay
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(
            Box::new(ThreadRngSource),
            Duration::from_millis(DEFAULT_REVEAL_DELAY_MS),
        )
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("reveal_delay", &self.reveal_delay)
            .field("last_index", &self.last_index)
            .finish_non_exhaustive()
    }
}
