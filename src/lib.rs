//! Live stream chat code-word tracker with a timed winner roulette.
//!
//! Frames from the chat provider flow through
//! `connection` → `decoder` → `dedup` → {`tracker`, `monitor`} → `sink`,
//! all owned by a single [`session::Session`] driven by [`runtime::Runtime`].

pub mod backoff;
pub mod cli;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod dedup;
pub mod error;
pub mod lookup;
pub mod monitor;
pub mod runtime;
pub mod selector;
pub mod session;
pub mod sink;
pub mod timer;
pub mod tracker;

pub use config::{AppConfig, ConnectionConfig, SessionConfig};
pub use connection::{ConnectionManager, PusherTransport, Transport};
pub use decoder::{decode_frame, ChatMessage, Decoded, IgnoreReason};
pub use error::{ConfigError, RouletteError};
pub use lookup::{KickRoomLookup, RoomLookup};
pub use runtime::{Runtime, RuntimeHandle};
pub use selector::{Selection, Selector};
pub use session::{FrameOutcome, Session};
pub use sink::{DisplaySink, Notification};
