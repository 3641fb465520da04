//! # Stage: Session Runtime
//!
//! ## Responsibility
//! Drive a [`Session`] from a single task: connection events, timer events
//! and operator commands are multiplexed with `tokio::select!` and handled
//! one at a time, so the session needs no locking.
//!
//! ## Guarantees
//! - Events from a superseded connection are dropped (generation check)
//! - Timer events from a cancelled task are dropped (token check), so no
//!   countdown tick is applied after cancellation
//! - The deferred reveal never blocks frame processing
//!
//! ## NOT Responsible For
//! - Validation of operator input (done by [`RuntimeHandle`] before sending)
//! - Rendering (see `sink`)

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::connection::{ConnectionEvent, ConnectionEventKind, ConnectionManager};
use crate::error::RouletteError;
use crate::monitor::TickOutcome;
use crate::selector::Selection;
use crate::session::{FrameOutcome, Session};
use crate::sink::DisplaySink;
use crate::timer::{schedule_every, schedule_once, TaskHandle, TimerToken};
use crate::tracker::ParticipantView;

/// Countdown cadence of the winner response window.
pub const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// An operator command plus the channel its result is returned on.
#[derive(Debug)]
enum Request {
    Configure(SessionConfig, oneshot::Sender<()>),
    StartSelection(oneshot::Sender<Result<Selection, RouletteError>>),
    RemoveParticipant(String, oneshot::Sender<bool>),
    ResetSession(oneshot::Sender<()>),
    ClearChatHistory(oneshot::Sender<()>),
    CloseWinnerView(oneshot::Sender<bool>),
    Participants(oneshot::Sender<Vec<ParticipantView>>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front door to a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl RuntimeHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, RouletteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| RouletteError::RuntimeClosed)?;
        rx.await.map_err(|_| RouletteError::RuntimeClosed)
    }

    /// Validate new settings and, if valid, apply them. Validation errors
    /// are returned before anything reaches the session.
    pub async fn configure(
        &self,
        channel: &str,
        code_word: &str,
        response_timeout_secs: i64,
    ) -> Result<(), RouletteError> {
        let config = SessionConfig::new(channel, code_word, response_timeout_secs)?;
        self.call(|reply| Request::Configure(config, reply)).await
    }

    /// Draw a winner. The announcement follows after the reveal delay.
    pub async fn start_selection(&self) -> Result<Selection, RouletteError> {
        self.call(Request::StartSelection).await?
    }

    pub async fn remove_participant(&self, name: &str) -> Result<bool, RouletteError> {
        let name = name.to_string();
        self.call(|reply| Request::RemoveParticipant(name, reply))
            .await
    }

    pub async fn reset_session(&self) -> Result<(), RouletteError> {
        self.call(Request::ResetSession).await
    }

    pub async fn clear_chat_history(&self) -> Result<(), RouletteError> {
        self.call(Request::ClearChatHistory).await
    }

    /// Returns whether a live countdown was stopped.
    pub async fn close_winner_view(&self) -> Result<bool, RouletteError> {
        self.call(Request::CloseWinnerView).await
    }

    pub async fn participants(&self) -> Result<Vec<ParticipantView>, RouletteError> {
        self.call(Request::Participants).await
    }

    pub async fn shutdown(&self) -> Result<(), RouletteError> {
        self.call(Request::Shutdown).await
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum TimerEvent {
    RevealElapsed(TimerToken),
    CountdownTick(TimerToken),
}

pub struct Runtime<S: DisplaySink> {
    session: Session<S>,
    connection: ConnectionManager,
    connection_events: UnboundedReceiverStream<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<Request>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    reveal: Option<TaskHandle>,
    countdown: Option<TaskHandle>,
}

impl<S: DisplaySink> Runtime<S> {
    pub fn new(
        session: Session<S>,
        connection: ConnectionManager,
        connection_events: UnboundedReceiverStream<ConnectionEvent>,
    ) -> (Self, RuntimeHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            session,
            connection,
            connection_events,
            commands,
            timer_tx,
            timer_rx,
            reveal: None,
            countdown: None,
        };
        (runtime, RuntimeHandle { tx })
    }

    /// Connect to the configured channel and process events until shut down
    /// or every handle is dropped. Returns the final session.
    pub async fn run(mut self) -> Session<S> {
        let channel = self.session.config().channel().to_string();
        self.connection.connect(&channel);

        loop {
            tokio::select! {
                Some(event) = self.connection_events.next() => self.on_connection_event(event),
                Some(timer) = self.timer_rx.recv() => self.on_timer(timer),
                request = self.commands.recv() => {
                    let Some(request) = request else { break };
                    if !self.on_request(request) {
                        break;
                    }
                }
            }
        }

        info!("session runtime stopping");
        self.cancel_timers();
        self.connection.disconnect();
        self.session
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        if event.generation != self.connection.generation() {
            trace!(generation = event.generation, "stale connection event");
            return;
        }
        match event.kind {
            ConnectionEventKind::Status { text, connected } => {
                self.session.set_status(text, connected);
            }
            ConnectionEventKind::Frame(frame) => {
                if let FrameOutcome::Accepted(effects) = self.session.handle_frame(&frame) {
                    if effects.winner_responded {
                        self.stop_countdown();
                    }
                }
            }
            ConnectionEventKind::ReconnectScheduled { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            }
            ConnectionEventKind::GaveUp => {
                warn!("connection abandoned, waiting for reconfigure or reset");
            }
        }
    }

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::RevealElapsed(token) => {
                if !self.reveal.as_ref().is_some_and(|h| h.owns(token)) {
                    trace!("stale reveal timer");
                    return;
                }
                self.reveal = None;
                if self.session.complete_reveal() {
                    self.stop_countdown();
                    self.countdown = Some(schedule_every(
                        COUNTDOWN_PERIOD,
                        self.timer_tx.clone(),
                        TimerEvent::CountdownTick,
                    ));
                }
            }
            TimerEvent::CountdownTick(token) => {
                if !self.countdown.as_ref().is_some_and(|h| h.owns(token)) {
                    trace!("stale countdown tick");
                    return;
                }
                match self.session.tick_countdown() {
                    TickOutcome::Running { .. } => {}
                    TickOutcome::Expired | TickOutcome::Inactive => self.stop_countdown(),
                }
            }
        }
    }

    /// Returns `false` when the loop should stop.
    fn on_request(&mut self, request: Request) -> bool {
        match request {
            Request::Configure(config, reply) => {
                self.cancel_timers();
                let channel = config.channel().to_string();
                self.session.apply_config(config);
                self.connection.reconnect(&channel);
                let _ = reply.send(());
            }
            Request::StartSelection(reply) => {
                let result = self.session.start_selection();
                match &result {
                    Ok(_) => {
                        self.cancel_timers();
                        self.reveal = Some(schedule_once(
                            self.session.selector().reveal_delay(),
                            self.timer_tx.clone(),
                            TimerEvent::RevealElapsed,
                        ));
                    }
                    Err(e) => warn!(error = %e, "selection rejected"),
                }
                let _ = reply.send(result);
            }
            Request::RemoveParticipant(name, reply) => {
                let _ = reply.send(self.session.remove_participant(&name));
            }
            Request::ResetSession(reply) => {
                self.cancel_timers();
                self.session.reset();
                let channel = self.session.config().channel().to_string();
                self.connection.reconnect(&channel);
                let _ = reply.send(());
            }
            Request::ClearChatHistory(reply) => {
                self.session.clear_chat_history();
                let _ = reply.send(());
            }
            Request::CloseWinnerView(reply) => {
                let stopped = self.session.close_winner_view();
                self.stop_countdown();
                let _ = reply.send(stopped);
            }
            Request::Participants(reply) => {
                let _ = reply.send(self.session.participant_views());
            }
            Request::Shutdown(reply) => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn stop_countdown(&mut self) {
        if let Some(mut handle) = self.countdown.take() {
            handle.cancel();
        }
    }

    fn cancel_timers(&mut self) {
        self.stop_countdown();
        if let Some(mut handle) = self.reveal.take() {
            handle.cancel();
        }
    }
}
