//! Cancellable scheduled tasks.
//!
//! A scheduled task sends an event into an unbounded channel after a delay,
//! or once per period. The caller keeps the returned [`TaskHandle`]; every
//! event carries the handle's [`TimerToken`] so the receiver can discard
//! events that were already queued when the task was cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one scheduled task. Tokens are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a scheduled task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TaskHandle {
    token: TimerToken,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// Stop the task. Cancelling twice is a no-op.
    pub fn cancel(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_none()
    }

    /// True if `token` belongs to this handle and it has not been cancelled.
    pub fn owns(&self, token: TimerToken) -> bool {
        !self.is_cancelled() && self.token == token
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Send `make(token)` once, after `delay`.
pub fn schedule_once<T, F>(delay: Duration, tx: UnboundedSender<T>, make: F) -> TaskHandle
where
    T: Send + 'static,
    F: FnOnce(TimerToken) -> T + Send + 'static,
{
    let token = TimerToken::next();
    let join = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(make(token));
    });
    TaskHandle {
        token,
        abort: Some(join.abort_handle()),
    }
}

/// Send `make(token)` every `period`, starting one period from now, until
/// cancelled or the receiver is dropped.
pub fn schedule_every<T, F>(period: Duration, tx: UnboundedSender<T>, make: F) -> TaskHandle
where
    T: Send + 'static,
    F: Fn(TimerToken) -> T + Send + 'static,
{
    let token = TimerToken::next();
    let join = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        loop {
            ticker.tick().await;
            if tx.send(make(token)).is_err() {
                break;
            }
        }
    });
    TaskHandle {
        token,
        abort: Some(join.abort_handle()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = schedule_once(Duration::from_millis(6_500), tx, |t| t);
        let start = tokio::time::Instant::now();
        let token = rx.recv().await.unwrap();
        assert_eq!(token, handle.token());
        assert!(start.elapsed() >= Duration::from_millis(6_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_once_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerToken>();
        let mut handle = schedule_once(Duration::from_secs(1), tx, |t| t);
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_secs(5)).await;
        // The aborted task dropped its sender, so the channel is closed and empty.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_once_per_period_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = schedule_every(Duration::from_secs(1), tx, |t| t);
        let start = tokio::time::Instant::now();
        for n in 1..=3u64 {
            let token = rx.recv().await.unwrap();
            assert!(handle.owns(token));
            assert!(start.elapsed() >= Duration::from_secs(n));
        }
        handle.cancel();
        assert!(!handle.owns(handle.token()));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerToken>();
        drop(schedule_every(Duration::from_secs(1), tx, |t| t));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(TimerToken::next(), TimerToken::next());
    }
}
