//! Trailing-edge debouncer used by the watcher.
//!
//! An explicit component rather than a closure over mutable state, so the
//! reconciler's select loop owns the timing and tests can drive it with
//! tokio's paused clock.

use std::future::pending;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Coalesces rapid-fire pokes into a single firing per quiet period.
///
/// Each [`poke`](Debouncer::poke) arms or extends the window;
/// [`fired`](Debouncer::fired) completes once the window elapses with no
/// further pokes, then disarms. An unarmed debouncer's `fired` never completes,
/// which makes it safe to select on unconditionally.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the debouncer, or push the pending deadline further out.
    pub fn poke(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Whether a firing is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any pending firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Complete once the quiet period elapses. Cancel-safe: the deadline
    /// lives on `self`, so dropping and re-creating this future (as a
    /// `select!` loop does every iteration) loses nothing.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}
