//! Overall deadline and cooperative cancellation
//!
//! Checked only between ticks: an in-flight remote call is never interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Shortest pause between two ticks; zero or tiny intervals are raised to this.
pub const MIN_TICK: Duration = Duration::from_millis(100);

/// Shared flag the caller trips to stop scheduling further ticks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Absolute point in time after which no further tick is scheduled
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    cancel: Option<CancelFlag>,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            cancel: None,
        }
    }

    pub fn at(at: Instant) -> Self {
        Self { at, cancel: None }
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// A tighter deadline that shares this one's cancel flag
    pub fn narrowed(&self, timeout: Duration) -> Self {
        Self {
            at: self.at.min(Instant::now() + timeout),
            cancel: self.cancel.clone(),
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    /// Sleep for at least [`MIN_TICK`], cut short at the deadline.
    ///
    /// Returns `false` when the deadline has passed on wake-up.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let wait = duration.max(MIN_TICK).min(self.remaining());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        !self.is_expired()
    }
}
