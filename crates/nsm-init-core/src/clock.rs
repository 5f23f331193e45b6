//! Time source for the retry loops.
//!
//! The loops only ever read the current instant, sleep until an absolute
//! instant, or wait for the deadline while a broker call is in flight, so
//! swapping the clock is enough to run them without real delays.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Monotonic time source with an absolute sleep.
#[async_trait::async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend until `deadline`. Returns immediately if it already passed.
    async fn sleep_until(&self, deadline: Instant);

    /// Resolve once the clock has reached `deadline`, without driving it there.
    ///
    /// Raced against broker calls; for a real clock this is the same as
    /// [`sleep_until`](Clock::sleep_until).
    async fn reached(&self, deadline: Instant);
}

/// Production clock backed by the tokio timer.
///
/// Honors `tokio::time::pause`, so tests on a paused runtime also run
/// without waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }

    async fn reached(&self, deadline: Instant) {
        self.sleep_until(deadline).await;
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves when something sleeps or when [`ManualClock::advance`] is
/// called; sleeping jumps straight to the requested instant. Waiting with
/// [`Clock::reached`] never moves time.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: watch::Sender<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        let (elapsed, _) = watch::channel(Duration::ZERO);
        Self {
            origin: Instant::now(),
            elapsed,
        }
    }

    /// Time that passed on this clock since it was created.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.borrow()
    }

    /// Move time forward, e.g. to simulate a slow broker call.
    pub fn advance(&self, by: Duration) {
        self.elapsed.send_modify(|elapsed| *elapsed += by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep_until(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.origin);
        self.elapsed.send_if_modified(|elapsed| {
            if target > *elapsed {
                *elapsed = target;
                true
            } else {
                false
            }
        });
    }

    async fn reached(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.origin);
        let mut rx = self.elapsed.subscribe();
        loop {
            let elapsed = *rx.borrow_and_update();
            if elapsed >= target || rx.changed().await.is_err() {
                return;
            }
        }
    }
}
