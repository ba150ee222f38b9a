//! Retry timer for failed chat sends.
//!
//! The timer is a plain value owned by the controller. It holds at most one
//! deadline; the driver awaits [`wait_until`] on that deadline alongside user
//! input and calls back into the controller when it fires.

use std::time::Duration;
use tokio::time::Instant;

/// Default delay before the single automatic retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(25);

/// A cancellable, single-shot retry deadline.
#[derive(Debug, Clone)]
pub struct RetryTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RetryTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms the timer `delay` from now, replacing any earlier deadline.
    pub fn schedule(&mut self) -> Instant {
        let deadline = Instant::now() + self.delay;
        self.deadline = Some(deadline);
        deadline
    }

    /// Disarms the timer. Returns true if a retry was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true if armed and the deadline has passed.
    pub fn is_due(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

/// Completes at `deadline`, or never when there is none.
///
/// Intended as one branch of a `tokio::select!`.
pub async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn schedule_arms_one_deadline() {
        let mut timer = RetryTimer::default();
        assert!(!timer.is_pending());

        let deadline = timer.schedule();

        assert_eq!(timer.deadline(), Some(deadline));
        assert_eq!(deadline - Instant::now(), Duration::from_secs(25));
        assert!(!timer.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms() {
        let mut timer = RetryTimer::new(Duration::from_secs(5));
        timer.schedule();

        assert!(timer.cancel());
        assert!(!timer.is_pending());
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn becomes_due_after_delay() {
        let mut timer = RetryTimer::new(Duration::from_secs(5));
        let deadline = timer.schedule();

        wait_until(Some(deadline)).await;

        assert!(timer.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_without_deadline_never_completes() {
        let waited = tokio::time::timeout(Duration::from_secs(3600), wait_until(None)).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_moves_the_deadline() {
        let mut timer = RetryTimer::new(Duration::from_secs(5));
        let first = timer.schedule();
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = timer.schedule();

        assert!(second > first);
        assert_eq!(timer.deadline(), Some(second));
    }
}
