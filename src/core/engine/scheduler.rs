use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Fixed-interval driver for poll cycles.
///
/// Runs a cycle right away, then sleeps for `interval` (Idle) before the next
/// one (Polling). Cancelling the token ends the sleep early; a cycle that is
/// already running always finishes first.
pub struct Scheduler {
    interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(interval: Duration, shutdown: CancellationToken) -> Self {
        Self { interval, shutdown }
    }

    /// Returns the number of cycles that ran.
    pub async fn run<F, Fut>(&self, mut cycle: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut cycles = 0;

        while !self.shutdown.is_cancelled() {
            cycle().await;
            cycles += 1;

            tracing::debug!("Sleeping for {}s...", self.interval.as_secs());
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(cycles, "Scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_until_cancelled() {
        let token = CancellationToken::new();
        let scheduler = Scheduler::new(Duration::from_millis(1), token.clone());

        let mut count = 0;
        let cycles = scheduler
            .run(|| {
                count += 1;
                let token = token.clone();
                let stop = count == 3;
                async move {
                    if stop {
                        token.cancel();
                    }
                }
            })
            .await;

        assert_eq!(cycles, 3);
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let scheduler = Scheduler::new(Duration::from_millis(1), token);

        let cycles = scheduler.run(|| async {}).await;
        assert_eq!(cycles, 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let token = CancellationToken::new();
        let scheduler = Scheduler::new(Duration::from_secs(3600), token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let cycles = tokio::time::timeout(Duration::from_secs(5), scheduler.run(|| async {}))
            .await
            .expect("scheduler should stop once cancelled");
        assert_eq!(cycles, 1);
    }
}
