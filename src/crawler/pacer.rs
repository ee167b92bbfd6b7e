//! Global politeness pacing
//!
//! Every request to the source, from any worker, first takes a slot from the
//! shared `Pacer`. Slots are handed out no closer together than the configured
//! minimum delay, so adding workers never raises the outbound request rate.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared token scheduler enforcing a minimum delay between requests
#[derive(Debug)]
pub struct Pacer {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Creates a pacer that spaces requests at least `min_delay` apart
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until the next request slot is free and claims it
    ///
    /// The lock is held across the sleep, so concurrent callers queue up and
    /// are released one per delay period in arrival order.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_delay;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!("Pacing request for {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let start = Instant::now();

        pacer.wait().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let start = Instant::now();

        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_delay() {
        let pacer = Pacer::new(Duration::from_millis(500));

        pacer.wait().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        let before = Instant::now();
        pacer.wait().await;
        assert_eq!(before.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_budget() {
        let pacer = Arc::new(Pacer::new(Duration::from_millis(200)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pacer = Arc::clone(&pacer);
            handles.push(tokio::spawn(async move {
                pacer.wait().await;
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_zero_delay_never_sleeps() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
