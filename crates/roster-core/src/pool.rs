//! Bounded worker pool with a fixed per-unit throttle.
//!
//! Units run as tokio tasks gated by a counting semaphore. A slot is taken
//! before a unit is spawned, so at most `width` units exist at once. When a
//! unit finishes, its slot stays held for the throttle delay before the next
//! unit may use it. This is a flat window, not a backoff.
//!
//! [`WorkerPool::run`] returns only after every spawned unit has finished.

use crate::config::MigrationConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Clamp a requested width into the supported range.
pub fn clamp_width(requested: usize) -> usize {
    requested.clamp(MigrationConfig::MIN_CONCURRENCY, MigrationConfig::MAX_CONCURRENCY)
}

/// Outputs of a pool run, in completion order.
#[derive(Debug)]
pub struct PoolOutcome<R> {
    pub outputs: Vec<R>,
    /// Units that panicked instead of producing an output.
    pub panicked: usize,
}

/// Fixed-width pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    width: usize,
    throttle: Duration,
}

impl WorkerPool {
    pub fn new(requested_width: usize, throttle: Duration) -> Self {
        let width = clamp_width(requested_width);
        if width != requested_width {
            debug!(
                "Requested concurrency {} clamped to {}",
                requested_width, width
            );
        }
        Self { width, throttle }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Run `work` over every item and wait for all of them.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> PoolOutcome<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.width));
        let work = Arc::new(work);
        let mut join_set = JoinSet::new();
        let mut outcome = PoolOutcome {
            outputs: Vec::with_capacity(items.len()),
            panicked: 0,
        };

        for item in items {
            // The semaphore is never closed, so acquisition cannot fail.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let work = work.clone();
            let throttle = self.throttle;
            join_set.spawn(async move {
                let output = work(item).await;
                tokio::time::sleep(throttle).await;
                drop(permit);
                output
            });

            while let Some(joined) = join_set.try_join_next() {
                collect(&mut outcome, joined);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            collect(&mut outcome, joined);
        }

        outcome
    }
}

fn collect<R>(outcome: &mut PoolOutcome<R>, joined: Result<R, tokio::task::JoinError>) {
    match joined {
        Ok(output) => outcome.outputs.push(output),
        Err(e) => {
            error!("Worker unit did not complete: {}", e);
            outcome.panicked += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_width_is_clamped() {
        let widths: Vec<_> = [0, 1, 5, 100]
            .iter()
            .map(|w| WorkerPool::new(*w, Duration::ZERO).width())
            .collect();
        assert_eq!(widths, vec![1, 1, 5, 5]);
        assert_eq!(clamp_width(3), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_width() {
        let pool = WorkerPool::new(2, Duration::from_millis(10));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (c, p) = (current.clone(), peak.clone());
        let outcome = pool
            .run((0..8).collect(), move |i: usize| {
                let (c, p) = (c.clone(), p.clone());
                async move {
                    let now = c.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    c.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let mut outputs = outcome.outputs;
        outputs.sort();
        assert_eq!(outputs, (0..8).collect::<Vec<_>>());
        assert_eq!(outcome.panicked, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_held_for_throttle_after_each_unit() {
        let throttle = Duration::from_millis(500);
        let pool = WorkerPool::new(1, throttle);
        let starts = Arc::new(Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let began = Instant::now();
        pool.run(vec![(); 4], move |_| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(Instant::now());
            }
        })
        .await;

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= throttle);
        }
        // Each completed unit holds its slot for the full delay.
        assert!(began.elapsed() >= throttle * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_time_scales_with_width() {
        let throttle = Duration::from_secs(1);
        let pool = WorkerPool::new(3, throttle);
        let began = Instant::now();
        let outcome = pool.run(vec![(); 6], |_| async {}).await;
        assert_eq!(outcome.outputs.len(), 6);
        assert!(began.elapsed() >= throttle * 2);
        assert!(began.elapsed() < throttle * 3);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_counted() {
        let pool = WorkerPool::new(2, Duration::ZERO);
        let outcome = pool
            .run(vec![1, 2, 3], |i: i32| async move {
                if i == 2 {
                    panic!("unit {i} failed");
                }
                i
            })
            .await;
        assert_eq!(outcome.outputs.len(), 2);
        assert_eq!(outcome.panicked, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let pool = WorkerPool::new(3, Duration::from_secs(60));
        let outcome: PoolOutcome<()> = pool.run(Vec::<()>::new(), |_| async {}).await;
        assert!(outcome.outputs.is_empty());
    }
}
