// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded, order-preserving fan-out for the per-datapoint loop (§5).
//!
//! Parallelism is never required for determinism, but when the pool does
//! run tasks concurrently, results must be merged back into plan order
//! before anything is persisted. [`WorkerPool::run_ordered`] tags every
//! spawned task with its submission index and sorts the collected outputs
//! by that index, so callers never depend on completion order.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A bounded-concurrency task runner.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool that runs at most `concurrency` tasks at once.
    /// `concurrency` is clamped to at least `1`.
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Run `make_task(item)` for every item in `items`, at most as many
    /// concurrently as this pool's configured concurrency, and return the
    /// outputs in the same order as `items` regardless of completion order.
    ///
    /// A task that panics is treated as an orchestrator bug, not a
    /// per-item failure, and the panic is propagated.
    pub async fn run_ordered<T, O, F, Fut>(&self, items: Vec<T>, make_task: F) -> Vec<O>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: std::future::Future<Output = O> + Send + 'static,
    {
        let mut set = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let permit = Arc::clone(&self.semaphore);
            let fut = make_task(item);
            set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                (index, fut.await)
            });
        }

        let mut results: Vec<(usize, O)> = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            results.push(joined.expect("worker task panicked"));
        }
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, output)| output).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_submission_order_despite_variable_latency() {
        let pool = WorkerPool::new(3);
        let items = vec![5u64, 1, 4, 2, 3];
        let results = pool
            .run_ordered(items.clone(), |delay_ms| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms
            })
            .await;
        assert_eq!(results, items);
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let pool = WorkerPool::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..6).collect();

        pool.run_ordered(items, {
            let in_flight = Arc::clone(&in_flight);
            let max_observed = Arc::clone(&max_observed);
            move |_| {
                let in_flight = Arc::clone(&in_flight);
                let max_observed = Arc::clone(&max_observed);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        })
        .await;

        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let pool = WorkerPool::new(4);
        let results: Vec<u32> = pool.run_ordered(vec![], |x: u32| async move { x }).await;
        assert!(results.is_empty());
    }
}
