//! Bounded worker pool for parallel phases
//!
//! All jobs are submitted before the first result is awaited, and the pool
//! returns only once every job has finished. Results come back in submission
//! order regardless of completion order.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::RunError;

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    max_concurrency: Option<usize>,
}

impl WorkerPool {
    /// `None` runs every job of a phase at once
    pub fn new(max_concurrency: Option<usize>) -> Self {
        Self { max_concurrency }
    }

    /// Run `jobs` to completion; output `i` belongs to job `i`
    pub async fn run_all<T, F>(&self, jobs: Vec<F>) -> Result<Vec<T>, RunError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let permits = self.max_concurrency.unwrap_or(total).clamp(1, total);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut set = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, job.await)
            });
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = set.join_next().await {
            let (index, output) = joined.map_err(|e| RunError::TaskPanicked(e.to_string()))?;
            slots[index] = Some(output);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let pool = WorkerPool::new(None);
        // Later jobs finish first
        let jobs: Vec<_> = (0..5u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                i
            })
            .collect();
        assert_eq!(pool.run_all(jobs).await.unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let pool = WorkerPool::new(Some(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..6)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();
        pool.run_all(jobs).await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let pool = WorkerPool::new(None);
        let jobs: Vec<_> = (0..2u32)
            .map(|i| async move {
                if i == 1 {
                    panic!("worker failed");
                }
                i
            })
            .collect();
        assert!(matches!(pool.run_all(jobs).await, Err(RunError::TaskPanicked(_))));
    }
}
