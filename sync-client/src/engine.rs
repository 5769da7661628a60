//! Bounded-concurrency transfer engine.
//!
//! Every task runs on its own tokio task, gated by a semaphore sized to
//! the worker limit. A task that fails is retried as a whole after a fixed
//! delay, keeping its worker slot while it waits. Failures never cross task
//! boundaries: one task exhausting its attempts does not affect the others.
//!
//! Results come back in submission order, one per task, regardless of the
//! order in which tasks finish.

use async_trait::async_trait;
use std::sync::Arc;
use tablesync_core::RetryPolicy;
use tablesync_types::{RecordId, TransferOutcome, TransferResult};
use tokio::sync::Semaphore;

use crate::tasks::TransferError;

/// One unit of work for the engine.
#[async_trait]
pub trait TransferTask: Send + Sync + 'static {
    /// Record this task is for.
    fn record_id(&self) -> &RecordId;

    /// Join key, for reporting.
    fn key(&self) -> &str;

    /// Perform one attempt of the transfer.
    async fn execute(&self) -> Result<(), TransferError>;
}

/// Runs tasks under a worker limit with task-level retry.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    worker_limit: usize,
    retry: RetryPolicy,
}

impl TransferEngine {
    /// Create an engine. A worker limit of 0 is raised to 1.
    pub fn new(worker_limit: usize, retry: RetryPolicy) -> Self {
        Self {
            worker_limit: worker_limit.max(1),
            retry,
        }
    }

    /// Run every task to a terminal state and return one result per task,
    /// in submission order.
    pub async fn run<T: TransferTask>(&self, tasks: Vec<T>) -> Vec<TransferResult> {
        let semaphore = Arc::new(Semaphore::new(self.worker_limit));
        let mut handles = Vec::with_capacity(tasks.len());

        tracing::info!(
            "Running {} transfers with {} workers (max {} attempts)",
            tasks.len(),
            self.worker_limit,
            self.retry.max_attempts()
        );

        for task in tasks {
            let record_id = task.record_id().clone();
            let key = task.key().to_string();
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry;

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!("Failed to acquire worker slot: {}", e);
                        return failed(&task, 0, e.to_string());
                    }
                };
                run_with_retry(&task, &retry).await
            });
            handles.push((record_id, key, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (record_id, key, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Transfer task for {} panicked: {}", key, e);
                    TransferResult {
                        record_id,
                        key,
                        outcome: TransferOutcome::Failure("task panicked".into()),
                        attempts: 0,
                    }
                }
            };
            results.push(result);
        }
        results
    }
}

fn failed<T: TransferTask>(task: &T, attempts: u32, reason: String) -> TransferResult {
    TransferResult {
        record_id: task.record_id().clone(),
        key: task.key().to_string(),
        outcome: TransferOutcome::Failure(reason),
        attempts,
    }
}

async fn run_with_retry<T: TransferTask>(task: &T, retry: &RetryPolicy) -> TransferResult {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match task.execute().await {
            Ok(()) => {
                tracing::info!("Transferred {} (record {})", task.key(), task.record_id());
                return TransferResult {
                    record_id: task.record_id().clone(),
                    key: task.key().to_string(),
                    outcome: TransferOutcome::Success,
                    attempts: attempt,
                };
            }
            Err(e) if retry.should_retry(attempt) => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt,
                    retry.max_attempts(),
                    task.key(),
                    e,
                    retry.delay()
                );
                tokio::time::sleep(retry.delay()).await;
            }
            Err(e) => {
                tracing::error!(
                    "Giving up on {} after {} attempts: {}",
                    task.key(),
                    attempt,
                    e
                );
                return failed(task, attempt, e.to_string());
            }
        }
    }
}
