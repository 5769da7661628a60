//! Run summary built from transfer results.

use std::fmt;
use tablesync_types::{RecordId, TransferOutcome, TransferResult};

/// One failed task, as reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Record of the failed task.
    pub record_id: RecordId,
    /// Join key of the failed task.
    pub key: String,
    /// Last failure reason.
    pub reason: String,
}

/// Counts reported when a run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Records fetched from the remote.
    pub fetched: usize,
    /// Pairs produced by the matcher.
    pub matched: usize,
    /// Tasks that succeeded.
    pub succeeded: usize,
    /// Tasks that exhausted their attempts.
    pub failed: usize,
    /// Attempts across all tasks.
    pub attempts: u64,
    /// Failed tasks, in result order.
    pub failures: Vec<FailedItem>,
}

impl SyncSummary {
    /// Aggregate transfer results.
    pub fn from_results(fetched: usize, matched: usize, results: &[TransferResult]) -> Self {
        let mut summary = Self {
            fetched,
            matched,
            ..Self::default()
        };
        for result in results {
            summary.attempts += u64::from(result.attempts);
            match &result.outcome {
                TransferOutcome::Success => summary.succeeded += 1,
                TransferOutcome::Failure(reason) => {
                    summary.failed += 1;
                    summary.failures.push(FailedItem {
                        record_id: result.record_id.clone(),
                        key: result.key.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary
    }

    /// Tasks that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Whether every processed task succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}, matched {}, processed {}, succeeded {}, failed {}",
            self.fetched,
            self.matched,
            self.processed(),
            self.succeeded,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, outcome: TransferOutcome, attempts: u32) -> TransferResult {
        TransferResult {
            record_id: RecordId::new(id).unwrap(),
            key: format!("key-{}", id),
            outcome,
            attempts,
        }
    }

    #[test]
    fn counts_successes_and_failures() {
        let results = vec![
            result("r1", TransferOutcome::Success, 1),
            result("r2", TransferOutcome::Failure("boom".into()), 3),
            result("r3", TransferOutcome::Success, 2),
        ];
        let summary = SyncSummary::from_results(10, 3, &results);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.attempts, 6);
        assert!(!summary.is_clean());
        assert_eq!(summary.failures[0].record_id.as_str(), "r2");
        assert_eq!(summary.failures[0].reason, "boom");
    }

    #[test]
    fn empty_run_is_clean() {
        let summary = SyncSummary::from_results(5, 0, &[]);
        assert!(summary.is_clean());
        assert_eq!(
            summary.to_string(),
            "fetched 5, matched 0, processed 0, succeeded 0, failed 0"
        );
    }
}
