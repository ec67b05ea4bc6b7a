//! Fixed-delay retry wrapper for transient failures.
//!
//! A failed attempt logs a warning and is retried after a fixed pause, up
//! to a bounded number of attempts. There is no backoff, no jitter and no
//! per-attempt timeout beyond the command's own blocking behavior.

use std::thread;
use std::time::Duration;

use crate::error::{BerthError, BerthResult};
use crate::logger::Logger;

/// Attempt budget and inter-attempt pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(10),
        }
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// Each failed attempt logs one warning line; exhausting the budget logs
/// one summary error line and returns [`BerthError::RetriesExhausted`].
/// The pause is skipped after the final attempt.
pub fn run_with_retry<T, F>(
    policy: RetryPolicy,
    logger: &Logger,
    operation: &str,
    mut op: F,
) -> BerthResult<T>
where
    F: FnMut() -> Result<T, String>,
{
    for attempt in 1..=policy.attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(detail) => {
                logger.warn(&format!(
                    "{operation} failed (attempt {attempt}/{}): {detail}",
                    policy.attempts
                ));
                if attempt < policy.attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }

    logger.error(&format!(
        "{operation} failed after {} attempts",
        policy.attempts
    ));

    Err(BerthError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: policy.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn test_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    fn test_logger(dir: &tempfile::TempDir) -> (Logger, std::path::PathBuf) {
        let path = dir.path().join("berth.log");
        (Logger::open(&path, false).unwrap(), path)
    }

    fn count_lines(path: &std::path::Path, needle: &str) -> usize {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }

    #[test]
    fn test_first_success_logs_nothing() {
        let dir = tempdir().unwrap();
        let (logger, path) = test_logger(&dir);

        let result = run_with_retry(test_policy(5), &logger, "fetch", || Ok::<_, String>(42));

        assert_eq!(result.unwrap(), 42);
        assert_eq!(count_lines(&path, "WARNING:"), 0);
        assert_eq!(count_lines(&path, "ERROR:"), 0);
    }

    #[test]
    fn test_four_failures_then_success() {
        let dir = tempdir().unwrap();
        let (logger, path) = test_logger(&dir);

        let mut calls = 0;
        let result = run_with_retry(test_policy(5), &logger, "fetch", || {
            calls += 1;
            if calls < 5 {
                Err("connection reset".to_string())
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls, 5);
        assert_eq!(count_lines(&path, "WARNING:"), 4);
        assert_eq!(count_lines(&path, "ERROR:"), 0);
    }

    #[test]
    fn test_exhaustion_logs_five_warnings_and_one_error() {
        let dir = tempdir().unwrap();
        let (logger, path) = test_logger(&dir);

        let result: BerthResult<()> = run_with_retry(test_policy(5), &logger, "fetch", || {
            Err("connection reset".to_string())
        });

        match result.unwrap_err() {
            BerthError::RetriesExhausted { operation, attempts } => {
                assert_eq!(operation, "fetch");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count_lines(&path, "WARNING:"), 5);
        assert_eq!(count_lines(&path, "ERROR:"), 1);
    }

    proptest! {
        // One warning per failed attempt, for any failure count within budget.
        #[test]
        fn prop_warning_count_matches_failures(failures in 0u32..5) {
            let dir = tempdir().unwrap();
            let (logger, path) = test_logger(&dir);

            let mut calls = 0;
            let result = run_with_retry(test_policy(5), &logger, "fetch", || {
                calls += 1;
                if calls <= failures {
                    Err("transient".to_string())
                } else {
                    Ok(())
                }
            });

            prop_assert!(result.is_ok());
            prop_assert_eq!(count_lines(&path, "WARNING:") as u32, failures);
            prop_assert_eq!(calls, failures + 1);
        }
    }
}
