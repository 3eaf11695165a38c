//! Bounded polling for server readiness.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time spent sleeping.
    pub fn ceiling(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Shared flag that aborts a wait in progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("gave up after {attempts} attempts ({waited:?})")]
    TimedOut { attempts: u32, waited: Duration },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Polls `probe` until it returns true.
///
/// Returns the number of attempts used. Sleeps `policy.interval` after each
/// failed probe, so the total wait never exceeds `policy.ceiling()`.
pub fn wait_until(
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
    mut probe: impl FnMut() -> bool,
) -> Result<u32, WaitError> {
    let started = Instant::now();

    for attempt in 1..=policy.max_attempts {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(WaitError::Cancelled {
                attempts: attempt - 1,
            });
        }
        if probe() {
            return Ok(attempt);
        }
        std::thread::sleep(policy.interval);
    }

    Err(WaitError::TimedOut {
        attempts: policy.max_attempts,
        waited: started.elapsed(),
    })
}

/// Waits for `path` to exist.
pub fn wait_for_path(
    path: &Path,
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
) -> Result<u32, WaitError> {
    wait_until(policy, cancel, || path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.ceiling(), Duration::from_secs(2));
    }

    #[test]
    fn test_succeeds_on_later_attempt() {
        let mut calls = 0;
        let attempts = wait_until(&fast(10), None, || {
            calls += 1;
            calls == 3
        })
        .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_times_out_after_max_attempts() {
        let mut calls = 0;
        let err = wait_until(&fast(4), None, || {
            calls += 1;
            false
        })
        .unwrap_err();
        assert!(matches!(err, WaitError::TimedOut { attempts: 4, .. }));
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_cancel_stops_probing() {
        let token = CancelToken::new();
        let mut calls = 0;
        let err = wait_until(&fast(100), Some(&token), || {
            calls += 1;
            if calls == 2 {
                token.cancel();
            }
            false
        })
        .unwrap_err();
        assert_eq!(err, WaitError::Cancelled { attempts: 2 });
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_wait_for_path() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("pidfile");

        assert!(wait_for_path(&marker, &fast(2), None).is_err());

        std::fs::write(&marker, "1234").unwrap();
        assert_eq!(wait_for_path(&marker, &fast(2), None), Ok(1));
    }
}
