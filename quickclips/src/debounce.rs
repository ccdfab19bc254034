//! Debounced persistence writes.
//!
//! Each collection gets one `Debouncer`. Scheduling a write replaces any write
//! still waiting out its delay, so only the newest snapshot reaches storage.
//! Writes for one debouncer never run concurrently and never run out of order.
//! A write that fails stays pending until a later run or `flush` succeeds.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::interface::QuickClipsError;
use crate::store::runtime_handle;

type Job = Box<dyn FnMut() -> Result<(), QuickClipsError> + Send>;

struct Pending {
    token: CancellationToken,
    slot: Arc<Mutex<Option<Job>>>,
}

pub struct Debouncer {
    label: &'static str,
    delay: Duration,
    pending: Mutex<Option<Pending>>,
    write_lock: Arc<Mutex<()>>,
}

impl Debouncer {
    pub fn new(label: &'static str, delay: Duration) -> Self {
        Self {
            label,
            delay,
            pending: Mutex::new(None),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run `job` once the delay elapses without another `schedule` call
    pub fn schedule<F>(&self, job: F)
    where
        F: FnMut() -> Result<(), QuickClipsError> + Send + 'static,
    {
        let token = CancellationToken::new();
        let slot: Arc<Mutex<Option<Job>>> = Arc::new(Mutex::new(Some(Box::new(job))));

        let previous = self.pending.lock().replace(Pending {
            token: token.clone(),
            slot: slot.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        let delay = self.delay;
        let label = self.label;
        let write_lock = self.write_lock.clone();
        runtime_handle().spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let outcome = tokio::task::spawn_blocking(move || {
                        run_pending(&write_lock, &slot, Some(&token))
                    })
                    .await;
                    match outcome {
                        Ok(Ok(())) => tracing::debug!(collection = label, "persisted"),
                        Ok(Err(e)) => tracing::warn!(collection = label, error = %e, "persist failed"),
                        Err(e) => tracing::warn!(collection = label, error = %e, "persist task aborted"),
                    }
                }
            }
        });
    }

    /// Write the pending snapshot now, if there is one.
    ///
    /// On failure the snapshot stays pending so a later flush can retry it.
    pub fn flush(&self) -> Result<(), QuickClipsError> {
        let Some(pending) = self.pending.lock().take() else {
            return Ok(());
        };
        pending.token.cancel();
        let result = run_pending(&self.write_lock, &pending.slot, None);
        if result.is_err() {
            let mut current = self.pending.lock();
            if current.is_none() {
                *current = Some(pending);
            }
        }
        result
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|pending| pending.slot.lock().is_some())
    }
}

/// Take and run the job under the write lock. A timer-driven run whose token
/// was cancelled has been superseded and writes nothing. A failed job goes
/// back into its slot.
fn run_pending(
    write_lock: &Mutex<()>,
    slot: &Mutex<Option<Job>>,
    token: Option<&CancellationToken>,
) -> Result<(), QuickClipsError> {
    let _write = write_lock.lock();
    if token.is_some_and(CancellationToken::is_cancelled) {
        return Ok(());
    }
    let Some(mut job) = slot.lock().take() else {
        return Ok(());
    };
    let result = job();
    if result.is_err() {
        *slot.lock() = Some(job);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Arc<AtomicUsize>) {
        (Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicUsize::new(0)))
    }

    #[tokio::test]
    async fn test_last_schedule_wins_on_flush() {
        let debouncer = Debouncer::new("test", Duration::from_secs(60));
        let (written, calls) = recorder();

        for value in 1..=3 {
            let written = written.clone();
            let calls = calls.clone();
            debouncer.schedule(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                written.lock().push(value);
                Ok(())
            });
        }
        assert!(debouncer.has_pending());

        debouncer.flush().unwrap();
        assert_eq!(*written.lock(), vec![3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test]
    async fn test_write_runs_after_delay() {
        let debouncer = Debouncer::new("test", Duration::from_millis(10));
        let (written, _) = recorder();

        let sink = written.clone();
        debouncer.schedule(move || {
            sink.lock().push(7);
            Ok(())
        });

        for _ in 0..100 {
            if !written.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*written.lock(), vec![7]);

        // Already written: flush has nothing left to do
        debouncer.flush().unwrap();
        assert_eq!(*written.lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_flush_without_pending_is_ok() {
        let debouncer = Debouncer::new("test", Duration::from_millis(5));
        assert!(debouncer.flush().is_ok());
        assert!(!debouncer.has_pending());
    }

    #[tokio::test]
    async fn test_flush_reports_write_error() {
        let debouncer = Debouncer::new("test", Duration::from_secs(60));
        debouncer.schedule(|| Err(QuickClipsError::Storage("disk full".into())));
        assert!(matches!(debouncer.flush(), Err(QuickClipsError::Storage(_))));
        // Still pending, so the next flush tries again
        assert!(debouncer.has_pending());
        assert!(matches!(debouncer.flush(), Err(QuickClipsError::Storage(_))));
    }

    #[tokio::test]
    async fn test_failed_timed_write_is_retried_by_flush() {
        let debouncer = Debouncer::new("test", Duration::from_millis(5));
        let (written, calls) = recorder();

        let sink = written.clone();
        let attempts = calls.clone();
        debouncer.schedule(move || {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(QuickClipsError::Storage("disk full".into()));
            }
            sink.lock().push(9);
            Ok(())
        });

        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Let the failed run hand the job back before flushing
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(written.lock().is_empty());
        assert!(debouncer.has_pending());

        debouncer.flush().unwrap();
        assert_eq!(*written.lock(), vec![9]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!debouncer.has_pending());
    }
}
