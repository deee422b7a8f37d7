//! Progress reporting and cancellable background runs

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::result::{Error, Result};

/// Write side of a progress channel. Values only move forward and are
/// capped at 100.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<u8>,
}

impl ProgressReporter {
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    /// Report `done` out of `total`, holding below 100 until `finish`
    pub fn report_fraction(&self, done: usize, total: usize) {
        let percent = if total == 0 { 99 } else { (done * 99 / total).min(99) };
        self.report(percent as u8);
    }

    pub fn finish(&self) {
        self.report(100);
    }
}

/// Read side of a progress channel
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    rx: watch::Receiver<u8>,
}

impl ProgressHandle {
    pub fn current(&self) -> u8 {
        *self.rx.borrow()
    }

    /// Wait for the next change; `None` once the reporter is gone
    pub async fn changed(&mut self) -> Option<u8> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

pub fn progress_channel() -> (ProgressReporter, ProgressHandle) {
    let (tx, rx) = watch::channel(0);
    (ProgressReporter { tx }, ProgressHandle { rx })
}

/// A spawned pipeline run with its progress
#[derive(Debug)]
pub struct RunningTask<T> {
    handle: JoinHandle<T>,
    progress: ProgressHandle,
}

impl<T: Send + 'static> RunningTask<T> {
    /// Spawn `work` with a fresh progress channel
    pub fn spawn<F, Fut>(work: F) -> Self
    where
        F: FnOnce(ProgressReporter) -> Fut,
        Fut: std::future::Future<Output = T> + Send + 'static,
    {
        let (reporter, progress) = progress_channel();
        let handle = tokio::spawn(work(reporter));
        Self { handle, progress }
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the run. Work already done is not undone.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub async fn join(self) -> Result<T> {
        self.handle.await.map_err(|e| {
            if e.is_cancelled() {
                Error::invalid_state("Run was cancelled")
            } else {
                Error::Other(format!("Run failed: {}", e))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_goes_back() {
        let (reporter, handle) = progress_channel();
        reporter.report(40);
        reporter.report(10);
        assert_eq!(handle.current(), 40);
        reporter.report(250);
        assert_eq!(handle.current(), 100);
    }

    #[test]
    fn test_fraction_holds_below_complete() {
        let (reporter, handle) = progress_channel();
        reporter.report_fraction(10, 10);
        assert_eq!(handle.current(), 99);
        reporter.finish();
        assert_eq!(handle.current(), 100);
    }

    #[tokio::test]
    async fn test_running_task_reports_and_joins() {
        let task = RunningTask::spawn(|reporter| async move {
            reporter.report(50);
            reporter.finish();
            7
        });
        let progress = task.progress();
        assert_eq!(task.join().await.unwrap(), 7);
        assert_eq!(progress.current(), 100);
    }

    #[tokio::test]
    async fn test_aborted_task_joins_as_cancelled() {
        let task = RunningTask::spawn(|_reporter| async move {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        task.abort();
        assert!(matches!(task.join().await, Err(Error::InvalidState(_))));
    }
}
