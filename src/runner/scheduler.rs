//! Runner scheduler: drives a [`Pass`] on a timer, one worker per slice.
//!
//! Each worker runs the blocking pass on tokio's blocking pool, goes again
//! straight away if the pass saw any files, and sleeps otherwise. Workers
//! share a stop flag and each keeps its own error budget: too many failed
//! passes in a short window stops that worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use super::Pass;

/// Failed passes tolerated inside [`ERROR_WINDOW`] before a worker stops.
pub const MAX_ERRORS: u32 = 10;
/// Window for counting consecutive failures.
pub const ERROR_WINDOW: Duration = Duration::from_secs(60);

/// Handle to a set of running workers.
pub struct RunnerHandle {
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl RunnerHandle {
    /// Ask every worker to stop after its current pass.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Shared stop flag.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Wait for every worker to finish.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Runner worker panicked: {e}");
            }
        }
    }
}

/// Spawn `numslices` workers repeatedly running `pass`.
///
/// All workers may scan the same maildir; claiming keeps them from
/// processing a file twice.
pub fn spawn_runners(pass: Arc<dyn Pass>, numslices: usize, sleep_time: Duration) -> RunnerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));

    let handles = (0..numslices.max(1))
        .map(|slice| {
            let pass = Arc::clone(&pass);
            let shutdown = Arc::clone(&shutdown);
            let span = info_span!("runner", slice, numslices);
            tokio::spawn(run_worker(pass, shutdown, sleep_time).instrument(span))
        })
        .collect();

    RunnerHandle { handles, shutdown }
}

async fn run_worker(pass: Arc<dyn Pass>, shutdown: Arc<AtomicBool>, sleep_time: Duration) {
    info!("Runner started");
    let mut budget = ErrorBudget::new(MAX_ERRORS, ERROR_WINDOW);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let job = Arc::clone(&pass);
        let filecnt = match tokio::task::spawn_blocking(move || job.run_pass()).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                error!(error = %e, "Runner pass failed");
                if budget.record_failure(Instant::now()) {
                    error!("Too many errors, stopping runner");
                    break;
                }
                0
            }
            Err(e) => {
                error!("Runner pass panicked: {e}");
                if budget.record_failure(Instant::now()) {
                    error!("Too many errors, stopping runner");
                    break;
                }
                0
            }
        };

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // Busy queues go again immediately.
        if filecnt == 0 && !sleep_time.is_zero() {
            tokio::time::sleep(sleep_time).await;
        }
    }

    info!("Runner stopped");
}

/// Counts failures that follow each other within a window.
#[derive(Debug)]
struct ErrorBudget {
    max: u32,
    window: Duration,
    count: u32,
    last: Option<Instant>,
}

impl ErrorBudget {
    fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            count: 0,
            last: None,
        }
    }

    /// Record a failure at `now`. Returns true once the budget is spent.
    fn record_failure(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.window => self.count += 1,
            _ => self.count = 1,
        }
        self.last = Some(now);
        self.count >= self.max
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::PassError;

    struct CountingPass {
        calls: AtomicUsize,
    }

    impl Pass for CountingPass {
        fn run_pass(&self) -> Result<usize, PassError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct FailingPass {
        calls: AtomicUsize,
    }

    impl Pass for FailingPass {
        fn run_pass(&self) -> Result<usize, PassError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PassError::ListDir {
                path: "/nonexistent/new".into(),
                source: std::io::Error::other("boom"),
            })
        }
    }

    #[test]
    fn budget_spent_after_max_quick_failures() {
        let mut budget = ErrorBudget::new(3, Duration::from_secs(60));
        let start = Instant::now();
        assert!(!budget.record_failure(start));
        assert!(!budget.record_failure(start + Duration::from_secs(1)));
        assert!(budget.record_failure(start + Duration::from_secs(2)));
    }

    #[test]
    fn budget_resets_after_quiet_window() {
        let mut budget = ErrorBudget::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(!budget.record_failure(start));
        assert!(!budget.record_failure(start + Duration::from_secs(120)));
        assert!(budget.record_failure(start + Duration::from_secs(121)));
    }

    #[tokio::test]
    async fn workers_run_until_stopped() {
        let pass = Arc::new(CountingPass {
            calls: AtomicUsize::new(0),
        });
        let handle = spawn_runners(pass.clone(), 2, Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("workers should stop");

        let calls = pass.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected each worker to run, got {calls}");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pass.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn failing_worker_stops_on_its_own() {
        let pass = Arc::new(FailingPass {
            calls: AtomicUsize::new(0),
        });
        let handle = spawn_runners(pass.clone(), 1, Duration::from_millis(1));

        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("worker should give up");
        assert_eq!(pass.calls.load(Ordering::SeqCst), MAX_ERRORS as usize);
    }

    #[tokio::test]
    async fn stop_flag_is_shared() {
        let pass = Arc::new(CountingPass {
            calls: AtomicUsize::new(0),
        });
        let handle = spawn_runners(pass, 3, Duration::from_millis(5));
        let flag = handle.shutdown_flag();

        flag.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("workers should see the flag");
    }
}
