//! engine::maintenance
//!
//! Background maintenance queue.
//!
//! # Architecture
//!
//! Mount returns as soon as the enlistment is `Active`; cleanup that does
//! not gate the mount runs afterwards on a single worker thread fed by an
//! mpsc channel. Pending work is counted under a mutex so callers can wait
//! for the queue to drain with [`MaintenanceQueue::wait_for_idle`].
//!
//! # Invariants
//!
//! - The pending count is raised before a task is sent and lowered only
//!   after it has finished, so a drained queue really is idle
//! - Task failures and panics are logged and counted, never propagated
//! - Tasks run one at a time in enqueue order
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use vmount::engine::maintenance::{MaintenanceQueue, MaintenanceTask};
//!
//! let queue = MaintenanceQueue::start()?;
//! queue.enqueue(MaintenanceTask::ReconcileStaleLocks(reconciler));
//! assert!(queue.wait_for_idle(Duration::from_secs(5)));
//! ```

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::reconcile::StaleLockReconciler;

/// Boxed job for [`MaintenanceTask::Custom`].
pub type MaintenanceJob = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// A unit of background work.
pub enum MaintenanceTask {
    /// Remove stale git lock files.
    ReconcileStaleLocks(StaleLockReconciler),
    /// Arbitrary named job.
    Custom { name: String, job: MaintenanceJob },
}

impl MaintenanceTask {
    /// Wrap a closure as a named task.
    pub fn custom(
        name: impl Into<String>,
        job: impl FnOnce() -> Result<(), String> + Send + 'static,
    ) -> Self {
        MaintenanceTask::Custom {
            name: name.into(),
            job: Box::new(job),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MaintenanceTask::ReconcileStaleLocks(_) => "reconcile-stale-locks",
            MaintenanceTask::Custom { name, .. } => name,
        }
    }

    fn run(self) -> Result<(), String> {
        match self {
            MaintenanceTask::ReconcileStaleLocks(reconciler) => {
                let report = reconciler.reconcile();
                if report.is_clean() {
                    Ok(())
                } else {
                    let failed: Vec<String> = report
                        .failed
                        .iter()
                        .map(|(path, e)| format!("{}: {}", path.display(), e))
                        .collect();
                    Err(failed.join("; "))
                }
            }
            MaintenanceTask::Custom { job, .. } => job(),
        }
    }
}

impl fmt::Debug for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceTask::ReconcileStaleLocks(r) => {
                f.debug_tuple("ReconcileStaleLocks").field(r).finish()
            }
            MaintenanceTask::Custom { name, .. } => {
                f.debug_struct("Custom").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

/// Counters exposed by [`MaintenanceQueue::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceStats {
    pub pending: usize,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Shared {
    stats: Mutex<MaintenanceStats>,
    idle: Condvar,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, MaintenanceStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-worker queue of maintenance tasks.
#[derive(Debug)]
pub struct MaintenanceQueue {
    sender: Mutex<Option<Sender<MaintenanceTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl MaintenanceQueue {
    /// Spawn the worker thread.
    pub fn start() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("vmount-maintenance".to_string())
            .spawn(move || drain_loop(rx, worker_shared))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            shared,
        })
    }

    /// Queue a task. Returns `false` if the queue has been shut down.
    pub fn enqueue(&self, task: MaintenanceTask) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            warn!(task = task.name(), "maintenance queue is shut down; task dropped");
            return false;
        };

        self.shared.stats().pending += 1;
        debug!(task = task.name(), "maintenance task queued");
        match sender.send(task) {
            Ok(()) => true,
            Err(mpsc::SendError(task)) => {
                warn!(task = task.name(), "maintenance worker gone; task dropped");
                record_finished(&self.shared, false);
                false
            }
        }
    }

    /// Block until no work is pending or `timeout` elapses.
    ///
    /// Returns `true` only if the queue is idle.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let guard = self.shared.stats();
        let (guard, _) = self
            .shared
            .idle
            .wait_timeout_while(guard, timeout, |s| s.pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        guard.pending == 0
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        self.shared.stats().pending
    }

    pub fn stats(&self) -> MaintenanceStats {
        *self.shared.stats()
    }

    /// Stop accepting work, finish queued tasks, and join the worker.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("maintenance worker exited abnormally");
            }
        }
    }
}

impl Drop for MaintenanceQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn record_finished(shared: &Shared, ok: bool) {
    let mut stats = shared.stats();
    stats.pending = stats.pending.saturating_sub(1);
    if ok {
        stats.completed += 1;
    } else {
        stats.failed += 1;
    }
    if stats.pending == 0 {
        shared.idle.notify_all();
    }
}

fn drain_loop(rx: Receiver<MaintenanceTask>, shared: Arc<Shared>) {
    while let Ok(task) = rx.recv() {
        let name = task.name().to_string();
        let ok = match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(Ok(())) => {
                debug!(task = %name, "maintenance task finished");
                true
            }
            Ok(Err(e)) => {
                warn!(task = %name, error = %e, "maintenance task failed; will retry on next mount");
                false
            }
            Err(_) => {
                warn!(task = %name, "maintenance task panicked");
                false
            }
        };
        record_finished(&shared, ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::sync_channel;

    #[test]
    fn idle_queue_is_idle() {
        let queue = MaintenanceQueue::start().unwrap();
        assert!(queue.wait_for_idle(Duration::from_millis(10)));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn runs_tasks_in_order() {
        let queue = MaintenanceQueue::start().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue.enqueue(MaintenanceTask::custom(format!("t{i}"), move || {
                seen.lock().unwrap().push(i);
                Ok(())
            }));
        }
        assert!(queue.wait_for_idle(Duration::from_secs(5)));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.stats().completed, 5);
    }

    #[test]
    fn wait_times_out_while_task_blocks() {
        let queue = MaintenanceQueue::start().unwrap();
        let (release_tx, release_rx) = sync_channel::<()>(0);
        queue.enqueue(MaintenanceTask::custom("blocked", move || {
            let _ = release_rx.recv();
            Ok(())
        }));

        assert!(!queue.wait_for_idle(Duration::from_millis(50)));
        assert_eq!(queue.pending(), 1);

        release_tx.send(()).unwrap();
        assert!(queue.wait_for_idle(Duration::from_secs(5)));
    }

    #[test]
    fn failures_and_panics_are_counted() {
        let queue = MaintenanceQueue::start().unwrap();
        queue.enqueue(MaintenanceTask::custom("fails", || Err("nope".to_string())));
        queue.enqueue(MaintenanceTask::custom("panics", || panic!("boom")));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_task = Arc::clone(&ran);
        queue.enqueue(MaintenanceTask::custom("after", move || {
            ran_in_task.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        assert!(queue.wait_for_idle(Duration::from_secs(5)));
        let stats = queue.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn enqueue_after_shutdown_is_rejected() {
        let queue = MaintenanceQueue::start().unwrap();
        queue.shutdown();
        assert!(!queue.enqueue(MaintenanceTask::custom("late", || Ok(()))));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn shutdown_finishes_queued_work() {
        let queue = MaintenanceQueue::start().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            queue.enqueue(MaintenanceTask::custom("count", move || {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }
        queue.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn task_debug_hides_closure() {
        let task = MaintenanceTask::custom("x", || Ok(()));
        assert!(format!("{task:?}").contains("Custom"));
        assert_eq!(task.name(), "x");
    }
}
