use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs fetch jobs off the owning loop.
pub trait Executor: Send + Sync {
    fn spawn(&self, job: Job);
}

/// One OS thread per job. Fetchers use blocking HTTP, so this keeps the
/// owning loop responsive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn spawn(&self, job: Job) {
        thread::spawn(job);
    }
}

/// Queues jobs until the owner runs them, in any order it likes.
#[derive(Clone, Default)]
pub struct DeferredExecutor {
    queue: Arc<Mutex<VecDeque<Job>>>,
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs the oldest queued job. Returns false when the queue was empty.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs the most recently queued job.
    pub fn run_latest(&self) -> bool {
        let job = self.queue.lock().pop_back();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Executor for DeferredExecutor {
    fn spawn(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}

impl std::fmt::Debug for DeferredExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn deferred_runs_in_requested_order() {
        let executor = DeferredExecutor::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            executor.spawn(Box::new(move || order.lock().push(n)));
        }
        assert_eq!(executor.pending(), 3);
        assert!(executor.run_latest());
        assert_eq!(executor.run_all(), 2);
        assert_eq!(*order.lock(), vec![2, 0, 1]);
        assert!(!executor.run_next());
    }

    #[test]
    fn thread_executor_runs_job() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = crossbeam_channel::unbounded();
        let counter = hits.clone();
        ThreadExecutor.spawn(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(());
        }));
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
