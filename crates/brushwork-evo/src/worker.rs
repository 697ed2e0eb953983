//! Bounded scoring worker pool with an explicit join barrier.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{EvoError, Result};

/// Upper bound on scoring threads.
pub const MAX_THREADS: usize = 20;

/// Runs indexed jobs on a dedicated rayon pool and collects their results.
///
/// `dispatch` never blocks. `wait` blocks until every job dispatched since the
/// previous `wait` has reported back, then hands out the results keyed by the
/// index they were dispatched with.
pub struct WorkerPool<T: Send + 'static> {
    pool: rayon::ThreadPool,
    tx: Sender<(usize, Result<T>)>,
    rx: Receiver<(usize, Result<T>)>,
    outstanding: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Builds a pool of `threads` workers, clamped to `[1, MAX_THREADS]`.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.clamp(1, MAX_THREADS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("brushwork-score-{i}"))
            .build()
            .map_err(|e| EvoError::Config(format!("failed to start scoring workers: {e}")))?;
        let (tx, rx) = mpsc::channel();
        Ok(Self { pool, tx, rx, outstanding: 0 })
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Jobs dispatched and not yet collected by `wait`.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn dispatch<F>(&mut self, index: usize, job: F)
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let _ = tx.send((index, job()));
        });
        self.outstanding += 1;
    }

    /// Join barrier: blocks until every outstanding job has finished.
    pub fn wait(&mut self) -> Vec<(usize, Result<T>)> {
        let mut results = Vec::with_capacity(self.outstanding);
        while self.outstanding > 0 {
            match self.rx.recv() {
                Ok(result) => results.push(result),
                Err(_) => break,
            }
            self.outstanding -= 1;
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn thread_count_is_clamped() {
        assert_eq!(WorkerPool::<()>::new(0).unwrap().thread_count(), 1);
        assert_eq!(WorkerPool::<()>::new(100).unwrap().thread_count(), MAX_THREADS);
    }

    #[test]
    fn wait_returns_every_result_by_index() {
        let mut pool = WorkerPool::new(4).unwrap();
        for i in 0..25 {
            pool.dispatch(i, move || Ok(i * 2));
        }
        assert_eq!(pool.outstanding(), 25);
        let mut results: Vec<_> = pool.wait().into_iter().map(|(i, r)| (i, r.unwrap())).collect();
        results.sort();
        assert_eq!(results, (0..25).map(|i| (i, i * 2)).collect::<Vec<_>>());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn wait_blocks_until_slow_jobs_finish() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(2).unwrap();
        for i in 0..4 {
            let done = Arc::clone(&done);
            pool.dispatch(i, move || {
                std::thread::sleep(Duration::from_millis(10));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        pool.wait();
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn errors_are_reported_with_their_index() {
        let mut pool = WorkerPool::<u32>::new(2).unwrap();
        pool.dispatch(0, || Ok(1));
        pool.dispatch(1, || Err(EvoError::PreconditionViolation("boom".into())));
        let failed: Vec<_> = pool.wait().into_iter().filter(|(_, r)| r.is_err()).map(|(i, _)| i).collect();
        assert_eq!(failed, [1]);
    }

    #[test]
    fn wait_with_nothing_dispatched_returns_immediately() {
        let mut pool = WorkerPool::<()>::new(1).unwrap();
        assert!(pool.wait().is_empty());
    }
}
