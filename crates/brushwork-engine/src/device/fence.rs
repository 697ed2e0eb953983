use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// CPU-side binary fence.
///
/// Starts signaled or unsignaled; `wait` blocks until signaled. `reset` re-arms it.
/// Lock poisoning is ignored.
#[derive(Debug)]
pub struct Fence {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Fence {
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn is_signaled(&self) -> bool {
        *self.lock()
    }

    /// Signals the fence and wakes every waiter.
    pub fn signal(&self) {
        *self.lock() = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.lock() = false;
    }

    /// Blocks until signaled. No timeout.
    pub fn wait(&self) {
        let guard = self.lock();
        let _guard = self
            .cond
            .wait_while(guard, |signaled| !*signaled)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn signaled_fence_does_not_block() {
        let fence = Fence::new(true);
        fence.wait();
        assert!(fence.is_signaled());
    }

    #[test]
    fn signal_from_other_thread_wakes_waiter() {
        let fence = Arc::new(Fence::new(false));
        let signaler = {
            let fence = Arc::clone(&fence);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                fence.signal();
            })
        };
        fence.wait();
        assert!(fence.is_signaled());
        signaler.join().unwrap();
    }

    #[test]
    fn reset_rearms() {
        let fence = Fence::new(true);
        fence.reset();
        assert!(!fence.is_signaled());
    }
}
