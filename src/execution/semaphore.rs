use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Blocking counting semaphore bounding how many chunks are counted at once.
pub struct ChunkPermits {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// A held permit; returned to the pool on drop.
pub struct Permit<'a> {
    owner: &'a ChunkPermits,
}

impl ChunkPermits {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits.max(1)),
            cv: Condvar::new(),
        }
    }

    /// Acquire one permit, blocking until available.
    ///
    /// Also returns the time spent waiting (zero if no wait was required).
    pub fn acquire(&self) -> (Permit<'_>, Duration) {
        let start = Instant::now();
        let mut waited = false;
        let mut available = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            waited = true;
            available = self.cv.wait(available).unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        let waited = if waited { start.elapsed() } else { Duration::ZERO };
        (Permit { owner: self }, waited)
    }

    fn release(&self) {
        let mut available = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.cv.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.owner.release();
    }
}
