//! In-process exclusivity token for whole operations (Initialize / Reset).
//!
//! - Acquisition never blocks: `try_acquire` either takes the token or
//!   returns None immediately.
//! - Token is released on Drop of the guard.
//! - Advisory within one Initializer; other processes are not detected.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct ExclusiveLock {
    held: AtomicBool,
}

pub struct ExclusiveGuard<'a> {
    lock: &'a ExclusiveLock,
}

impl ExclusiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the token. None if it is already held.
    pub fn try_acquire(&self) -> Option<ExclusiveGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ExclusiveGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn second_acquire_fails_until_drop() {
        let l = ExclusiveLock::new();
        let g = l.try_acquire().expect("first acquire");
        assert!(l.is_held());
        assert!(l.try_acquire().is_none());
        drop(g);
        assert!(!l.is_held());
        assert!(l.try_acquire().is_some());
    }

    #[test]
    fn exactly_one_thread_wins() {
        let l = Arc::new(ExclusiveLock::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = l.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    // держим гард, пока все не попробуют
                    let g = l.try_acquire();
                    let won = g.is_some();
                    barrier.wait();
                    won
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&w| w)
            .count();
        assert_eq!(wins, 1);
    }
}
