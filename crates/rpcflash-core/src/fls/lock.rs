//! Non-blocking driver lock

use core::sync::atomic::{AtomicBool, Ordering};

/// Atomic try-lock guarding the job state
///
/// Never blocks and is not reentrant: a second `try_acquire` from the
/// holder fails like one from any other context.
#[derive(Debug, Default)]
pub struct TryLock {
    held: AtomicBool,
}

impl TryLock {
    /// Create a released lock
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the lock if it is free
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock, whoever holds it
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Whether some context holds the lock
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive() {
        let lock = TryLock::new();
        assert!(!lock.is_held());
        assert!(lock.try_acquire());
        assert!(lock.is_held());
        assert!(!lock.try_acquire());
        lock.release();
        assert!(lock.try_acquire());
    }

    #[test]
    fn test_release_when_free() {
        let lock = TryLock::default();
        lock.release();
        assert!(!lock.is_held());
        assert!(lock.try_acquire());
    }
}
