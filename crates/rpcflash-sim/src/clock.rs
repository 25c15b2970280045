//! Controllable microsecond clock

use std::cell::Cell;
use std::rc::Rc;

use rpcflash_core::Clock;

/// Shared simulated clock
///
/// Clones share the same counter, so a test can keep one handle while the
/// driver owns another. Every [`Clock::now_us`] call advances time by the
/// configured step, which lets timeout loops terminate; a step of zero
/// freezes time between explicit [`SimClock::advance`] calls.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
    step: Rc<Cell<u32>>,
}

impl SimClock {
    /// Frozen clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock advancing by `step_us` per reading
    pub fn with_step(step_us: u32) -> Self {
        let clock = Self::new();
        clock.set_step(step_us);
        clock
    }

    /// Change the per-reading step
    pub fn set_step(&self, step_us: u32) {
        self.step.set(step_us);
    }

    /// Move time forward
    pub fn advance(&self, us: u32) {
        self.now.set(self.now.get().wrapping_add(us));
    }

    /// Jump to an absolute time
    pub fn set(&self, us: u32) {
        self.now.set(us);
    }

    /// Current time without advancing
    pub fn peek(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step.get()));
        now
    }

    fn delay_us(&self, us: u32) {
        self.advance(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = SimClock::new();
        let handle = clock.clone();
        handle.advance(250);
        assert_eq!(clock.now_us(), 250);
        assert_eq!(clock.now_us(), 250);
    }

    #[test]
    fn test_step_per_reading() {
        let clock = SimClock::with_step(10);
        assert_eq!(clock.now_us(), 0);
        assert_eq!(clock.now_us(), 10);
        clock.delay_us(1000);
        assert_eq!(clock.peek(), 1020);
    }
}
