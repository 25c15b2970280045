//! Time source abstraction
//!
//! Timeouts are measured on a free-running microsecond counter that may
//! wrap; [`Clock::elapsed_us`] handles the wrap.

/// Microsecond time source
pub trait Clock {
    /// Current counter value in microseconds
    fn now_us(&self) -> u32;

    /// Microseconds since `since`, tolerant of a single counter wrap
    fn elapsed_us(&self, since: u32) -> u32 {
        self.now_us().wrapping_sub(since)
    }

    /// Busy-wait for `us` microseconds
    fn delay_us(&self, us: u32) {
        let start = self.now_us();
        while self.elapsed_us(start) < us {
            core::hint::spin_loop();
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }

    fn elapsed_us(&self, since: u32) -> u32 {
        (**self).elapsed_us(since)
    }

    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}
