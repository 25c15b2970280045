//! RPC controller access
//!
//! The protocol driver never touches memory directly. Every register write,
//! window read and clock/reset operation goes through [`RegisterFile`], so
//! the same driver runs against real MMIO ([`MmioRegisterFile`]) or an
//! in-memory emulation.

mod mmio;
pub mod regs;

pub use mmio::MmioRegisterFile;

/// SPCLK frequencies the clock generator can be set up for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spclk {
    /// 160 MHz (HyperFlash only)
    Mhz160,
    /// 133 MHz
    Mhz133,
    /// 80 MHz
    Mhz80,
    /// 66 MHz, the rate used for QSPI NOR
    Mhz66,
    /// 40 MHz
    Mhz40,
}

impl Spclk {
    /// RPC clock control (RPCCKCR) value producing this SPCLK
    pub const fn divider(self) -> u32 {
        match self {
            Spclk::Mhz160 => 0x11,
            Spclk::Mhz133 => 0x19,
            Spclk::Mhz80 => 0x13,
            Spclk::Mhz66 => 0x1B,
            Spclk::Mhz40 => 0x17,
        }
    }

    /// Frequency in MHz
    pub const fn mhz(self) -> u32 {
        match self {
            Spclk::Mhz160 => 160,
            Spclk::Mhz133 => 133,
            Spclk::Mhz80 => 80,
            Spclk::Mhz66 => 66,
            Spclk::Mhz40 => 40,
        }
    }
}

/// Access to the RPC register block, its read window and the clock
/// generator bits that belong to it
///
/// Register offsets are the `RPC_*` constants in [`regs`]. Window offsets
/// are relative to the 64 MiB external address space window; the flash
/// address they hit depends on the current `DREAR` setting.
pub trait RegisterFile {
    /// Read a 32-bit controller register
    fn read32(&mut self, reg: usize) -> u32;

    /// Write a 32-bit controller register
    fn write32(&mut self, reg: usize, val: u32);

    /// Read an aligned 32-bit word through the external address window
    fn window_read32(&mut self, offset: u32) -> u32;

    /// Read a byte through the external address window
    fn window_read8(&mut self, offset: u32) -> u8;

    /// Copy `dst.len()` bytes starting at window offset `offset`
    ///
    /// Unaligned head and tail bytes go through [`window_read8`], the rest
    /// through [`window_read32`].
    ///
    /// [`window_read8`]: RegisterFile::window_read8
    /// [`window_read32`]: RegisterFile::window_read32
    fn window_copy(&mut self, offset: u32, dst: &mut [u8]) {
        let mut off = offset;
        let mut rest = dst;

        while off % 4 != 0 && !rest.is_empty() {
            let (first, tail) = core::mem::take(&mut rest).split_at_mut(1);
            first[0] = self.window_read8(off);
            off += 1;
            rest = tail;
        }

        let mut words = rest.chunks_exact_mut(4);
        for word in &mut words {
            word.copy_from_slice(&self.window_read32(off).to_le_bytes());
            off += 4;
        }

        for byte in words.into_remainder() {
            *byte = self.window_read8(off);
            off += 1;
        }
    }

    /// Current RPC clock divider setting
    fn clock_divider(&mut self) -> u32 {
        0
    }

    /// Program the RPC clock divider
    fn set_clock_divider(&mut self, _val: u32) {}

    /// Assert and release the RPC module reset
    fn reset_module(&mut self) {}

    /// Invalidate the data cache line holding window offset `offset`
    fn invalidate_dcache_line(&mut self, _offset: u32) {}
}

impl<T: RegisterFile + ?Sized> RegisterFile for &mut T {
    fn read32(&mut self, reg: usize) -> u32 {
        (**self).read32(reg)
    }

    fn write32(&mut self, reg: usize, val: u32) {
        (**self).write32(reg, val)
    }

    fn window_read32(&mut self, offset: u32) -> u32 {
        (**self).window_read32(offset)
    }

    fn window_read8(&mut self, offset: u32) -> u8 {
        (**self).window_read8(offset)
    }

    fn window_copy(&mut self, offset: u32, dst: &mut [u8]) {
        (**self).window_copy(offset, dst)
    }

    fn clock_divider(&mut self) -> u32 {
        (**self).clock_divider()
    }

    fn set_clock_divider(&mut self, val: u32) {
        (**self).set_clock_divider(val)
    }

    fn reset_module(&mut self) {
        (**self).reset_module()
    }

    fn invalidate_dcache_line(&mut self, offset: u32) {
        (**self).invalidate_dcache_line(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Window backed by a byte array, registers ignored
    struct Ramp {
        reads8: usize,
        reads32: usize,
    }

    impl RegisterFile for Ramp {
        fn read32(&mut self, _reg: usize) -> u32 {
            0
        }

        fn write32(&mut self, _reg: usize, _val: u32) {}

        fn window_read32(&mut self, offset: u32) -> u32 {
            assert_eq!(offset % 4, 0);
            self.reads32 += 1;
            u32::from_le_bytes([
                offset as u8,
                (offset + 1) as u8,
                (offset + 2) as u8,
                (offset + 3) as u8,
            ])
        }

        fn window_read8(&mut self, offset: u32) -> u8 {
            self.reads8 += 1;
            offset as u8
        }
    }

    #[test]
    fn test_window_copy_splits_head_words_tail() {
        let mut rf = Ramp {
            reads8: 0,
            reads32: 0,
        };
        let mut buf = [0u8; 11];
        rf.window_copy(3, &mut buf);

        let expected: [u8; 11] = [3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];
        assert_eq!(buf, expected);
        // 1 head byte, 2 words, 2 tail bytes
        assert_eq!(rf.reads8, 3);
        assert_eq!(rf.reads32, 2);
    }

    #[test]
    fn test_spclk_dividers() {
        assert_eq!(Spclk::Mhz66.divider(), 0x1B);
        assert_eq!(Spclk::Mhz160.divider(), 0x11);
        assert_eq!(Spclk::Mhz40.mhz(), 40);
    }
}
