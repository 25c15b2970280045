//! Memory-mapped register file
//!
//! Volatile accesses at fixed physical bases, for running on the target
//! SoC with the RPC block identity-mapped.

use super::regs::{RPC_REG_SPAN, RPC_WRBUF, RPC_WRBUF_SIZE};
use super::RegisterFile;

/// CPG RPC clock control register offset
const CPG_RPCCKCR: usize = 0x238;
/// CPG software reset register 9
const CPG_SRCR9: usize = 0x924;
/// CPG software reset clear register 9
const CPG_SRSTCLR9: usize = 0x964;
/// RPC module bit in SRCR9 / SRSTCLR9
const CPG_RPC_RESET_BIT: u32 = 1 << 17;
/// Busy-wait iterations around the reset pulse
const RESET_SPIN: u32 = 1000;

/// Size of the external address window
const WINDOW_SPAN: u32 = 0x0400_0000;

/// [`RegisterFile`] over real MMIO
pub struct MmioRegisterFile {
    rpc: *mut u8,
    window: *const u8,
    cpg: *mut u8,
}

impl MmioRegisterFile {
    /// Create a register file over the given physical bases
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `rpc_base` maps the RPC register block including the write buffer
    /// - `window_base` maps the 64 MiB external address space window
    /// - `cpg_base` maps the clock pulse generator
    /// - no other code accesses these regions while this value lives
    pub unsafe fn new(rpc_base: usize, window_base: usize, cpg_base: usize) -> Self {
        Self {
            rpc: rpc_base as *mut u8,
            window: window_base as *const u8,
            cpg: cpg_base as *mut u8,
        }
    }

    /// Register file at the R-Car V3H addresses
    ///
    /// # Safety
    ///
    /// Same requirements as [`MmioRegisterFile::new`]; only valid on that SoC.
    pub unsafe fn r_car_v3h() -> Self {
        Self::new(0xEE20_0000, 0x0800_0000, 0xE615_0000)
    }

    #[inline]
    fn cpg_read(&self, reg: usize) -> u32 {
        // SAFETY: cpg points at the mapped CPG block (see `new`)
        unsafe { core::ptr::read_volatile(self.cpg.add(reg) as *const u32) }
    }

    #[inline]
    fn cpg_write(&self, reg: usize, val: u32) {
        // SAFETY: cpg points at the mapped CPG block (see `new`)
        unsafe { core::ptr::write_volatile(self.cpg.add(reg) as *mut u32, val) }
    }
}

impl RegisterFile for MmioRegisterFile {
    #[inline]
    fn read32(&mut self, reg: usize) -> u32 {
        debug_assert!(reg < RPC_REG_SPAN || (RPC_WRBUF..RPC_WRBUF + RPC_WRBUF_SIZE).contains(&reg));
        debug_assert!(reg & 3 == 0, "unaligned 32-bit read");
        // SAFETY: offset is inside the register block mapped in `new`
        unsafe { core::ptr::read_volatile(self.rpc.add(reg) as *const u32) }
    }

    #[inline]
    fn write32(&mut self, reg: usize, val: u32) {
        debug_assert!(reg < RPC_REG_SPAN || (RPC_WRBUF..RPC_WRBUF + RPC_WRBUF_SIZE).contains(&reg));
        debug_assert!(reg & 3 == 0, "unaligned 32-bit write");
        // SAFETY: offset is inside the register block mapped in `new`
        unsafe { core::ptr::write_volatile(self.rpc.add(reg) as *mut u32, val) }
    }

    #[inline]
    fn window_read32(&mut self, offset: u32) -> u32 {
        debug_assert!(offset + 4 <= WINDOW_SPAN);
        debug_assert!(offset & 3 == 0, "unaligned 32-bit window read");
        // SAFETY: offset is inside the 64 MiB window mapped in `new`
        unsafe { core::ptr::read_volatile(self.window.add(offset as usize) as *const u32) }
    }

    #[inline]
    fn window_read8(&mut self, offset: u32) -> u8 {
        debug_assert!(offset < WINDOW_SPAN);
        // SAFETY: offset is inside the 64 MiB window mapped in `new`
        unsafe { core::ptr::read_volatile(self.window.add(offset as usize)) }
    }

    fn clock_divider(&mut self) -> u32 {
        self.cpg_read(CPG_RPCCKCR)
    }

    fn set_clock_divider(&mut self, val: u32) {
        self.cpg_write(CPG_RPCCKCR, val);
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn reset_module(&mut self) {
        let srcr = self.cpg_read(CPG_SRCR9);
        self.cpg_write(CPG_SRCR9, srcr | CPG_RPC_RESET_BIT);
        // at least one RCLK cycle
        for _ in 0..RESET_SPIN {
            core::hint::spin_loop();
        }
        self.cpg_write(CPG_SRSTCLR9, CPG_RPC_RESET_BIT);
        // tREADY1 - tRHSL
        for _ in 0..RESET_SPIN {
            core::hint::spin_loop();
        }
    }
}
