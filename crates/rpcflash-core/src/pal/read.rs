//! Window read path: read, verify and blank check

use super::profile::ReadProfile;
use super::window::{self, WindowSegments, CACHE_LINE, WINDOW_MASK};
use super::Pal;
use crate::error::{PalError, PalResult};
use crate::rpc::regs::{DRCR_SSL_NEGATE, DREAR_EXT_64M, RPC_DRCR, RPC_DREAR};
use crate::rpc::RegisterFile;
use crate::time::Clock;

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Prepare the controller to read `[addr, addr + len)` through the window
    ///
    /// The range must fit the device and stay inside one window.
    pub fn start_read(&mut self, addr: u32, len: u32) -> PalResult<()> {
        if !self.geometry.contains(addr, len) {
            return Err(PalError::Size);
        }
        if window::crosses_window(addr, len) {
            return Err(PalError::Align);
        }

        self.regs.write32(RPC_DRCR, DRCR_SSL_NEGATE);
        self.calibrate();
        self.apply_calibration_result();

        // calibration reprograms DREAR, so the window is selected after it
        self.regs
            .write32(RPC_DREAR, DREAR_EXT_64M | window::extended_address(addr));
        ReadProfile::for_mode(self.mode, self.caps, self.calibrated_tap).apply(&mut self.regs);

        self.invalidate_window(addr & WINDOW_MASK, len);
        Ok(())
    }

    fn invalidate_window(&mut self, offset: u32, len: u32) {
        let end = offset as u64 + len as u64;
        let mut line = offset & !(CACHE_LINE - 1);
        while (line as u64) < end {
            self.regs.invalidate_dcache_line(line);
            line += CACHE_LINE;
        }
    }

    /// Word at a window offset, aligned or not
    fn window_word(&mut self, offset: u32) -> u32 {
        if offset % 4 == 0 {
            self.regs.window_read32(offset)
        } else {
            let mut bytes = [0u8; 4];
            self.regs.window_copy(offset, &mut bytes);
            u32::from_le_bytes(bytes)
        }
    }

    /// Read `buf.len()` bytes starting at `addr`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> PalResult<()> {
        let len = u32::try_from(buf.len()).map_err(|_| PalError::Size)?;
        for seg in WindowSegments::new(addr, len) {
            self.start_read(seg.addr, seg.len)?;
            self.regs
                .window_copy(seg.window_offset(), &mut buf[seg.buf_range()]);
        }
        Ok(())
    }

    /// Compare flash contents at `addr` with `expected`
    ///
    /// Stops at the first differing word or byte.
    pub fn verify(&mut self, addr: u32, expected: &[u8]) -> PalResult<()> {
        let len = u32::try_from(expected.len()).map_err(|_| PalError::Size)?;
        for seg in WindowSegments::new(addr, len) {
            self.start_read(seg.addr, seg.len)?;

            let mut offset = seg.window_offset();
            let mut words = expected[seg.buf_range()].chunks_exact(4);
            for word in &mut words {
                let want = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                if self.window_word(offset) != want {
                    log::debug!("Verify mismatch in word at 0x{:08X}", addr + seg.offset as u32);
                    return Err(PalError::Verify);
                }
                offset += 4;
            }
            for &byte in words.remainder() {
                if self.regs.window_read8(offset) != byte {
                    return Err(PalError::Verify);
                }
                offset += 1;
            }
        }
        Ok(())
    }

    /// Check that `[addr, addr + len)` is erased (all 0xFF)
    pub fn blank_check(&mut self, addr: u32, len: u32) -> PalResult<()> {
        for seg in WindowSegments::new(addr, len) {
            self.start_read(seg.addr, seg.len)?;

            let mut offset = seg.window_offset();
            let mut left = seg.len;
            while left >= 4 {
                if self.window_word(offset) != 0xFFFF_FFFF {
                    return Err(PalError::Erase);
                }
                offset += 4;
                left -= 4;
            }
            while left > 0 {
                if self.regs.window_read8(offset) != 0xFF {
                    return Err(PalError::Erase);
                }
                offset += 1;
                left -= 1;
            }
        }
        Ok(())
    }
}
