//! DDR read strobe calibration
//!
//! The controller samples DDR read data with a programmable strobe delay
//! (PHYCNT.STRTIM). Calibration reads a known pattern at every tap, then
//! picks the middle of the passing window.

use super::window::{CACHE_LINE, WINDOW_MASK};
use super::{Pal, TransferMode};
use crate::rpc::regs::*;
use crate::rpc::RegisterFile;
use crate::sdf::opcodes;
use crate::time::Clock;

/// Flash address holding the calibration pattern
pub const CALIBRATION_ADDR: u32 = 0x0009_0000;
/// Pattern expected at [`CALIBRATION_ADDR`], little-endian
pub const CALIBRATION_PATTERN: u32 = 0xAA5A_A555;
/// Minimum time between two calibrations
pub const CALIBRATION_INTERVAL_US: u32 = 10_000_000;
/// Number of strobe taps
const TAPS: usize = 8;
/// Marker for "no window edge found"
const NO_EDGE: u8 = 0xF;

/// Pick the strobe tap from per-tap pass results
///
/// Returns the middle of the passing window. A result of 8 or more means
/// no usable tap was found.
pub fn pick_tap(pass: &[bool; TAPS]) -> u8 {
    let mut window_end = NO_EDGE;
    let mut window_start = NO_EDGE;

    for tap in (1..TAPS).rev() {
        if pass[tap] && window_end == NO_EDGE {
            window_end = tap as u8;
        }
        if pass[tap] && !pass[tap - 1] {
            window_start = tap as u8;
        }
    }
    if pass[0] {
        window_start = 0;
    }

    (window_end + window_start) >> 1
}

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Calibrate DDR reads, at most once per [`CALIBRATION_INTERVAL_US`]
    pub(crate) fn calibrate(&mut self) {
        if let Some(last) = self.last_calibration {
            if self.clock.elapsed_us(last) <= CALIBRATION_INTERVAL_US {
                return;
            }
        }

        self.regs.write32(RPC_DREAR, DREAR_EXT_64M);
        self.regs.write32(RPC_OFFSET1, OFFSET1_DDR);
        self.regs.write32(RPC_CMNCR, CMNCR_EXT_QUAD);
        self.regs.write32(RPC_DRCR, DRCR_SINGLE);
        self.regs
            .write32(RPC_DRCMR, (opcodes::DDRQIOR_4B as u32) << CMR_CMD_SHIFT);
        self.regs.write32(RPC_DRENR, DRENR_QUAD);
        self.regs.write32(
            RPC_DRDMCR,
            DRDMCR_QUAD | u32::from(self.caps.dummy_cycles_ee.saturating_sub(1)),
        );
        self.regs.write32(RPC_DRDRENR, DRDRENR_DDR);

        let offset = CALIBRATION_ADDR & WINDOW_MASK;
        let mut pass = [false; TAPS];
        for tap in (0..TAPS).rev() {
            if tap == TAPS - 1 {
                self.regs.write32(RPC_PHYCNT, PHYCNT_DDR_CALIBRATE);
            } else {
                let phycnt = self.regs.read32(RPC_PHYCNT) & !PHYCNT_STRTIM_MASK;
                self.regs
                    .write32(RPC_PHYCNT, phycnt | ((tap as u32) << PHYCNT_STRTIM_SHIFT));
            }

            self.regs.invalidate_dcache_line(offset & !(CACHE_LINE - 1));
            let mut word = [0u8; 4];
            self.regs.window_copy(offset, &mut word);
            pass[tap] = u32::from_le_bytes(word) == CALIBRATION_PATTERN;
        }

        self.calibrated_tap = pick_tap(&pass);
        self.last_calibration = Some(self.clock.now_us());
        log::debug!(
            "DDR calibration: pass {:?}, tap {}",
            pass,
            self.calibrated_tap
        );
    }

    /// Fall back to quad SDR when calibration found no usable tap
    pub(crate) fn apply_calibration_result(&mut self) {
        if usize::from(self.calibrated_tap) >= TAPS && self.mode != TransferMode::QspiSdrBurst {
            log::warn!(
                "No usable DDR strobe tap, falling back to {}",
                TransferMode::QspiSdrBurst
            );
            self.mode = TransferMode::QspiSdrBurst;
        }
    }
}
