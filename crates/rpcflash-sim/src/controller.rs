//! Emulated RPC controller register block
//!
//! Plain registers are stored as written. A write to SMCR with SPIE set
//! runs the manual-mode transfer described by SMCMR/SMADR/SMENR against the
//! [`NorDevice`]. Window reads go straight to the device array, corrupted
//! when the DDR strobe tap is outside the device's passing window.

use rpcflash_core::pal::window::WINDOW_MASK;
use rpcflash_core::rpc::regs::*;
use rpcflash_core::RegisterFile;

use crate::device::NorDevice;
use crate::SimConfig;

/// XOR applied to bytes read with a bad strobe tap
const BAD_TAP_NOISE: u8 = 0xA5;

/// Register file backed by an emulated device
#[derive(Debug)]
pub struct SimRpc {
    regs: [u32; RPC_REG_SPAN / 4],
    wrbuf: [u8; RPC_WRBUF_SIZE],
    wrbuf_len: usize,
    device: NorDevice,
    tend: bool,
    stall: bool,
    divider: u32,
    resets: u32,
    invalidations: u32,
}

impl SimRpc {
    /// Controller with a fresh device
    pub fn new(config: SimConfig) -> Self {
        Self {
            regs: [0; RPC_REG_SPAN / 4],
            wrbuf: [0xFF; RPC_WRBUF_SIZE],
            wrbuf_len: 0,
            device: NorDevice::new(config),
            tend: true,
            stall: false,
            divider: 0,
            resets: 0,
            invalidations: 0,
        }
    }

    /// Attached device
    pub fn device(&self) -> &NorDevice {
        &self.device
    }

    /// Mutable attached device, for fault injection
    pub fn device_mut(&mut self) -> &mut NorDevice {
        &mut self.device
    }

    /// Stop completing manual transfers (TEND stays clear)
    pub fn stall_transfers(&mut self, stall: bool) {
        self.stall = stall;
    }

    /// Last value written to a register
    pub fn reg(&self, reg: usize) -> u32 {
        self.regs.get(reg / 4).copied().unwrap_or(0)
    }

    /// Number of module resets
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Number of cache line invalidations
    pub fn invalidations(&self) -> u32 {
        self.invalidations
    }

    fn run_manual_transfer(&mut self, smcr: Smcr) {
        let opcode = (self.reg(RPC_SMCMR) >> CMR_CMD_SHIFT) as u8;
        let smenr = self.reg(RPC_SMENR);
        let addr = match smenr & SMENR_ADE_MASK {
            0 => None,
            SMENR_ADE_24 => Some(self.reg(RPC_SMADR) & 0x00FF_FFFF),
            _ => Some(self.reg(RPC_SMADR)),
        };
        let width = match smenr & SMENR_SPIDE_MASK {
            SMENR_SPIDE_8 => 1,
            SMENR_SPIDE_16 => 2,
            SMENR_SPIDE_32 => 4,
            _ => 0,
        };

        if smcr.contains(Smcr::SPIWE) {
            if self.reg(RPC_PHYCNT) & PHYCNT_WBUF != 0 {
                let len = self.wrbuf_len;
                let tx = self.wrbuf[..len].to_vec();
                self.device.transfer(opcode, addr, &tx, &mut []);
                self.wrbuf_len = 0;
            } else {
                // data sits in the top bytes of SMWDR0
                let word = self.reg(RPC_SMWDR0).to_le_bytes();
                self.device.transfer(opcode, addr, &word[4 - width..], &mut []);
            }
        } else if smcr.contains(Smcr::SPIRE) {
            let mut rx = [0u8; 4];
            self.device.transfer(opcode, addr, &[], &mut rx[..width]);
            self.regs[RPC_SMRDR0 / 4] = u32::from_le_bytes(rx);
        } else {
            self.device.transfer(opcode, addr, &[], &mut []);
        }
    }

    fn window_address(&self, offset: u32) -> u32 {
        let high = (self.reg(RPC_DREAR) & 0x00FF_0000) << DREAR_EAV_SHIFT;
        (high & !WINDOW_MASK) | (offset & WINDOW_MASK)
    }

    fn strobe_ok(&self) -> bool {
        let phycnt = self.reg(RPC_PHYCNT);
        let ddr = phycnt & PHYCNT_PHYMEM_MASK == PHYCNT_PHYMEM_DDR;
        if !ddr || phycnt & PHYCNT_DDRCAL == 0 {
            return true;
        }
        let tap = ((phycnt & PHYCNT_STRTIM_MASK) >> PHYCNT_STRTIM_SHIFT) as u8;
        self.device.config().passing_taps.contains(&tap)
    }

    fn window_bytes(&mut self, offset: u32, dst: &mut [u8]) {
        let addr = self.window_address(offset);
        self.device.read_array(addr, dst);
        if !self.strobe_ok() {
            for byte in dst.iter_mut() {
                *byte ^= BAD_TAP_NOISE;
            }
        }
    }
}

impl RegisterFile for SimRpc {
    fn read32(&mut self, reg: usize) -> u32 {
        if reg == RPC_CMNSR {
            return if self.tend { Cmnsr::TEND.bits() } else { 0 };
        }
        self.reg(reg)
    }

    fn write32(&mut self, reg: usize, val: u32) {
        if (RPC_WRBUF..RPC_WRBUF + RPC_WRBUF_SIZE).contains(&reg) {
            let at = reg - RPC_WRBUF;
            let end = (at + 4).min(RPC_WRBUF_SIZE);
            self.wrbuf[at..end].copy_from_slice(&val.to_le_bytes()[..end - at]);
            self.wrbuf_len = self.wrbuf_len.max(end);
            return;
        }
        let Some(slot) = self.regs.get_mut(reg / 4) else {
            log::warn!("sim: write to unknown register 0x{:X}", reg);
            return;
        };
        *slot = val;

        if reg == RPC_SMCR {
            let smcr = Smcr::from_bits_truncate(val);
            if smcr.contains(Smcr::SPIE) {
                self.tend = false;
                if !self.stall {
                    self.run_manual_transfer(smcr);
                    self.tend = true;
                }
            }
        }
    }

    fn window_read32(&mut self, offset: u32) -> u32 {
        let mut word = [0u8; 4];
        self.window_bytes(offset, &mut word);
        u32::from_le_bytes(word)
    }

    fn window_read8(&mut self, offset: u32) -> u8 {
        let mut byte = [0u8; 1];
        self.window_bytes(offset, &mut byte);
        byte[0]
    }

    fn clock_divider(&mut self) -> u32 {
        self.divider
    }

    fn set_clock_divider(&mut self, val: u32) {
        self.divider = val;
    }

    fn reset_module(&mut self) {
        self.resets += 1;
        self.regs = [0; RPC_REG_SPAN / 4];
        self.tend = true;
    }

    fn invalidate_dcache_line(&mut self, _offset: u32) {
        self.invalidations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcflash_core::sdf::opcodes;

    fn command(rpc: &mut SimRpc, opcode: u8, smenr: u32, smcr: Smcr) {
        rpc.write32(RPC_SMCMR, (opcode as u32) << CMR_CMD_SHIFT);
        rpc.write32(RPC_SMENR, smenr);
        rpc.write32(RPC_SMCR, smcr.bits());
    }

    #[test]
    fn test_manual_read_jedec_id() {
        let mut rpc = SimRpc::new(SimConfig::micron());
        command(
            &mut rpc,
            opcodes::RDID,
            SMENR_CDE | SMENR_SPIDE_32,
            Smcr::SPIE | Smcr::SPIRE,
        );
        assert_eq!(rpc.read32(RPC_CMNSR) & Cmnsr::TEND.bits(), 1);
        assert_eq!(rpc.read32(RPC_SMRDR0) & 0xFF, 0x20);
    }

    #[test]
    fn test_write_data_from_top_bytes() {
        let mut rpc = SimRpc::new(SimConfig::cypress());
        command(&mut rpc, opcodes::WREN, SMENR_CDE, Smcr::SPIE);
        rpc.write32(RPC_SMADR, opcodes::CYPRESS_CR1V);
        rpc.write32(RPC_SMWDR0, 0x0200_0000);
        command(
            &mut rpc,
            opcodes::WRAR,
            SMENR_CDE | SMENR_ADE_24 | SMENR_SPIDE_8,
            Smcr::SPIE | Smcr::SPIWE,
        );
        assert_eq!(rpc.device().register(opcodes::CYPRESS_CR1V & 0x00FF_FFFF), Some(0x02));
    }

    #[test]
    fn test_stalled_transfer_keeps_tend_clear() {
        let mut rpc = SimRpc::new(SimConfig::micron());
        rpc.stall_transfers(true);
        command(&mut rpc, opcodes::WREN, SMENR_CDE, Smcr::SPIE);
        assert_eq!(rpc.read32(RPC_CMNSR), 0);
        assert_eq!(rpc.device().count(opcodes::WREN), 0);
    }

    #[test]
    fn test_window_read_with_bad_tap() {
        let mut rpc = SimRpc::new(SimConfig::micron());
        rpc.device_mut().fill(0x40, &[0x11, 0x22, 0x33, 0x44]);
        rpc.write32(RPC_DREAR, DREAR_EXT_64M);
        assert_eq!(rpc.window_read32(0x40), 0x4433_2211);

        rpc.write32(RPC_PHYCNT, PHYCNT_DDR_CALIBRATE);
        assert_eq!(rpc.window_read8(0x40), 0x11 ^ BAD_TAP_NOISE);

        let good = (PHYCNT_DDR_CALIBRATE & !PHYCNT_STRTIM_MASK) | (3 << PHYCNT_STRTIM_SHIFT);
        rpc.write32(RPC_PHYCNT, good);
        assert_eq!(rpc.window_read8(0x40), 0x11);
    }
}
