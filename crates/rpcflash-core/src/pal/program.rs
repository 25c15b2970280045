//! Page program and sector erase

use super::Pal;
use crate::error::{PalError, PalResult};
use crate::rpc::regs::*;
use crate::rpc::RegisterFile;
use crate::sdf::opcodes;
use crate::time::Clock;

/// Program address and length granularity
pub const PROGRAM_ALIGN: u32 = 16;

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Start programming `data` at `addr` through the write buffer
    ///
    /// `data` must fit the write buffer and one page, and both `addr` and
    /// the length must be multiples of 16. Returns once the controller has
    /// sent the data; the device program cycle is still running.
    pub fn program_page(&mut self, addr: u32, data: &[u8]) -> PalResult<()> {
        if data.is_empty() || data.len() > RPC_WRBUF_SIZE {
            return Err(PalError::Size);
        }
        let len = data.len() as u32;
        if len > self.geometry.page_size || !self.geometry.contains(addr, len) {
            return Err(PalError::Size);
        }
        if addr % PROGRAM_ALIGN != 0
            || len % PROGRAM_ALIGN != 0
            || !self.geometry.within_page(addr, len)
        {
            return Err(PalError::Align);
        }

        self.write_enable()?;

        self.regs.write32(RPC_DRCR, DRCR_BURST);
        self.regs.write32(RPC_PHYCNT, PHYCNT_WRITE_BUFFER);
        for (i, word) in data.chunks_exact(4).enumerate() {
            let val = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            self.regs.write32(RPC_WRBUF + i * 4, val);
        }

        log::trace!("4PP 0x{:08X} len {}", addr, len);
        self.regs.write32(RPC_CMNCR, CMNCR_MANUAL);
        self.regs
            .write32(RPC_SMCMR, (opcodes::PP_4B as u32) << CMR_CMD_SHIFT);
        self.regs.write32(RPC_SMADR, addr);
        self.regs.write32(RPC_SMDRENR, 0);
        self.regs
            .write32(RPC_SMENR, SMENR_CDE | SMENR_ADE_32 | SMENR_SPIDE_32);
        self.regs
            .write32(RPC_SMCR, (Smcr::SPIE | Smcr::SPIWE).bits());
        self.wait_tx_end()?;

        self.regs.write32(RPC_PHYCNT, PHYCNT_WRITE_BUFFER_OFF);
        self.regs.write32(RPC_DRCR, DRCR_BURST);
        Ok(())
    }

    /// Start erasing the sector at `addr` with the opcode for the current
    /// sector size
    pub fn erase_sector(&mut self, addr: u32) -> PalResult<()> {
        let opcode = opcodes::erase_opcode(self.geometry.sector_size);
        self.erase_with(opcode, addr)
    }

    /// Start erasing at `addr` with the 4 KiB sector erase opcode
    ///
    /// Alignment is still checked against the current sector size.
    pub fn erase_sector_4k(&mut self, addr: u32) -> PalResult<()> {
        self.erase_with(opcodes::SE_4B, addr)
    }

    fn erase_with(&mut self, opcode: u8, addr: u32) -> PalResult<()> {
        if addr % self.geometry.sector_size != 0 {
            return Err(PalError::Align);
        }
        if addr >= self.geometry.device_size {
            return Err(PalError::Size);
        }

        self.write_enable()?;

        log::trace!("erase 0x{:02X} at 0x{:08X}", opcode, addr);
        self.regs.write32(RPC_PHYCNT, PHYCNT_MANUAL);
        self.regs.write32(RPC_CMNCR, CMNCR_MANUAL);
        self.regs
            .write32(RPC_SMCMR, (opcode as u32) << CMR_CMD_SHIFT);
        self.regs.write32(RPC_SMADR, addr);
        self.regs.write32(RPC_SMDRENR, 0);
        self.regs.write32(RPC_SMENR, SMENR_CDE | SMENR_ADE_32);
        self.regs.write32(RPC_SMCR, Smcr::SPIE.bits());
        self.wait_tx_end()
    }
}
