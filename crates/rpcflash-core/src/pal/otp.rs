//! One-time programmable area
//!
//! Accesses are 1 to 4 bytes. Vendors either bracket a secured area with
//! enter/exit commands (Macronix) or have dedicated OTP opcodes (Micron).

use super::command::{DataWidth, WIP_TIMEOUT_US};
use super::Pal;
use crate::error::{PalError, PalResult};
use crate::rpc::regs::*;
use crate::rpc::RegisterFile;
use crate::sdf::{OtpAccess, OtpLock};
use crate::time::Clock;

/// Largest OTP access in bytes
pub const OTP_MAX_ACCESS: usize = 4;

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Read 1 to 4 OTP bytes at `addr` into `buf`
    pub fn otp_read(&mut self, addr: u32, buf: &mut [u8]) -> PalResult<()> {
        let width = DataWidth::for_len(buf.len()).ok_or(PalError::Parameter)?;

        let data = match self.caps.otp_access {
            OtpAccess::SecuredArea { enter, exit, read, .. } => {
                self.write_command(enter, 0, DataWidth::None, 0)?;
                let data = self.otp_transfer_read(read, width, addr, false);
                let left = self.write_command(exit, 0, DataWidth::None, 0);
                let data = data?;
                left?;
                data
            }
            OtpAccess::Dedicated { read, .. } => self.otp_transfer_read(read, width, addr, true)?,
            OtpAccess::Unsupported => return Err(PalError::NotSupported),
        };

        let len = buf.len();
        buf.copy_from_slice(&data.to_le_bytes()[..len]);
        log::trace!("OTP read 0x{:08X}: {:02X?}", addr, buf);
        Ok(())
    }

    fn otp_transfer_read(
        &mut self,
        opcode: u8,
        width: DataWidth,
        addr: u32,
        dummy: bool,
    ) -> PalResult<u32> {
        self.manual_preamble(opcode);
        self.regs.write32(RPC_SMADR, addr);
        let mut smenr = SMENR_CDE | SMENR_ADE_24 | width.spide();
        if dummy {
            self.regs
                .write32(RPC_SMDMCR, u32::from(self.caps.dummy_cycles.saturating_sub(1)));
            smenr |= SMENR_DME;
        }
        self.regs.write32(RPC_SMENR, smenr);
        self.regs
            .write32(RPC_SMCR, (Smcr::SPIE | Smcr::SPIRE).bits());
        self.wait_tx_end()?;
        Ok(self.regs.read32(RPC_SMRDR0))
    }

    /// Program 1 to 4 OTP bytes at `addr`
    ///
    /// OTP bits only go from 1 to 0; a three-byte write pads the fourth
    /// byte with 0xFF so it programs nothing.
    pub fn otp_write(&mut self, addr: u32, data: &[u8]) -> PalResult<()> {
        let width = DataWidth::for_len(data.len()).ok_or(PalError::Parameter)?;

        let mut bytes = [0u8; OTP_MAX_ACCESS];
        bytes[..data.len()].copy_from_slice(data);
        let packed = u32::from_le_bytes(bytes);
        let word = match data.len() {
            1 => (packed & 0xFF) << 24,
            2 => (packed & 0xFFFF) << 16,
            3 => packed | (0xFF << 24),
            _ => packed,
        };

        match self.caps.otp_access {
            OtpAccess::SecuredArea {
                enter,
                exit,
                program,
                ..
            } => {
                self.write_command(enter, 0, DataWidth::None, 0)?;
                let written = self.otp_transfer_write(program, width, word, addr);
                let left = self.write_command(exit, 0, DataWidth::None, 0);
                written?;
                left
            }
            OtpAccess::Dedicated { program, .. } => {
                self.otp_transfer_write(program, width, word, addr)
            }
            OtpAccess::Unsupported => Err(PalError::NotSupported),
        }
    }

    fn otp_transfer_write(
        &mut self,
        opcode: u8,
        width: DataWidth,
        word: u32,
        addr: u32,
    ) -> PalResult<()> {
        self.write_enable()?;
        log::trace!("OTP program 0x{:02X} at 0x{:08X}: 0x{:08X}", opcode, addr, word);
        self.manual_preamble(opcode);
        self.regs.write32(RPC_SMADR, addr);
        self.regs
            .write32(RPC_SMENR, SMENR_CDE | SMENR_ADE_24 | width.spide());
        self.regs.write32(RPC_SMWDR0, word);
        self.regs
            .write32(RPC_SMCR, (Smcr::SPIE | Smcr::SPIWE).bits());
        self.wait_tx_end()?;
        self.wait_wip(WIP_TIMEOUT_US)
    }

    /// Permanently lock the OTP area
    pub fn lock_otp(&mut self) -> PalResult<()> {
        match self.caps.otp_lock {
            OtpLock::SecurityRegister(opcode) => {
                self.write_enable()?;
                self.write_command(opcode, 0, DataWidth::None, 0)?;
            }
            OtpLock::ControlByte(addr) => self.otp_write(addr, &[0])?,
            OtpLock::Unsupported => return Err(PalError::NotSupported),
        }
        log::info!("OTP area locked");
        Ok(())
    }
}
