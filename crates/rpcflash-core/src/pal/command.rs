//! Manual-mode SPI transactions
//!
//! Manual mode sends one command with optional address, dummy and data
//! phases. Data sits in the top bytes of SMWDR0 on writes and in the low
//! bytes of SMRDR0 on reads.

use super::{DeviceState, JedecId, Pal};
use crate::error::{PalError, PalResult};
use crate::rpc::regs::*;
use crate::rpc::RegisterFile;
use crate::sdf::opcodes;
use crate::time::Clock;

/// Controller transfer timeout
pub(crate) const TX_TIMEOUT_US: u32 = 150;
/// Device ready timeout after register writes
pub(crate) const WIP_TIMEOUT_US: u32 = 100;

/// Width of the data phase of a manual-mode transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    /// No data phase
    None,
    /// One byte
    Bits8,
    /// Two bytes
    Bits16,
    /// Four bytes
    Bits32,
}

impl DataWidth {
    /// SMENR.SPIDE encoding
    pub const fn spide(self) -> u32 {
        match self {
            DataWidth::None => 0,
            DataWidth::Bits8 => SMENR_SPIDE_8,
            DataWidth::Bits16 => SMENR_SPIDE_16,
            DataWidth::Bits32 => SMENR_SPIDE_32,
        }
    }

    /// Mask for read data
    pub const fn mask(self) -> u32 {
        match self {
            DataWidth::None => 0,
            DataWidth::Bits8 => 0xFF,
            DataWidth::Bits16 => 0xFFFF,
            DataWidth::Bits32 => 0xFFFF_FFFF,
        }
    }

    /// Place right-aligned `data` where the controller shifts it out from
    pub const fn place(self, data: u32) -> u32 {
        match self {
            DataWidth::Bits8 => (data & 0xFF) << 24,
            DataWidth::Bits16 => (data & 0xFFFF) << 16,
            DataWidth::None | DataWidth::Bits32 => data,
        }
    }

    /// Data phase for a 1 to 4 byte OTP access; 3 bytes use the 32-bit form
    pub fn for_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(DataWidth::Bits8),
            2 => Some(DataWidth::Bits16),
            3 | 4 => Some(DataWidth::Bits32),
            _ => None,
        }
    }
}

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Switch to manual mode and load the command
    pub(crate) fn manual_preamble(&mut self, opcode: u8) {
        self.regs.write32(RPC_DRCR, DRCR_SSL_NEGATE);
        self.regs.write32(RPC_OFFSET1, OFFSET1_SDR);
        self.regs.write32(RPC_PHYCNT, PHYCNT_MANUAL);
        self.regs.write32(RPC_CMNCR, CMNCR_MANUAL);
        self.regs.write32(RPC_SMCMR, (opcode as u32) << CMR_CMD_SHIFT);
        self.regs.write32(RPC_SMDRENR, 0);
    }

    /// Start a write-direction transfer without waiting for it
    ///
    /// A non-zero `addr` adds a 24-bit address phase and limits the data
    /// phase to one byte.
    pub(crate) fn transmit(&mut self, opcode: u8, data: u32, width: DataWidth, addr: u32) {
        log::trace!(
            "cmd 0x{:02X} data 0x{:08X} {:?} addr 0x{:08X}",
            opcode,
            data,
            width,
            addr
        );
        self.manual_preamble(opcode);
        if addr == 0 {
            self.regs.write32(RPC_SMENR, SMENR_CDE | width.spide());
        } else {
            self.regs.write32(RPC_SMADR, addr);
            self.regs
                .write32(RPC_SMENR, SMENR_CDE | SMENR_ADE_24 | SMENR_SPIDE_8);
        }
        self.regs.write32(RPC_SMWDR0, width.place(data));
        let smcr = if width == DataWidth::None {
            Smcr::SPIE
        } else {
            Smcr::SPIE | Smcr::SPIWE
        };
        self.regs.write32(RPC_SMCR, smcr.bits());
    }

    /// Send a command with optional data, then wait for the device
    pub fn write_command(
        &mut self,
        opcode: u8,
        data: u32,
        width: DataWidth,
        addr: u32,
    ) -> PalResult<()> {
        self.transmit(opcode, data, width, addr);
        self.wait_tx_end()?;
        self.wait_wip(WIP_TIMEOUT_US)
    }

    /// Send a command and read back up to 32 bits
    ///
    /// A non-zero `addr` adds a 24-bit address phase, the vendor's dummy
    /// cycles and a one-byte data phase.
    pub fn read_command(&mut self, opcode: u8, width: DataWidth, addr: u32) -> PalResult<u32> {
        self.manual_preamble(opcode);
        if addr == 0 {
            self.regs.write32(RPC_SMENR, SMENR_CDE | width.spide());
        } else {
            self.regs.write32(RPC_SMADR, addr);
            self.regs
                .write32(RPC_SMDMCR, u32::from(self.caps.dummy_cycles.saturating_sub(1)));
            self.regs.write32(
                RPC_SMENR,
                SMENR_DME | SMENR_CDE | SMENR_ADE_24 | SMENR_SPIDE_8,
            );
        }
        self.regs
            .write32(RPC_SMCR, (Smcr::SPIE | Smcr::SPIRE).bits());
        self.wait_tx_end()?;

        let data = self.regs.read32(RPC_SMRDR0) & width.mask();
        Ok(data)
    }

    /// Wait for the controller to finish the current transfer
    pub fn wait_tx_end(&mut self) -> PalResult<()> {
        let start = self.clock.now_us();
        loop {
            let status = Cmnsr::from_bits_retain(self.regs.read32(RPC_CMNSR));
            if status.contains(Cmnsr::TEND) {
                return Ok(());
            }
            if self.clock.elapsed_us(start) >= TX_TIMEOUT_US {
                log::warn!("Transfer did not end within {} us", TX_TIMEOUT_US);
                return Err(PalError::Timeout);
            }
        }
    }

    /// Poll the status register until the device is ready
    ///
    /// A device still busy after `timeout_us` gives [`PalError::Busy`].
    pub fn wait_wip(&mut self, timeout_us: u32) -> PalResult<()> {
        let start = self.clock.now_us();
        loop {
            let elapsed = self.clock.elapsed_us(start);
            match self.is_busy()? {
                DeviceState::Ready => return Ok(()),
                DeviceState::Busy if elapsed >= timeout_us => return Err(PalError::Busy),
                DeviceState::Busy => {}
            }
        }
    }

    /// Set the write enable latch
    pub fn write_enable(&mut self) -> PalResult<()> {
        self.write_command(opcodes::WREN, 0, DataWidth::None, 0)
    }

    /// Read and decode the JEDEC ID
    pub fn read_jedec_id(&mut self) -> PalResult<JedecId> {
        let data = self.read_command(opcodes::RDID, DataWidth::Bits32, 0)?;
        Ok(JedecId::from_raw(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_placement() {
        assert_eq!(DataWidth::Bits8.place(0x1234_56AB), 0xAB00_0000);
        assert_eq!(DataWidth::Bits16.place(0x8740), 0x8740_0000);
        assert_eq!(DataWidth::Bits32.place(0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn test_smenr_data_encoding() {
        assert_eq!(SMENR_CDE | DataWidth::None.spide(), 0x4000);
        assert_eq!(SMENR_CDE | DataWidth::Bits8.spide(), 0x4008);
        assert_eq!(SMENR_CDE | DataWidth::Bits16.spide(), 0x400C);
        assert_eq!(SMENR_CDE | DataWidth::Bits32.spide(), 0x400F);
    }

    #[test]
    fn test_otp_widths() {
        assert_eq!(DataWidth::for_len(1), Some(DataWidth::Bits8));
        assert_eq!(DataWidth::for_len(2), Some(DataWidth::Bits16));
        assert_eq!(DataWidth::for_len(3), Some(DataWidth::Bits32));
        assert_eq!(DataWidth::for_len(4), Some(DataWidth::Bits32));
        assert_eq!(DataWidth::for_len(0), None);
        assert_eq!(DataWidth::for_len(5), None);
    }

    #[test]
    fn test_jedec_decode() {
        // Micron MT25QL512: 20 BA 20
        let id = JedecId::from_raw(0x0020_BA20);
        assert_eq!(id.manufacturer, 0x20);
        assert_eq!(id.device, 0xBA20);
    }
}
