//! RPC controller register definitions
//!
//! Offsets are relative to the RPC register block base. Composite values
//! are the settings the driver programs; the field breakdown is kept next
//! to each one so a register dump can be read against it.

use bitflags::bitflags;

// ============================================================================
// Register offsets
// ============================================================================

/// Common control register
pub const RPC_CMNCR: usize = 0x00;
/// SSL delay register
pub const RPC_SSLDR: usize = 0x04;
/// Data read control register
pub const RPC_DRCR: usize = 0x0C;
/// Data read command setting register
pub const RPC_DRCMR: usize = 0x10;
/// Data read extended address register
pub const RPC_DREAR: usize = 0x14;
/// Data read option setting register
pub const RPC_DROPR: usize = 0x18;
/// Data read enable setting register
pub const RPC_DRENR: usize = 0x1C;
/// Manual mode control register
pub const RPC_SMCR: usize = 0x20;
/// Manual mode command setting register
pub const RPC_SMCMR: usize = 0x24;
/// Manual mode address register
pub const RPC_SMADR: usize = 0x28;
/// Manual mode option setting register
pub const RPC_SMOPR: usize = 0x2C;
/// Manual mode enable setting register
pub const RPC_SMENR: usize = 0x30;
/// Manual mode read data register 0
pub const RPC_SMRDR0: usize = 0x38;
/// Manual mode read data register 1
pub const RPC_SMRDR1: usize = 0x3C;
/// Manual mode write data register 0
pub const RPC_SMWDR0: usize = 0x40;
/// Manual mode write data register 1
pub const RPC_SMWDR1: usize = 0x44;
/// Common status register
pub const RPC_CMNSR: usize = 0x48;
/// Data read dummy cycle setting register
pub const RPC_DRDMCR: usize = 0x58;
/// Data read DDR enable register
pub const RPC_DRDRENR: usize = 0x5C;
/// Manual mode dummy cycle setting register
pub const RPC_SMDMCR: usize = 0x60;
/// Manual mode DDR enable register
pub const RPC_SMDRENR: usize = 0x64;
/// PHY control register
pub const RPC_PHYCNT: usize = 0x7C;
/// PHY offset register 1
pub const RPC_OFFSET1: usize = 0x80;
/// PHY interrupt register
pub const RPC_PHYINT: usize = 0x88;
/// Division register
pub const RPC_DIVREG: usize = 0xA8;
/// Write buffer
pub const RPC_WRBUF: usize = 0x8000;
/// Write buffer size in bytes
pub const RPC_WRBUF_SIZE: usize = 256;

/// Size of the register block up to (not including) the write buffer
pub const RPC_REG_SPAN: usize = 0xB0;

// ============================================================================
// CMNCR - common control
// ============================================================================

/// Manual mode, single serial flash, default idle levels
pub const CMNCR_MANUAL: u32 = 0x81FF_F300;
/// External address space mode, single SPI IO levels
pub const CMNCR_EXT_SPI: u32 = 0x01FF_F300;
/// External address space mode, quad IO levels
pub const CMNCR_EXT_QUAD: u32 = 0x0155_7300;

// ============================================================================
// DRCR - data read control
// ============================================================================

/// Negate SSL in case a continuous read is still open
pub const DRCR_SSL_NEGATE: u32 = 0x0100_0000;
/// 256-byte read bursts, burst enable, read cache flush
pub const DRCR_BURST: u32 = 0x011F_0300;
/// Burst read with continuous SSL (SSLE)
pub const DRCR_BURST_CONTINUOUS: u32 = 0x011F_0301;
/// Read bursts disabled, cache flush
pub const DRCR_SINGLE: u32 = 0x011F_0200;

// ============================================================================
// PHYCNT / OFFSET1 - PHY control
// ============================================================================

/// PHY offset for SDR reads
pub const OFFSET1_SDR: u32 = 0x3151_1144;
/// PHY offset for DDR reads
pub const OFFSET1_DDR: u32 = 0x2151_1144;
/// Manual mode: SDR, CAL = 1
pub const PHYCNT_MANUAL: u32 = 0x8003_0260;
/// Manual mode with write buffer enabled (WBUF, WBUF2)
pub const PHYCNT_WRITE_BUFFER: u32 = 0x8003_0274;
/// Write buffer released, calibration off
pub const PHYCNT_WRITE_BUFFER_OFF: u32 = 0x0003_0270;
/// External read, SDR
pub const PHYCNT_SDR_READ: u32 = 0x8000_0260;
/// External read, DDR single access
pub const PHYCNT_DDR_SINGLE: u32 = 0x8000_0261;
/// External read, DDR burst with software calibration (DDRCAL); STRTIM added on top
pub const PHYCNT_DDR_BURST: u32 = 0x0008_0261;
/// First calibration pass: CAL = 1, DDRCAL = 1, STRTIM = 7
pub const PHYCNT_DDR_CALIBRATE: u32 = 0x800B_8261;
/// Strobe timing field shift
pub const PHYCNT_STRTIM_SHIFT: u32 = 15;
/// Strobe timing field mask
pub const PHYCNT_STRTIM_MASK: u32 = 0b111 << PHYCNT_STRTIM_SHIFT;
/// PHY memory type field mask
pub const PHYCNT_PHYMEM_MASK: u32 = 0b11;
/// PHY memory type: serial flash in DDR mode
pub const PHYCNT_PHYMEM_DDR: u32 = 0b01;
/// Write buffer enable
pub const PHYCNT_WBUF: u32 = 1 << 4;
/// Software DDR strobe calibration enable
pub const PHYCNT_DDRCAL: u32 = 1 << 19;

// ============================================================================
// Data read (external address space) settings
// ============================================================================

/// Use a 64 MiB window, address bits [25:0] from the bus
pub const DREAR_EXT_64M: u32 = 0x0000_0001;
/// Shift from a flash address to the DREAR extended address field
pub const DREAR_EAV_SHIFT: u32 = 9;
/// 1-bit command, 1-bit 24-bit address, 1-bit data, dummy enabled
pub const DRENR_SPI: u32 = 0x0000_C700;
/// 1-bit command, 4-bit 32-bit address, 4-bit data, dummy enabled
pub const DRENR_QUAD: u32 = 0x0222_CF00;
/// Dummy cycles on 4 bits (DMDB = 2'b10)
pub const DRDMCR_QUAD: u32 = 0x0002_0000;
/// Address and data DDR transfer
pub const DRDRENR_DDR: u32 = 0x0000_0111;
/// SSL idle 1 CLK, SSL assert 5.5 CLKs, SPCLK after SSL 1 CLK
pub const SSLDR_DEFAULT: u32 = 0x0000_0400;

// ============================================================================
// SMENR - manual mode enable
// ============================================================================

/// Dummy cycle enable
pub const SMENR_DME: u32 = 1 << 15;
/// Command enable
pub const SMENR_CDE: u32 = 1 << 14;
/// 24-bit address output
pub const SMENR_ADE_24: u32 = 0x7 << 8;
/// 32-bit address output
pub const SMENR_ADE_32: u32 = 0xF << 8;
/// Address enable field mask
pub const SMENR_ADE_MASK: u32 = 0xF << 8;
/// 8-bit data transfer
pub const SMENR_SPIDE_8: u32 = 0x8;
/// 16-bit data transfer
pub const SMENR_SPIDE_16: u32 = 0xC;
/// 32-bit data transfer
pub const SMENR_SPIDE_32: u32 = 0xF;
/// Data enable field mask
pub const SMENR_SPIDE_MASK: u32 = 0xF;

/// Shift of the command opcode in SMCMR / DRCMR
pub const CMR_CMD_SHIFT: u32 = 16;

bitflags! {
    /// SMCR - manual mode control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Smcr: u32 {
        /// Start the SPI transfer
        const SPIE = 1 << 0;
        /// Data write enable
        const SPIWE = 1 << 1;
        /// Data read enable
        const SPIRE = 1 << 2;
    }
}

bitflags! {
    /// CMNSR - common status
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cmnsr: u32 {
        /// Transfer end
        const TEND = 1 << 0;
        /// SSL negated
        const SSLF = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smenr_composites_match_register_values() {
        assert_eq!(SMENR_CDE | SMENR_ADE_24 | SMENR_SPIDE_8, 0x4708);
        assert_eq!(SMENR_CDE | SMENR_ADE_32 | SMENR_SPIDE_32, 0x4F0F);
        assert_eq!(SMENR_DME | SMENR_CDE | SMENR_ADE_24 | SMENR_SPIDE_8, 0xC708);
        assert_eq!(SMENR_CDE | SMENR_ADE_32, 0x4F00);
    }

    #[test]
    fn test_phycnt_calibration_starts_at_slowest_tap() {
        assert_eq!(
            (PHYCNT_DDR_CALIBRATE & PHYCNT_STRTIM_MASK) >> PHYCNT_STRTIM_SHIFT,
            0b111
        );
        assert_eq!(PHYCNT_DDR_CALIBRATE & PHYCNT_PHYMEM_MASK, PHYCNT_PHYMEM_DDR);
        assert_ne!(PHYCNT_WRITE_BUFFER & PHYCNT_WBUF, 0);
        assert_eq!(PHYCNT_MANUAL & PHYCNT_WBUF, 0);
    }
}
