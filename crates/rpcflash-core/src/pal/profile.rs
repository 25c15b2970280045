//! Read profiles for the external address space
//!
//! A profile is the full set of data-read registers for one transfer
//! mode. Profiles are computed from the mode, the vendor row and the
//! calibrated strobe tap, then written in one go.

use crate::rpc::regs::*;
use crate::rpc::RegisterFile;
use crate::sdf::{opcodes, VendorCaps};

/// Transfer mode used for window reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Single SPI, SDR, burst (FAST_READ 0x0B)
    #[default]
    SpiSdrBurst,
    /// Quad SPI, SDR, burst (4QIOR 0xEC)
    QspiSdrBurst,
    /// Quad SPI, DDR, single access (4DDRQIOR 0xEE)
    QspiDdrSingle,
    /// Quad SPI, DDR, burst with calibrated strobe timing (4DDRQIOR 0xEE)
    QspiDdrBurst,
}

impl TransferMode {
    /// Short name for logs and the CLI
    pub fn name(self) -> &'static str {
        match self {
            TransferMode::SpiSdrBurst => "SPI SDR burst",
            TransferMode::QspiSdrBurst => "QSPI SDR burst",
            TransferMode::QspiDdrSingle => "QSPI DDR single",
            TransferMode::QspiDdrBurst => "QSPI DDR burst",
        }
    }

    /// True for the DDR modes
    pub fn is_ddr(self) -> bool {
        matches!(
            self,
            TransferMode::QspiDdrSingle | TransferMode::QspiDdrBurst
        )
    }
}

impl core::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Register values for one read mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProfile {
    /// PHY offset
    pub offset1: u32,
    /// PHY control
    pub phycnt: u32,
    /// Common control
    pub cmncr: u32,
    /// Data read control
    pub drcr: u32,
    /// Data read command
    pub drcmr: u32,
    /// Data read enable
    pub drenr: u32,
    /// Data read dummy cycles
    pub drdmcr: u32,
    /// Data read DDR enable
    pub drdrenr: u32,
}

impl ReadProfile {
    /// Profile for `mode` on a device described by `caps`
    ///
    /// `tap` only matters for [`TransferMode::QspiDdrBurst`].
    pub fn for_mode(mode: TransferMode, caps: &VendorCaps, tap: u8) -> Self {
        let dummy = |cycles: u8| u32::from(cycles.saturating_sub(1));
        match mode {
            TransferMode::SpiSdrBurst => Self {
                offset1: OFFSET1_SDR,
                phycnt: PHYCNT_SDR_READ,
                cmncr: CMNCR_EXT_SPI,
                drcr: DRCR_BURST,
                drcmr: (opcodes::FAST_READ as u32) << CMR_CMD_SHIFT,
                drenr: DRENR_SPI,
                drdmcr: dummy(caps.dummy_cycles),
                drdrenr: 0,
            },
            TransferMode::QspiSdrBurst => Self {
                offset1: OFFSET1_SDR,
                phycnt: PHYCNT_SDR_READ,
                cmncr: CMNCR_EXT_QUAD,
                drcr: DRCR_BURST,
                drcmr: (opcodes::QIOR_4B as u32) << CMR_CMD_SHIFT,
                drenr: DRENR_QUAD | caps.drenr_option_sdr,
                drdmcr: DRDMCR_QUAD | dummy(caps.dummy_cycles_ec),
                drdrenr: 0,
            },
            TransferMode::QspiDdrSingle => Self {
                offset1: OFFSET1_DDR,
                phycnt: PHYCNT_DDR_SINGLE,
                cmncr: CMNCR_EXT_QUAD,
                drcr: DRCR_SINGLE,
                drcmr: (opcodes::DDRQIOR_4B as u32) << CMR_CMD_SHIFT,
                drenr: DRENR_QUAD | caps.drenr_option_sdr,
                drdmcr: DRDMCR_QUAD | dummy(caps.dummy_cycles_ee),
                drdrenr: DRDRENR_DDR,
            },
            TransferMode::QspiDdrBurst => Self {
                offset1: OFFSET1_DDR,
                phycnt: PHYCNT_DDR_BURST
                    | ((u32::from(tap) << PHYCNT_STRTIM_SHIFT) & PHYCNT_STRTIM_MASK),
                cmncr: CMNCR_EXT_QUAD,
                drcr: DRCR_BURST_CONTINUOUS,
                drcmr: (opcodes::DDRQIOR_4B as u32) << CMR_CMD_SHIFT,
                drenr: DRENR_QUAD | caps.drenr_option_ddr,
                drdmcr: DRDMCR_QUAD | dummy(caps.dummy_cycles_ee),
                drdrenr: DRDRENR_DDR,
            },
        }
    }

    /// Program the data-read registers
    pub fn apply<R: RegisterFile>(&self, regs: &mut R) {
        regs.write32(RPC_OFFSET1, self.offset1);
        regs.write32(RPC_PHYCNT, self.phycnt);
        regs.write32(RPC_CMNCR, self.cmncr);
        regs.write32(RPC_DRCR, self.drcr);
        regs.write32(RPC_DRCMR, self.drcmr);
        regs.write32(RPC_DRENR, self.drenr);
        regs.write32(RPC_DRDMCR, self.drdmcr);
        regs.write32(RPC_DRDRENR, self.drdrenr);
    }
}
