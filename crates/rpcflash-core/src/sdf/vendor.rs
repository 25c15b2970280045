//! Flash vendor identification and capability table
//!
//! Every vendor-dependent decision of the driver (one-time setup, dummy
//! cycles, read option bits, OTP access, status quirks) is a field of
//! [`VendorCaps`]. The driver never matches on [`Vendor`] directly.

use super::opcodes;
use crate::pal::{DataWidth, TransferMode};

/// Serial flash vendor, identified by the JEDEC manufacturer ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vendor {
    /// Manufacturer not in the table
    #[default]
    Unknown,
    /// Micron (0x20)
    Micron,
    /// Macronix (0xC2)
    Macronix,
    /// Cypress / Infineon (0x01)
    Cypress,
}

impl Vendor {
    /// Look up the vendor for a JEDEC manufacturer ID
    pub fn from_manufacturer(id: u8) -> Self {
        VENDOR_TABLE
            .iter()
            .find(|caps| caps.manufacturer_id == Some(id))
            .map(|caps| caps.vendor)
            .unwrap_or(Vendor::Unknown)
    }

    /// Capability row for this vendor
    pub fn caps(self) -> &'static VendorCaps {
        match self {
            Vendor::Unknown => &VENDOR_TABLE[0],
            Vendor::Micron => &VENDOR_TABLE[1],
            Vendor::Macronix => &VENDOR_TABLE[2],
            Vendor::Cypress => &VENDOR_TABLE[3],
        }
    }

    /// Human readable vendor name
    pub fn name(self) -> &'static str {
        self.caps().name
    }
}

impl core::fmt::Display for Vendor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// One manual-mode command of a vendor's init sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Write Enable
    WriteEnable,
    /// Opcode only, no address or data
    Command(u8),
    /// Opcode with data and an optional address (0 = no address phase)
    Write {
        /// Command opcode
        opcode: u8,
        /// Data, right aligned
        data: u32,
        /// Data phase width
        width: DataWidth,
        /// Address, 0 for none
        addr: u32,
    },
}

/// How the OTP array is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpAccess {
    /// Secured area bracketed by enter/exit commands, accessed with the
    /// regular read and program opcodes
    SecuredArea {
        /// Enter secured OTP
        enter: u8,
        /// Exit secured OTP
        exit: u8,
        /// Read opcode inside the area
        read: u8,
        /// Program opcode inside the area
        program: u8,
    },
    /// Dedicated OTP opcodes
    Dedicated {
        /// Read OTP array (uses dummy cycles)
        read: u8,
        /// Program OTP array
        program: u8,
    },
    /// No OTP support
    Unsupported,
}

/// How the OTP array is permanently locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpLock {
    /// Write enable followed by a security register write opcode
    SecurityRegister(u8),
    /// Program a control byte in the OTP array to zero
    ControlByte(u32),
    /// Locking not supported
    Unsupported,
}

/// Vendor capability row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorCaps {
    /// Vendor this row describes
    pub vendor: Vendor,
    /// JEDEC manufacturer ID, `None` for the fallback row
    pub manufacturer_id: Option<u8>,
    /// Vendor name
    pub name: &'static str,
    /// Read mode selected after init
    pub transfer_mode: TransferMode,
    /// Dummy cycles for FAST_READ and manual reads with dummy phase
    pub dummy_cycles: u8,
    /// Dummy cycles for the quad SDR read (0xEC)
    pub dummy_cycles_ec: u8,
    /// Dummy cycles for the quad DDR read (0xEE)
    pub dummy_cycles_ee: u8,
    /// One-time setup sequence run at init
    pub setup: &'static [SetupStep],
    /// OTP access method
    pub otp_access: OtpAccess,
    /// OTP lock method
    pub otp_lock: OtpLock,
    /// Status register carries E_ERR / P_ERR that must be cleared with CLSR
    pub reports_status_errors: bool,
    /// DRENR option-data bits for the quad SDR and DDR single profiles
    pub drenr_option_sdr: u32,
    /// DRENR option-data bits for the DDR burst profile
    pub drenr_option_ddr: u32,
    /// Maximum page program time, if the datasheet value is known
    pub max_tpp_us: Option<u32>,
}

/// Option data 4 bits wide, OPD3 output
const DRENR_OPTION_OPD3: u32 = 0x0020_0080;
/// Option data transferred in DDR
const DRENR_OPTION_DDR: u32 = 0x0020_0000;

const MACRONIX_SETUP: &[SetupStep] = &[
    // leave the secured OTP area in case a previous session stayed there
    SetupStep::Command(opcodes::EXSO),
    SetupStep::WriteEnable,
    SetupStep::Write {
        opcode: opcodes::WRSR,
        data: opcodes::MACRONIX_SR_CR_QUAD,
        width: DataWidth::Bits16,
        addr: 0,
    },
];

const CYPRESS_SETUP: &[SetupStep] = &[
    SetupStep::WriteEnable,
    SetupStep::Write {
        opcode: opcodes::WRAR,
        data: opcodes::CYPRESS_CR1V_QUAD,
        width: DataWidth::Bits8,
        addr: opcodes::CYPRESS_CR1V,
    },
    SetupStep::WriteEnable,
    SetupStep::Write {
        opcode: opcodes::WRAR,
        data: opcodes::CYPRESS_CR2V_4B,
        width: DataWidth::Bits8,
        addr: opcodes::CYPRESS_CR2V,
    },
];

/// Capability table, indexed through [`Vendor::caps`]
pub static VENDOR_TABLE: [VendorCaps; 4] = [
    VendorCaps {
        vendor: Vendor::Unknown,
        manufacturer_id: None,
        name: "unknown",
        transfer_mode: TransferMode::SpiSdrBurst,
        dummy_cycles: 8,
        dummy_cycles_ec: 8,
        dummy_cycles_ee: 8,
        setup: &[],
        otp_access: OtpAccess::Unsupported,
        otp_lock: OtpLock::Unsupported,
        reports_status_errors: false,
        drenr_option_sdr: 0,
        drenr_option_ddr: 0,
        max_tpp_us: None,
    },
    VendorCaps {
        vendor: Vendor::Micron,
        manufacturer_id: Some(0x20),
        name: "Micron",
        transfer_mode: TransferMode::QspiDdrBurst,
        dummy_cycles: 8,
        dummy_cycles_ec: 10,
        dummy_cycles_ee: 8,
        setup: &[],
        otp_access: OtpAccess::Dedicated {
            read: opcodes::OTP_READ,
            program: opcodes::OTP_PROGRAM,
        },
        otp_lock: OtpLock::ControlByte(opcodes::MICRON_OTP_CONTROL),
        reports_status_errors: false,
        drenr_option_sdr: 0,
        drenr_option_ddr: 0,
        max_tpp_us: Some(1800),
    },
    VendorCaps {
        vendor: Vendor::Macronix,
        manufacturer_id: Some(0xC2),
        name: "Macronix",
        transfer_mode: TransferMode::QspiDdrBurst,
        dummy_cycles: 8,
        dummy_cycles_ec: 6,
        dummy_cycles_ee: 8,
        setup: MACRONIX_SETUP,
        otp_access: OtpAccess::SecuredArea {
            enter: opcodes::ENSO,
            exit: opcodes::EXSO,
            read: opcodes::READ,
            program: opcodes::PP,
        },
        otp_lock: OtpLock::SecurityRegister(opcodes::WRSCUR),
        reports_status_errors: false,
        drenr_option_sdr: DRENR_OPTION_OPD3,
        drenr_option_ddr: DRENR_OPTION_DDR,
        max_tpp_us: Some(750),
    },
    VendorCaps {
        vendor: Vendor::Cypress,
        manufacturer_id: Some(0x01),
        name: "Cypress",
        transfer_mode: TransferMode::QspiSdrBurst,
        dummy_cycles: 7,
        dummy_cycles_ec: 7,
        dummy_cycles_ee: 7,
        setup: CYPRESS_SETUP,
        otp_access: OtpAccess::Unsupported,
        otp_lock: OtpLock::Unsupported,
        reports_status_errors: true,
        drenr_option_sdr: DRENR_OPTION_OPD3,
        drenr_option_ddr: DRENR_OPTION_OPD3,
        max_tpp_us: None,
    },
];

/// Largest page program time of all vendors in the table
///
/// Bounds how long [`crate::Fls::emergency_unlock`] waits for a program
/// cycle already started.
pub const MAX_TPP_US: u32 = {
    let mut max = 0;
    let mut i = 0;
    while i < VENDOR_TABLE.len() {
        if let Some(tpp) = VENDOR_TABLE[i].max_tpp_us {
            if tpp > max {
                max = tpp;
            }
        }
        i += 1;
    }
    max
};
