//! Serial NOR flash opcodes used by the driver
//!
//! Only the commands the RPC driver issues are listed here. Vendor-specific
//! commands are grouped by vendor.

use bitflags::bitflags;

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status and configuration registers
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Write Status Register (SR, optionally followed by CR)
pub const WRSR: u8 = 0x01;
/// Clear Status Register (Cypress: clears E_ERR / P_ERR)
pub const CLSR: u8 = 0x30;
/// Write Any Register (Cypress)
pub const WRAR: u8 = 0x71;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data, 3-byte address
pub const READ: u8 = 0x03;
/// Fast Read, 3-byte address, with dummy cycles
pub const FAST_READ: u8 = 0x0B;
/// Quad I/O Read, 4-byte address (1-4-4)
pub const QIOR_4B: u8 = 0xEC;
/// DDR Quad I/O Read, 4-byte address (1-4d-4d)
pub const DDRQIOR_4B: u8 = 0xEE;

// ============================================================================
// Program and erase, 4-byte address
// ============================================================================

/// Page Program, 3-byte address
pub const PP: u8 = 0x02;
/// Page Program, 4-byte address
pub const PP_4B: u8 = 0x12;
/// Sector Erase 4 KiB, 4-byte address
pub const SE_4B: u8 = 0x21;
/// Block Erase 32 KiB, 4-byte address
pub const BE32_4B: u8 = 0x5C;
/// Block Erase 64 KiB, 4-byte address
pub const BE64_4B: u8 = 0xDC;

// ============================================================================
// OTP / secured area
// ============================================================================

/// Enter Secured OTP (Macronix)
pub const ENSO: u8 = 0xB1;
/// Exit Secured OTP (Macronix)
pub const EXSO: u8 = 0xC1;
/// Write Security Register, sets the lock-down bit (Macronix)
pub const WRSCUR: u8 = 0x2F;
/// Read OTP Array (Micron)
pub const OTP_READ: u8 = 0x4B;
/// Program OTP Array (Micron)
pub const OTP_PROGRAM: u8 = 0x42;

// ============================================================================
// Register addresses and values
// ============================================================================

/// Cypress CR1V (volatile configuration register 1) address for WRAR
pub const CYPRESS_CR1V: u32 = 0x0080_0002;
/// Cypress CR2V (volatile configuration register 2) address for WRAR
pub const CYPRESS_CR2V: u32 = 0x0080_0003;
/// CR1V value: quad mode
pub const CYPRESS_CR1V_QUAD: u32 = 0x02;
/// CR2V value: 4-byte address, read latency setting
pub const CYPRESS_CR2V_4B: u32 = 0x07;
/// Macronix WRSR 16-bit payload: SR = QE, CR = 0x87 (dummy cycles, DC bits)
pub const MACRONIX_SR_CR_QUAD: u32 = 0x8740;
/// Micron OTP control byte address; programming bit 0 to 0 locks the array
pub const MICRON_OTP_CONTROL: u32 = 0x64;

bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusReg: u8 {
        /// Write in progress
        const WIP = 1 << 0;
        /// Write enable latch
        const WEL = 1 << 1;
        /// Erase error (Cypress)
        const E_ERR = 1 << 5;
        /// Program error (Cypress)
        const P_ERR = 1 << 6;
    }
}

/// Erase opcode for a given erase granularity
///
/// Unknown sizes fall back to the 64 KiB block erase.
pub const fn erase_opcode(sector_size: u32) -> u8 {
    match sector_size {
        0x1000 => SE_4B,
        0x8000 => BE32_4B,
        _ => BE64_4B,
    }
}
