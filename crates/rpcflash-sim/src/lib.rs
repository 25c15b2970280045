//! rpcflash-sim - In-memory RPC controller and NOR flash emulator
//!
//! This crate emulates the RPC register block and a QSPI NOR device behind
//! it, so the driver in `rpcflash-core` can run without hardware. It is
//! used by the tests and by the `rpcflash` command line tool.
//!
//! The emulated device comes in three vendor personalities (Micron,
//! Macronix, Cypress) plus an unknown one, and supports fault injection:
//! busy cycles that never end, erase/program errors reported in the status
//! register, stalled controller transfers and a DDR strobe window.

#![warn(missing_docs)]

mod clock;
mod controller;
mod device;

#[cfg(test)]
mod scenarios;

pub use clock::SimClock;
pub use controller::SimRpc;
pub use device::{Command, NorDevice, BUSY_FOREVER};

use core::ops::RangeInclusive;

use rpcflash_core::pal::CALIBRATION_ADDR;
use rpcflash_core::sdf::opcodes::MICRON_OTP_CONTROL;
use rpcflash_core::Pal;

/// Emulated device parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC memory type and capacity
    pub device_id: u16,
    /// Main array size in bytes
    pub size: usize,
    /// OTP area size in bytes
    pub otp_size: usize,
    /// OTP byte whose bit 0 locks the area when cleared
    pub otp_lock_addr: Option<u32>,
    /// Status polls a program or erase cycle stays busy
    pub busy_polls: u32,
    /// Strobe taps that read DDR data correctly
    pub passing_taps: RangeInclusive<u8>,
    /// Where to seed the DDR calibration pattern
    pub calibration_pattern_at: Option<u32>,
}

impl SimConfig {
    /// Micron MT25QL512-like device
    pub fn micron() -> Self {
        Self {
            manufacturer_id: 0x20,
            device_id: 0xBA20,
            size: 8 * 1024 * 1024,
            otp_size: 0x80,
            otp_lock_addr: Some(MICRON_OTP_CONTROL),
            busy_polls: 2,
            passing_taps: 2..=5,
            calibration_pattern_at: Some(CALIBRATION_ADDR),
        }
    }

    /// Macronix MX25L51245G-like device
    pub fn macronix() -> Self {
        Self {
            manufacturer_id: 0xC2,
            device_id: 0x201A,
            otp_lock_addr: None,
            ..Self::micron()
        }
    }

    /// Cypress S25FL512S-like device
    pub fn cypress() -> Self {
        Self {
            manufacturer_id: 0x01,
            device_id: 0x0220,
            otp_lock_addr: None,
            ..Self::micron()
        }
    }

    /// Device with a manufacturer the driver does not know
    pub fn unknown() -> Self {
        Self {
            manufacturer_id: 0xEF,
            device_id: 0x4018,
            otp_lock_addr: None,
            ..Self::micron()
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::micron()
    }
}

/// Protocol driver over a fresh emulated device
pub fn sim_pal(config: SimConfig, clock: SimClock) -> Pal<SimRpc, SimClock> {
    Pal::new(SimRpc::new(config), clock)
}
