//! Protocol driver for serial NOR flash behind the RPC controller
//!
//! [`Pal`] owns the register file and the clock and keeps the device
//! state: geometry, detected vendor, read mode and DDR calibration. All
//! operations are synchronous and return as soon as the controller
//! transfer is done; program and erase cycles are left running in the
//! device and observed through [`Pal::is_busy`].

mod calibration;
mod command;
mod geometry;
mod otp;
mod profile;
mod program;
mod read;
pub mod window;

pub use calibration::{pick_tap, CALIBRATION_ADDR, CALIBRATION_INTERVAL_US, CALIBRATION_PATTERN};
pub use command::DataWidth;
pub use geometry::Geometry;
pub use otp::OTP_MAX_ACCESS;
pub use program::PROGRAM_ALIGN;
pub use profile::{ReadProfile, TransferMode};
pub use window::{Segment, WindowSegments};

use crate::error::{PalError, PalResult};
use crate::rpc::regs::{DREAR_EXT_64M, RPC_DREAR, RPC_SSLDR, SSLDR_DEFAULT};
use crate::rpc::{RegisterFile, Spclk};
use crate::sdf::{opcodes, SetupStep, Vendor, VendorCaps};
use crate::time::Clock;

/// Program page size used by the driver
pub const PAGE_SIZE: u32 = 256;
/// Write windows up to this size use 4 KiB sectors, larger ones 64 KiB
pub const SMALL_PARTITION_LIMIT: u32 = 64 * 1024;
/// Default program timeout per byte of a chunk
pub const WORD_WRITE_TIMEOUT_US: u32 = 5000;
/// Default sector erase timeout
pub const SECTOR_ERASE_TIMEOUT_MS: u32 = 3000;
/// SPCLK the controller is set up for
pub const SPCLK: Spclk = Spclk::Mhz66;
/// Settling time after a clock divider change
const CLOCK_SETTLE_US: u32 = 1000;

/// Device readiness as reported by the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No program or erase cycle in progress
    Ready,
    /// Write in progress
    Busy,
}

/// JEDEC identification read at init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecId {
    /// Manufacturer ID
    pub manufacturer: u8,
    /// Memory type (high byte) and capacity code (low byte)
    pub device: u16,
}

impl JedecId {
    /// Decode the 32-bit RDID response
    pub fn from_raw(data: u32) -> Self {
        Self {
            manufacturer: (data & 0xFF) as u8,
            device: (((data >> 16) & 0xFF) | (data & 0xFF00)) as u16,
        }
    }
}

/// Protocol driver state for one flash device
pub struct Pal<R, C> {
    regs: R,
    clock: C,
    geometry: Geometry,
    mode: TransferMode,
    vendor: Vendor,
    caps: &'static VendorCaps,
    jedec: Option<JedecId>,
    calibrated_tap: u8,
    last_calibration: Option<u32>,
}

impl<R: RegisterFile, C: Clock> Pal<R, C> {
    /// Create a driver over a register file and a clock
    ///
    /// Nothing is touched until [`Pal::init`].
    pub fn new(regs: R, clock: C) -> Self {
        Self {
            regs,
            clock,
            geometry: Geometry::default(),
            mode: TransferMode::default(),
            vendor: Vendor::Unknown,
            caps: Vendor::Unknown.caps(),
            jedec: None,
            calibrated_tap: 0,
            last_calibration: None,
        }
    }

    /// Bring up the controller and the flash device
    ///
    /// Sets the SPI clock, resets the controller, picks 4 KiB sectors for
    /// write windows of up to 64 KiB (64 KiB sectors otherwise), identifies
    /// the vendor, runs its setup sequence and calibrates DDR reads. An
    /// unknown vendor leaves the driver usable in single SPI mode but
    /// reports [`PalError::NotSupported`].
    pub fn init(&mut self, write_window_size: u32) -> PalResult<()> {
        self.setup_controller(SPCLK);

        let sector_size = if write_window_size <= SMALL_PARTITION_LIMIT {
            4 * 1024
        } else {
            64 * 1024
        };
        self.set_parameters(
            PAGE_SIZE,
            sector_size,
            window::WINDOW_SIZE,
            WORD_WRITE_TIMEOUT_US,
            SECTOR_ERASE_TIMEOUT_MS,
        )?;

        let id = self.read_jedec_id()?;
        self.jedec = Some(id);
        self.vendor = Vendor::from_manufacturer(id.manufacturer);
        self.caps = self.vendor.caps();
        self.mode = self.caps.transfer_mode;

        for step in self.caps.setup {
            self.run_setup_step(*step)?;
        }

        let detected = if self.vendor == Vendor::Unknown {
            log::warn!(
                "Unknown flash manufacturer 0x{:02X} (device 0x{:04X})",
                id.manufacturer,
                id.device
            );
            Err(PalError::NotSupported)
        } else {
            log::info!(
                "Found {} flash (device 0x{:04X})",
                self.vendor,
                id.device
            );
            Ok(())
        };

        self.calibrate();
        self.apply_calibration_result();
        log::info!(
            "Read mode {}, {} KiB sectors",
            self.mode,
            self.geometry.sector_size / 1024
        );

        detected
    }

    fn setup_controller(&mut self, spclk: Spclk) {
        let divider = spclk.divider();
        if self.regs.clock_divider() != divider {
            log::debug!("Setting SPCLK to {} MHz (divider 0x{:02X})", spclk.mhz(), divider);
            self.regs.set_clock_divider(divider);
            self.clock.delay_us(CLOCK_SETTLE_US);
        }
        self.regs.reset_module();
        self.regs.write32(RPC_SSLDR, SSLDR_DEFAULT);
        self.regs.write32(RPC_DREAR, DREAR_EXT_64M);
    }

    fn run_setup_step(&mut self, step: SetupStep) -> PalResult<()> {
        match step {
            SetupStep::WriteEnable => self.write_enable(),
            SetupStep::Command(opcode) => self.write_command(opcode, 0, DataWidth::None, 0),
            SetupStep::Write {
                opcode,
                data,
                width,
                addr,
            } => self.write_command(opcode, data, width, addr),
        }
    }

    /// Replace the geometry after validation
    pub fn set_parameters(
        &mut self,
        page_size: u32,
        sector_size: u32,
        device_size: u32,
        word_write_timeout_us: u32,
        sector_erase_timeout_ms: u32,
    ) -> PalResult<()> {
        self.geometry = Geometry::new(
            page_size,
            sector_size,
            device_size,
            word_write_timeout_us,
            sector_erase_timeout_ms,
        )?;
        Ok(())
    }

    /// Change the erase granularity; only 4, 32 and 64 KiB are accepted
    pub fn set_sector_size(&mut self, sector_size: u32) -> PalResult<()> {
        if !matches!(sector_size, 0x1000 | 0x8000 | 0x10000) {
            return Err(PalError::Size);
        }
        self.geometry = self.geometry.with_sector_size(sector_size)?;
        log::debug!("Sector size set to {} KiB", sector_size / 1024);
        Ok(())
    }

    /// Override the read mode selected at init
    ///
    /// A failed DDR calibration still forces single-data-rate reads.
    pub fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.mode = mode;
    }

    /// Poll the status register
    ///
    /// Devices that latch program/erase errors in the status register
    /// (Cypress) get them cleared with CLSR and reported as
    /// [`PalError::Erase`] or [`PalError::Write`].
    pub fn is_busy(&mut self) -> PalResult<DeviceState> {
        let raw = self.read_command(opcodes::RDSR, DataWidth::Bits8, 0)?;
        let status = opcodes::StatusReg::from_bits_retain(raw as u8);

        if self.caps.reports_status_errors
            && status.intersects(opcodes::StatusReg::E_ERR | opcodes::StatusReg::P_ERR)
        {
            log::warn!("Device reported error, status 0x{:02X}", status.bits());
            self.transmit(opcodes::CLSR, 0, DataWidth::None, 0);
            self.wait_tx_end()?;
            return if status.contains(opcodes::StatusReg::E_ERR) {
                Err(PalError::Erase)
            } else {
                Err(PalError::Write)
            };
        }

        if status.contains(opcodes::StatusReg::WIP) {
            Ok(DeviceState::Busy)
        } else {
            Ok(DeviceState::Ready)
        }
    }

    /// Program page size
    pub fn page_size(&self) -> u32 {
        self.geometry.page_size
    }

    /// Erase sector size
    pub fn sector_size(&self) -> u32 {
        self.geometry.sector_size
    }

    /// Addressable device size
    pub fn device_size(&self) -> u32 {
        self.geometry.device_size
    }

    /// Program timeout per byte of a chunk
    pub fn word_write_timeout_us(&self) -> u32 {
        self.geometry.word_write_timeout_us
    }

    /// Sector erase timeout
    pub fn sector_erase_timeout_ms(&self) -> u32 {
        self.geometry.sector_erase_timeout_ms
    }

    /// Current geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Vendor detected at init
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Capability row of the detected vendor
    pub fn caps(&self) -> &'static VendorCaps {
        self.caps
    }

    /// JEDEC ID read at init
    pub fn jedec_id(&self) -> Option<JedecId> {
        self.jedec
    }

    /// Read mode in use
    pub fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    /// Strobe timing tap found by the last calibration
    pub fn calibrated_tap(&self) -> u8 {
        self.calibrated_tap
    }

    /// Register file
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Mutable register file
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Time source
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
