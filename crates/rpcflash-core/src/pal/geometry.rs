//! Device geometry and timing parameters

use super::window::WINDOW_SIZE;
use crate::error::{PalError, PalResult};

/// Page, sector and device sizes plus the timing budgets derived from them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Program page size in bytes
    pub page_size: u32,
    /// Erase sector size in bytes
    pub sector_size: u32,
    /// Addressable device size in bytes
    pub device_size: u32,
    /// Program timeout per byte of a write chunk, in microseconds
    pub word_write_timeout_us: u32,
    /// Sector erase timeout in milliseconds
    pub sector_erase_timeout_ms: u32,
}

impl Geometry {
    /// Validate and build a geometry
    ///
    /// Sizes must nest: page a non-zero multiple of 16, sector a multiple
    /// of the page and larger than it, device a multiple of the sector and
    /// larger than it. Devices may span several read windows.
    pub fn new(
        page_size: u32,
        sector_size: u32,
        device_size: u32,
        word_write_timeout_us: u32,
        sector_erase_timeout_ms: u32,
    ) -> PalResult<Self> {
        let valid = page_size != 0
            && page_size % 16 == 0
            && sector_size % page_size == 0
            && sector_size > page_size
            && device_size % sector_size == 0
            && device_size > sector_size;
        if !valid {
            return Err(PalError::Size);
        }

        Ok(Self {
            page_size,
            sector_size,
            device_size,
            word_write_timeout_us,
            sector_erase_timeout_ms,
        })
    }

    /// Geometry with a different sector size, keeping everything else
    pub fn with_sector_size(self, sector_size: u32) -> PalResult<Self> {
        Self::new(
            self.page_size,
            sector_size,
            self.device_size,
            self.word_write_timeout_us,
            self.sector_erase_timeout_ms,
        )
    }

    /// True if `[addr, addr + len)` stays inside one program page
    pub fn within_page(&self, addr: u32, len: u32) -> bool {
        if len == 0 {
            return true;
        }
        let last = addr as u64 + len as u64 - 1;
        let page = self.page_size as u64;
        addr as u64 / page == last / page
    }

    /// True if `[addr, addr + len)` fits the device
    pub fn contains(&self, addr: u32, len: u32) -> bool {
        addr as u64 + len as u64 <= self.device_size as u64
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            page_size: 256,
            sector_size: 64 * 1024,
            device_size: WINDOW_SIZE,
            word_write_timeout_us: 5000,
            sector_erase_timeout_ms: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::new(256, 4096, WINDOW_SIZE, 5000, 3000).is_ok());
        assert_eq!(Geometry::new(0, 4096, WINDOW_SIZE, 0, 0), Err(PalError::Size));
        assert_eq!(Geometry::new(24, 4096, WINDOW_SIZE, 0, 0), Err(PalError::Size));
        assert_eq!(Geometry::new(256, 256, WINDOW_SIZE, 0, 0), Err(PalError::Size));
        assert_eq!(Geometry::new(256, 4000, WINDOW_SIZE, 0, 0), Err(PalError::Size));
        assert_eq!(Geometry::new(256, 4096, 4096, 0, 0), Err(PalError::Size));
        assert!(Geometry::new(256, 4096, WINDOW_SIZE * 2, 0, 0).is_ok());
    }

    #[test]
    fn test_with_sector_size() {
        let geo = Geometry::default();
        assert_eq!(geo.with_sector_size(4096).unwrap().sector_size, 4096);
        assert_eq!(geo.with_sector_size(100), Err(PalError::Size));
    }

    #[test]
    fn test_within_page() {
        let geo = Geometry::default();
        assert!(geo.within_page(0x100, 0x100));
        assert!(!geo.within_page(0x1F0, 0x20));
        assert!(geo.within_page(0x1F0, 0x10));
        assert!(geo.within_page(0x1234, 0));
    }
}
