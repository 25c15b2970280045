//! External address space window
//!
//! The controller maps flash reads through a 64 MiB window. Larger
//! devices are reached by moving the window (`DREAR`), so every read-path
//! operation is split at window boundaries first.

/// CPU address of the window on the reference SoC
pub const WINDOW_BASE: u32 = 0x0800_0000;
/// Window size in bytes
pub const WINDOW_SIZE: u32 = 0x0400_0000;
/// Mask selecting the offset inside a window
pub const WINDOW_MASK: u32 = WINDOW_SIZE - 1;
/// Data cache line length used for invalidation
pub const CACHE_LINE: u32 = 32;

/// One window-local piece of a larger range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Flash address of the first byte
    pub addr: u32,
    /// Length in bytes
    pub len: u32,
    /// Byte offset of this piece within the whole range
    pub offset: usize,
}

impl Segment {
    /// Offset of the first byte inside its window
    pub fn window_offset(&self) -> u32 {
        self.addr & WINDOW_MASK
    }

    /// Index range of this piece in a buffer covering the whole range
    pub fn buf_range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len as usize
    }
}

/// Iterator splitting `[addr, addr + len)` at window boundaries
#[derive(Debug, Clone)]
pub struct WindowSegments {
    addr: u64,
    remaining: u64,
    offset: usize,
}

impl WindowSegments {
    /// Split `len` bytes starting at `addr`
    pub fn new(addr: u32, len: u32) -> Self {
        Self {
            addr: addr as u64,
            remaining: len as u64,
            offset: 0,
        }
    }
}

impl Iterator for WindowSegments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.remaining == 0 {
            return None;
        }
        // beyond 32-bit addressing, nothing left to address
        let addr = u32::try_from(self.addr).ok()?;

        let size = WINDOW_SIZE as u64;
        let mut last = self.addr + self.remaining - 1;
        if self.addr / size != last / size {
            last = self.addr | WINDOW_MASK as u64;
        }
        let len = last - self.addr + 1;

        let seg = Segment {
            addr,
            len: len as u32,
            offset: self.offset,
        };
        self.addr += len;
        self.remaining -= len;
        self.offset += len as usize;
        Some(seg)
    }
}

/// True if `[addr, addr + len)` touches more than one window
pub fn crosses_window(addr: u32, len: u32) -> bool {
    if len == 0 {
        return false;
    }
    let last = addr as u64 + len as u64 - 1;
    (addr as u64 & !(WINDOW_MASK as u64)) != (last & !(WINDOW_MASK as u64))
}

/// `DREAR` extended address bits selecting the window holding `addr`
pub fn extended_address(addr: u32) -> u32 {
    (addr & !WINDOW_MASK) >> crate::rpc::regs::DREAR_EAV_SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_window_is_one_segment() {
        let segs: [Option<Segment>; 2] = {
            let mut it = WindowSegments::new(0x100, 0x1000);
            [it.next(), it.next()]
        };
        assert_eq!(
            segs[0],
            Some(Segment {
                addr: 0x100,
                len: 0x1000,
                offset: 0
            })
        );
        assert_eq!(segs[1], None);
    }

    #[test]
    fn test_segments_cover_range_without_crossing() {
        let addr = WINDOW_SIZE - 0x10;
        let len = 2 * WINDOW_SIZE;
        let mut covered = 0u64;
        let mut next_addr = addr as u64;
        let mut count = 0;
        for seg in WindowSegments::new(addr, len) {
            assert_eq!(seg.addr as u64, next_addr);
            assert_eq!(seg.offset as u64, covered);
            assert!(!crosses_window(seg.addr, seg.len));
            covered += seg.len as u64;
            next_addr += seg.len as u64;
            count += 1;
        }
        assert_eq!(covered, len as u64);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_segment_ends_on_window_boundary() {
        let mut it = WindowSegments::new(WINDOW_SIZE - 4, 8);
        let first = it.next().unwrap();
        assert_eq!(first.len, 4);
        assert_eq!(first.window_offset(), WINDOW_SIZE - 4);
        let second = it.next().unwrap();
        assert_eq!(second.addr, WINDOW_SIZE);
        assert_eq!(second.window_offset(), 0);
        assert_eq!(second.buf_range(), 4..8);
        assert!(it.next().is_none());
    }

    #[test]
    fn test_empty_range() {
        assert_eq!(WindowSegments::new(0x1234, 0).count(), 0);
        assert!(!crosses_window(0x1234, 0));
    }

    #[test]
    fn test_extended_address() {
        assert_eq!(extended_address(0x0123_4567), 0);
        assert_eq!(extended_address(WINDOW_SIZE), 0x0002_0000);
        assert_eq!(1 | extended_address(3 * WINDOW_SIZE + 5), 0x0006_0001);
    }
}
