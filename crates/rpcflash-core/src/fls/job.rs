//! Job kinds and the dispatch table
//!
//! Each active job kind maps to a [`JobOps`] row: how large the next chunk
//! is, which PAL primitive processes it, and how long the device may stay
//! busy before the job times out.

use crate::error::{PalError, PalResult};
use crate::pal::{Pal, OTP_MAX_ACCESS};
use crate::rpc::RegisterFile;
use crate::time::Clock;

/// Job currently latched in the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobKind {
    /// No job
    #[default]
    Idle,
    /// Initialisation in progress
    Init,
    /// Read into a caller buffer
    Read,
    /// Program from a caller buffer
    Write,
    /// Erase with the configured sector size
    Erase,
    /// Erase with the 4 KiB opcode
    Erase4K,
    /// Compare flash with a caller buffer
    Compare,
    /// Check a range is erased
    BlankCheck,
    /// Read from the OTP area
    OtpRead,
    /// Program the OTP area
    OtpWrite,
}

impl JobKind {
    /// Jobs that modify the device
    pub const fn is_write_family(self) -> bool {
        matches!(
            self,
            JobKind::Write | JobKind::OtpWrite | JobKind::Erase | JobKind::Erase4K
        )
    }

    /// Sector erase jobs
    pub const fn is_erase(self) -> bool {
        matches!(self, JobKind::Erase | JobKind::Erase4K)
    }
}

/// Caller buffer held for the lifetime of a job
#[derive(Debug, Default)]
pub(crate) enum JobData<'a> {
    #[default]
    Empty,
    Source(&'a [u8]),
    Sink(&'a mut [u8]),
}

/// Slice of the job buffer for one chunk
pub(crate) enum ChunkBuf<'s> {
    None,
    Source(&'s [u8]),
    Sink(&'s mut [u8]),
}

impl<'a> JobData<'a> {
    pub(crate) fn chunk(&mut self, offset: usize, len: usize) -> ChunkBuf<'_> {
        let range = offset..offset + len;
        match self {
            JobData::Empty => ChunkBuf::None,
            JobData::Source(src) => src.get(range).map_or(ChunkBuf::None, ChunkBuf::Source),
            JobData::Sink(dst) => dst.get_mut(range).map_or(ChunkBuf::None, ChunkBuf::Sink),
        }
    }
}

/// Inputs to the chunk and timeout functions
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepContext {
    pub current: u32,
    pub end: u32,
    pub page_size: u32,
    pub sector_size: u32,
    pub read_at_once: u32,
    pub write_at_once: u32,
    pub word_write_timeout_us: u32,
    pub sector_erase_timeout_ms: u32,
}

impl StepContext {
    fn remaining(&self) -> u32 {
        self.end.saturating_sub(self.current)
    }
}

/// Next chunk length, `None` once the job has no work left
pub(crate) type ChunkFn = fn(&StepContext) -> Option<u32>;
/// Process one chunk at an address
pub(crate) type WorkFn<R, C> = fn(&mut Pal<R, C>, u32, u32, ChunkBuf<'_>) -> PalResult<()>;
/// Busy budget in microseconds, `None` when busy never times out
pub(crate) type TimeoutFn = fn(&StepContext) -> Option<u32>;

/// One row of the dispatch table
pub(crate) struct JobOps<R, C> {
    pub chunk: ChunkFn,
    pub work: WorkFn<R, C>,
    pub timeout_us: TimeoutFn,
}

/// Program chunk: at most one write chunk, never across a page boundary
pub fn write_chunk_size(current: u32, remaining: u32, write_at_once: u32, page_size: u32) -> u32 {
    let step = remaining.min(write_at_once).min(page_size);
    if step == 0 {
        return 0;
    }
    let last = current + (step - 1);
    if current / page_size != last / page_size {
        (current | (page_size - 1)) - current + 1
    } else {
        step
    }
}

fn read_chunk(ctx: &StepContext) -> Option<u32> {
    match ctx.remaining() {
        0 => None,
        left => Some(left.min(ctx.read_at_once)),
    }
}

fn otp_chunk(ctx: &StepContext) -> Option<u32> {
    read_chunk(ctx).map(|len| len.min(OTP_MAX_ACCESS as u32))
}

fn write_chunk(ctx: &StepContext) -> Option<u32> {
    match ctx.remaining() {
        0 => None,
        left => Some(write_chunk_size(
            ctx.current,
            left,
            ctx.write_at_once,
            ctx.page_size,
        )),
    }
}

fn erase_chunk(ctx: &StepContext) -> Option<u32> {
    let next = ctx.current.checked_add(ctx.sector_size)?;
    (next <= ctx.end).then_some(ctx.sector_size)
}

fn no_timeout(_: &StepContext) -> Option<u32> {
    None
}

fn write_timeout(ctx: &StepContext) -> Option<u32> {
    Some(ctx.write_at_once.saturating_mul(ctx.word_write_timeout_us))
}

fn erase_timeout(ctx: &StepContext) -> Option<u32> {
    Some(ctx.sector_erase_timeout_ms.saturating_mul(1000))
}

/// Dispatch table lookup; `Idle` and `Init` have no row
pub(crate) fn ops<R: RegisterFile, C: Clock>(kind: JobKind) -> Option<JobOps<R, C>> {
    let ops: JobOps<R, C> = match kind {
        JobKind::Erase => JobOps {
            chunk: erase_chunk,
            work: |pal, addr, _, _| pal.erase_sector(addr),
            timeout_us: erase_timeout,
        },
        JobKind::Erase4K => JobOps {
            chunk: erase_chunk,
            work: |pal, addr, _, _| pal.erase_sector_4k(addr),
            timeout_us: erase_timeout,
        },
        JobKind::Write => JobOps {
            chunk: write_chunk,
            work: |pal, addr, _, buf| match buf {
                ChunkBuf::Source(data) => pal.program_page(addr, data),
                _ => Err(PalError::Parameter),
            },
            timeout_us: write_timeout,
        },
        JobKind::OtpWrite => JobOps {
            chunk: otp_chunk,
            work: |pal, addr, _, buf| match buf {
                ChunkBuf::Source(data) => pal.otp_write(addr, data),
                _ => Err(PalError::Parameter),
            },
            timeout_us: write_timeout,
        },
        JobKind::Read => JobOps {
            chunk: read_chunk,
            work: |pal, addr, _, buf| match buf {
                ChunkBuf::Sink(dst) => pal.read(addr, dst),
                _ => Err(PalError::Parameter),
            },
            timeout_us: no_timeout,
        },
        JobKind::OtpRead => JobOps {
            chunk: otp_chunk,
            work: |pal, addr, _, buf| match buf {
                ChunkBuf::Sink(dst) => pal.otp_read(addr, dst),
                _ => Err(PalError::Parameter),
            },
            timeout_us: no_timeout,
        },
        JobKind::Compare => JobOps {
            chunk: read_chunk,
            work: |pal, addr, _, buf| match buf {
                ChunkBuf::Source(expected) => pal.verify(addr, expected),
                _ => Err(PalError::Parameter),
            },
            timeout_us: no_timeout,
        },
        JobKind::BlankCheck => JobOps {
            chunk: read_chunk,
            work: |pal, addr, len, _| pal.blank_check(addr, len),
            timeout_us: no_timeout,
        },
        JobKind::Idle | JobKind::Init => return None,
    };
    Some(ops)
}
