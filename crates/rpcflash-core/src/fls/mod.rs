//! Asynchronous flash job state machine
//!
//! [`Fls`] accepts one job at a time. A request only validates and latches
//! the job; the work is done by [`Fls::main_function`], which moves the job
//! forward by one bounded chunk per call:
//!
//! ```text
//!   request ──► status Busy, job_result Pending
//!                 │
//!   main_function ├─ device busy ──► wait (or time out)
//!                 ├─ work left   ──► one chunk through the PAL
//!                 └─ done/error  ──► status Idle, job_result Ok/Failed,
//!                                    notification
//! ```
//!
//! All job state is guarded by a non-blocking [`TryLock`]. A request that
//! finds the lock held is refused, a `main_function` call that finds it held
//! does nothing.

mod config;
mod job;
mod lock;
mod notify;

pub use config::{FlsConfig, InvalidConfig, MemIfMode};
#[cfg(feature = "std")]
pub use config::{ConfigError, Size};
pub use job::{write_chunk_size, JobKind};
pub use lock::TryLock;
pub use notify::JobNotification;

use crate::error::{JobResult, PalError, PalResult, RequestError};
use crate::pal::{DeviceState, Pal};
use crate::rpc::RegisterFile;
use crate::sdf::MAX_TPP_US;
use crate::time::Clock;
use job::{JobData, StepContext};

/// Driver status as seen by the memory abstraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemIfStatus {
    /// Not initialised, or initialisation failed
    #[default]
    Uninit,
    /// Ready for a request
    Idle,
    /// A job is active
    Busy,
}

/// Name and version of this driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Crate name
    pub name: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Flash driver context for one device
///
/// `'a` is the lifetime of the caller buffers a job holds on to.
pub struct Fls<'a, R, C, N = ()> {
    pal: Pal<R, C>,
    notify: N,
    lock: TryLock,
    status: MemIfStatus,
    job: JobKind,
    job_result: JobResult,
    last_return: PalResult<DeviceState>,
    mode: MemIfMode,
    config: FlsConfig,
    current: u32,
    end: u32,
    data: JobData<'a>,
    offset: usize,
    page_size: u32,
    sector_size: u32,
    start_time: u32,
    init_done: bool,
}

impl<'a, R: RegisterFile, C: Clock, N: JobNotification> Fls<'a, R, C, N> {
    /// Create an uninitialised driver
    pub fn new(pal: Pal<R, C>, notify: N) -> Self {
        Self {
            pal,
            notify,
            lock: TryLock::new(),
            status: MemIfStatus::Uninit,
            job: JobKind::Idle,
            job_result: JobResult::Ok,
            last_return: Ok(DeviceState::Ready),
            mode: MemIfMode::default(),
            config: FlsConfig::default(),
            current: 0,
            end: 0,
            data: JobData::Empty,
            offset: 0,
            page_size: 0,
            sector_size: 0,
            start_time: 0,
            init_done: false,
        }
    }

    // ========================================================================
    // Initialisation
    // ========================================================================

    /// Initialise the device and latch `config`
    ///
    /// The PAL init runs only until it has succeeded once. Returns the PAL
    /// result; an unknown vendor leaves the driver uninitialised.
    pub fn init(&mut self, config: &FlsConfig) -> PalResult<()> {
        if !self.lock.try_acquire() {
            log::warn!("init refused: driver locked");
            return Err(PalError::Busy);
        }
        self.job = JobKind::Init;

        let res = match config.validate() {
            Err(err) => {
                log::error!("Invalid configuration: {}", err);
                Err(PalError::Parameter)
            }
            Ok(()) if self.init_done => Ok(()),
            Ok(()) => self.pal.init(config.write_window_size),
        };

        match res {
            Ok(()) => {
                self.init_done = true;
                self.config = *config;
                self.mode = config.init_mode;
                self.page_size = self.pal.page_size();
                self.sector_size = self.pal.sector_size();
                self.status = MemIfStatus::Idle;
                self.job_result = JobResult::Ok;
                log::debug!(
                    "Fls ready: window 0x{:08X}+0x{:X}, mode {:?}",
                    config.write_window_start,
                    config.write_window_size,
                    self.mode
                );
            }
            Err(err) => {
                log::error!("Fls init failed: {}", err);
                self.status = MemIfStatus::Uninit;
                self.job_result = JobResult::Failed;
            }
        }

        self.job = JobKind::Idle;
        self.lock.release();
        res
    }

    // ========================================================================
    // Requests
    // ========================================================================

    fn translate(&self, addr: u32, len: usize) -> Result<(u32, u32), RequestError> {
        let len = u32::try_from(len).map_err(|_| RequestError::AddressOverflow)?;
        let addr = addr
            .checked_add(self.config.nvm_offset)
            .ok_or(RequestError::AddressOverflow)?;
        addr.checked_add(len).ok_or(RequestError::AddressOverflow)?;
        Ok((addr, len))
    }

    fn check_window(&self, addr: u32, len: u32) -> Result<(), RequestError> {
        if self.config.in_write_window(addr, len) {
            Ok(())
        } else {
            Err(RequestError::OutOfWindow { addr, len })
        }
    }

    fn check_sector(&self, addr: u32, len: u32) -> Result<(), RequestError> {
        let sector = self.sector_size;
        if sector != 0 && (addr % sector != 0 || len % sector != 0) {
            return Err(RequestError::Misaligned { addr, len });
        }
        Ok(())
    }

    fn submit(
        &mut self,
        kind: JobKind,
        addr: u32,
        len: u32,
        data: JobData<'a>,
    ) -> Result<(), RequestError> {
        if !self.lock.try_acquire() {
            log::warn!("{:?} request refused: driver locked", kind);
            return Err(RequestError::Locked);
        }
        if self.status != MemIfStatus::Idle {
            self.lock.release();
            log::warn!("{:?} request refused: driver {:?}", kind, self.status);
            return Err(RequestError::NotIdle);
        }

        self.job = kind;
        self.current = addr;
        self.end = addr + len;
        self.data = data;
        self.offset = 0;
        self.status = MemIfStatus::Busy;
        self.job_result = JobResult::Pending;
        self.last_return = Ok(DeviceState::Ready);
        self.lock.release();

        log::debug!("{:?} accepted: 0x{:08X}+0x{:X}", kind, addr, len);
        Ok(())
    }

    /// Read `buf.len()` bytes from `addr`
    ///
    /// The buffer is filled while the job runs; get it back with
    /// [`Fls::take_buffer`] once the job has settled.
    pub fn read(&mut self, addr: u32, buf: &'a mut [u8]) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, buf.len())?;
        self.submit(JobKind::Read, addr, len, JobData::Sink(buf))
    }

    /// Program `data` at `addr`
    pub fn write(&mut self, addr: u32, data: &'a [u8]) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, data.len())?;
        self.check_window(addr, len)?;
        self.submit(JobKind::Write, addr, len, JobData::Source(data))
    }

    /// Erase `len` bytes at `addr`, one sector per step
    pub fn erase(&mut self, addr: u32, len: u32) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, len as usize)?;
        self.check_window(addr, len)?;
        self.check_sector(addr, len)?;
        self.submit(JobKind::Erase, addr, len, JobData::Empty)
    }

    /// Erase `len` bytes at `addr` with the 4 KiB erase opcode
    pub fn erase_4k(&mut self, addr: u32, len: u32) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, len as usize)?;
        self.check_window(addr, len)?;
        self.check_sector(addr, len)?;
        self.submit(JobKind::Erase4K, addr, len, JobData::Empty)
    }

    /// Compare flash at `addr` with `data`
    pub fn compare(&mut self, addr: u32, data: &'a [u8]) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, data.len())?;
        self.submit(JobKind::Compare, addr, len, JobData::Source(data))
    }

    /// Check that `len` bytes at `addr` are erased
    pub fn blank_check(&mut self, addr: u32, len: u32) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, len as usize)?;
        self.submit(JobKind::BlankCheck, addr, len, JobData::Empty)
    }

    /// Read from the OTP area
    pub fn otp_read(&mut self, addr: u32, buf: &'a mut [u8]) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, buf.len())?;
        self.submit(JobKind::OtpRead, addr, len, JobData::Sink(buf))
    }

    /// Program the OTP area
    pub fn otp_write(&mut self, addr: u32, data: &'a [u8]) -> Result<(), RequestError> {
        let (addr, len) = self.translate(addr, data.len())?;
        self.check_window(addr, len)?;
        self.submit(JobKind::OtpWrite, addr, len, JobData::Source(data))
    }

    /// Hand back the buffer of a settled read job
    ///
    /// Returns `None` while a job is active or when the last job had no
    /// destination buffer.
    pub fn take_buffer(&mut self) -> Option<&'a mut [u8]> {
        if self.job != JobKind::Idle {
            return None;
        }
        match core::mem::take(&mut self.data) {
            JobData::Sink(buf) => Some(buf),
            other => {
                self.data = other;
                None
            }
        }
    }

    // ========================================================================
    // Job processing
    // ========================================================================

    /// Advance the active job by at most one chunk
    pub fn main_function(&mut self) {
        if !self.lock.try_acquire() {
            return;
        }
        self.step();
        self.lock.release();
    }

    fn step_context(&self) -> StepContext {
        let mode = self.mode.index();
        StepContext {
            current: self.current,
            end: self.end,
            page_size: self.page_size,
            sector_size: self.sector_size,
            read_at_once: self.config.read_at_once[mode],
            write_at_once: self.config.write_at_once[mode],
            word_write_timeout_us: self.pal.word_write_timeout_us(),
            sector_erase_timeout_ms: self.pal.sector_erase_timeout_ms(),
        }
    }

    fn step(&mut self) {
        if self.job == JobKind::Idle {
            return;
        }
        let Some(ops) = job::ops::<R, C>(self.job) else {
            log::error!("No handler for job {:?}", self.job);
            self.status = MemIfStatus::Uninit;
            self.job_result = JobResult::Failed;
            return;
        };

        let ctx = self.step_context();
        let budget = (ops.timeout_us)(&ctx);
        let elapsed = budget.map(|_| self.pal.clock().elapsed_us(self.start_time));

        self.last_return = self.pal.is_busy();
        match self.last_return {
            Ok(DeviceState::Ready) => match (ops.chunk)(&ctx) {
                Some(0) => {
                    log::error!("{:?} stalled: zero-length chunk", self.job);
                    self.last_return = Err(PalError::Parameter);
                    self.finish();
                }
                Some(len) => {
                    log::trace!("{:?} chunk 0x{:08X}+0x{:X}", self.job, self.current, len);
                    let chunk = self.data.chunk(self.offset, len as usize);
                    let res = (ops.work)(&mut self.pal, self.current, len, chunk);
                    self.start_time = self.pal.clock().now_us();
                    self.current += len;
                    self.offset += len as usize;
                    if let Err(err) = res {
                        self.last_return = Err(err);
                        self.finish();
                    }
                }
                None => self.finish(),
            },
            Ok(DeviceState::Busy) => {
                if let (Some(budget), Some(elapsed)) = (budget, elapsed) {
                    if elapsed > budget {
                        log::warn!(
                            "{:?} timed out at 0x{:08X} after {} us",
                            self.job,
                            self.current,
                            elapsed
                        );
                        self.last_return = Err(PalError::Timeout);
                        self.finish();
                    }
                }
            }
            Err(_) => self.finish(),
        }
    }

    fn finish(&mut self) {
        let kind = self.job;
        self.status = MemIfStatus::Idle;
        self.job = JobKind::Idle;
        self.job_result = JobResult::from_pal(&self.last_return);

        match self.last_return {
            Ok(_) => {
                log::debug!("{:?} finished", kind);
                self.notify.job_end();
            }
            Err(err) => {
                log::error!("{:?} failed at 0x{:08X}: {}", kind, self.current, err);
                self.notify.job_error();
            }
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Abort the active job
    ///
    /// Waits for a running device cycle to end. Does nothing if the driver
    /// lock is held elsewhere. No notification fires. An uninitialised
    /// driver stays uninitialised.
    pub fn cancel(&mut self) {
        if !self.lock.try_acquire() {
            return;
        }
        while let Ok(DeviceState::Busy) = self.pal.is_busy() {}

        if self.job != JobKind::Idle {
            log::debug!("{:?} canceled at 0x{:08X}", self.job, self.current);
        }
        self.job_result = JobResult::Canceled;
        self.job = JobKind::Idle;
        self.settle_status();
        self.lock.release();
    }

    fn settle_status(&mut self) {
        if self.status == MemIfStatus::Busy {
            self.status = MemIfStatus::Idle;
        }
    }

    /// Recover the driver after its lock holder died
    ///
    /// Waits for the device for at most one worst-case page program time,
    /// then force-releases the lock. A pending job becomes canceled.
    /// Returns the last busy status read.
    pub fn emergency_unlock(&mut self) -> PalResult<DeviceState> {
        let start = self.pal.clock().now_us();
        let mut state = self.pal.is_busy();
        while matches!(state, Ok(DeviceState::Busy))
            && self.pal.clock().elapsed_us(start) < MAX_TPP_US
        {
            state = self.pal.is_busy();
        }

        self.lock.release();
        if self.job_result == JobResult::Pending {
            self.job_result = JobResult::Canceled;
        }
        self.job = JobKind::Idle;
        self.settle_status();
        log::warn!("Emergency unlock, device state {:?}", state);
        state
    }

    /// Select the chunk sizes of the next steps
    pub fn set_mode(&mut self, mode: MemIfMode) {
        self.mode = mode;
    }

    /// Change the erase sector size
    ///
    /// The driver must be idle and unlocked.
    pub fn set_sector_size(&mut self, sector_size: u32) -> PalResult<()> {
        if !self.lock.try_acquire() {
            return Err(PalError::Busy);
        }
        let res = if self.status == MemIfStatus::Idle {
            self.pal.set_sector_size(sector_size)
        } else {
            Err(PalError::Busy)
        };
        if res.is_ok() {
            self.sector_size = sector_size;
        }
        self.lock.release();
        res
    }

    /// Permanently lock the OTP area
    ///
    /// Synchronous; the driver must be idle and unlocked.
    pub fn lock_otp(&mut self) -> PalResult<()> {
        if !self.lock.try_acquire() {
            return Err(PalError::Busy);
        }
        let res = if self.status == MemIfStatus::Idle {
            self.pal.lock_otp()
        } else {
            Err(PalError::Busy)
        };
        self.lock.release();
        res
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Driver status
    pub fn status(&self) -> MemIfStatus {
        self.status
    }

    /// Result of the last job
    pub fn job_result(&self) -> JobResult {
        self.job_result
    }

    /// Active job
    pub fn job(&self) -> JobKind {
        self.job
    }

    /// Protocol result of the last PAL call
    pub fn last_return(&self) -> PalResult<DeviceState> {
        self.last_return
    }

    /// Current mode
    pub fn mode(&self) -> MemIfMode {
        self.mode
    }

    /// Configuration latched at init
    pub fn config(&self) -> &FlsConfig {
        &self.config
    }

    /// Erase sector size
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Program page size
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Bytes of the active job not yet handed to the PAL
    pub fn remaining(&self) -> u32 {
        if self.job == JobKind::Idle {
            0
        } else {
            self.end.saturating_sub(self.current)
        }
    }

    /// Driver lock, for contexts that need to observe or contend for it
    pub fn lock(&self) -> &TryLock {
        &self.lock
    }

    /// Protocol driver
    pub fn pal(&self) -> &Pal<R, C> {
        &self.pal
    }

    /// Mutable protocol driver
    pub fn pal_mut(&mut self) -> &mut Pal<R, C> {
        &mut self.pal
    }

    /// Notification receiver
    pub fn notifier(&self) -> &N {
        &self.notify
    }

    /// Driver name and version
    pub fn version_info() -> VersionInfo {
        VersionInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
