//! Error types for rpcflash-core
//!
//! The protocol driver and the job state machine speak different
//! vocabularies. [`PalError`] is what a single PAL transaction reports,
//! [`JobResult`] is what a caller of the state machine observes once a job
//! settles. [`JobResult::from_pal`] is the only place one becomes the other.
//!
//! [`RequestError`] covers requests that are refused synchronously, before
//! any job state is touched.

use thiserror::Error;

/// Protocol-layer error reported by the PAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PalError {
    /// Device still reported write-in-progress when it had to be ready
    #[error("flash device busy")]
    Busy,
    /// Invalid argument (unsupported clock, OTP length out of range)
    #[error("invalid parameter")]
    Parameter,
    /// Controller transfer or device cycle did not finish in time
    #[error("operation timed out")]
    Timeout,
    /// Erase failed or blank check found programmed bytes
    #[error("erase error")]
    Erase,
    /// Program operation failed
    #[error("write error")]
    Write,
    /// Flash contents differ from the reference buffer
    #[error("verify failed: data mismatch")]
    Verify,
    /// Address or length violates an alignment or boundary rule
    #[error("invalid alignment")]
    Align,
    /// Access outside the device or transfer larger than allowed
    #[error("invalid size")]
    Size,
    /// Vendor or mode without support for the requested operation
    #[error("operation not supported by this device")]
    NotSupported,
}

/// Result type for PAL operations
pub type PalResult<T> = core::result::Result<T, PalError>;

/// Outcome of the last job as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobResult {
    /// Last job finished successfully
    #[default]
    Ok,
    /// A job is accepted and still running
    Pending,
    /// Last job failed; `Fls::last_return` holds the protocol error
    Failed,
    /// Last job was aborted by `cancel` or `emergency_unlock`
    Canceled,
}

impl JobResult {
    /// Map a protocol result onto the caller-visible job result
    ///
    /// Any successful PAL result finishes a job with [`JobResult::Ok`];
    /// every protocol error, timeouts included, becomes
    /// [`JobResult::Failed`].
    pub fn from_pal<T>(res: &PalResult<T>) -> Self {
        match res {
            Ok(_) => JobResult::Ok,
            Err(_) => JobResult::Failed,
        }
    }
}

impl<T> From<PalResult<T>> for JobResult {
    fn from(res: PalResult<T>) -> Self {
        JobResult::from_pal(&res)
    }
}

/// Reason a request was refused at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Another context holds the driver lock
    #[error("driver locked by another context")]
    Locked,
    /// Driver is uninitialised or a job is already active
    #[error("driver not idle")]
    NotIdle,
    /// Range is outside the configured write window
    #[error("range 0x{addr:08X}+0x{len:X} outside the write window")]
    OutOfWindow {
        /// Physical start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// Range is not aligned to the sector size
    #[error("range 0x{addr:08X}+0x{len:X} not sector aligned")]
    Misaligned {
        /// Physical start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// Address plus offset or length does not fit 32-bit addressing
    #[error("address range overflows 32-bit addressing")]
    AddressOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pal_result_maps_to_job_result() {
        assert_eq!(JobResult::from_pal(&Ok::<(), PalError>(())), JobResult::Ok);
        assert_eq!(
            JobResult::from_pal(&Err::<(), _>(PalError::Timeout)),
            JobResult::Failed
        );
        assert_eq!(JobResult::from(Err::<u8, _>(PalError::Verify)), JobResult::Failed);
    }

    #[test]
    fn test_error_display() {
        extern crate std;
        use std::string::ToString;

        let err = RequestError::OutOfWindow {
            addr: 0x0001_0000,
            len: 0x100,
        };
        assert_eq!(
            err.to_string(),
            "range 0x00010000+0x100 outside the write window"
        );
        assert_eq!(PalError::Align.to_string(), "invalid alignment");
    }
}
