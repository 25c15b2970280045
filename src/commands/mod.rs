//! CLI command implementations
//!
//! Every command opens a [`Target`]: an emulated RPC controller with a NOR
//! device behind it, and the flash driver on top. Commands submit jobs to
//! the driver and poll `main_function` until the job settles, showing a
//! progress bar while they wait.

mod erase;
mod info;
mod otp;
mod read;
mod verify;
mod write;

pub use erase::run_erase;
pub use info::run_info;
pub use otp::{run_otp_lock, run_otp_read, run_otp_write};
pub use read::run_read;
pub use verify::{run_blank_check, run_verify};
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};
use rpcflash_core::{
    Fls, FlsConfig, JobKind, JobNotification, JobResult, MemIfMode, MemIfStatus, PalError,
    RequestError,
};
use rpcflash_sim::{sim_pal, SimClock, SimConfig, SimRpc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Simulated time per clock reading, in microseconds
const CLOCK_STEP_US: u32 = 10;

/// Driver over the emulated controller
pub type SimFls<'a> = Fls<'a, SimRpc, SimClock, JobLog>;

/// Errors reported by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// The driver refused a request
    #[error("request refused: {0}")]
    Request(#[from] RequestError),
    /// Driver initialisation failed
    #[error("driver initialisation failed: {0}")]
    Init(PalError),
    /// A job finished with an error
    #[error("{job:?} failed: {error}")]
    Job { job: JobKind, error: PalError },
    /// A job was canceled before it finished
    #[error("{0:?} canceled")]
    Canceled(JobKind),
    /// A synchronous driver call failed
    #[error(transparent)]
    Pal(#[from] PalError),
    /// Image or input file larger than the flash
    #[error("{what} of {len} bytes does not fit at 0x{start:08X}")]
    TooLarge {
        what: &'static str,
        start: u32,
        len: usize,
    },
    /// Progress bar template rejected
    #[error(transparent)]
    Template(#[from] indicatif::style::TemplateError),
    /// Image file I/O
    #[error("image {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Job completion counter
///
/// Logs each completion and keeps counts, so commands can cross-check that
/// the notification fired for every job they ran.
#[derive(Debug, Default)]
pub struct JobLog {
    pub ended: u32,
    pub failed: u32,
}

impl JobNotification for JobLog {
    fn job_end(&mut self) {
        self.ended += 1;
        log::debug!("job end notification #{}", self.ended);
    }

    fn job_error(&mut self) {
        self.failed += 1;
        log::debug!("job error notification #{}", self.failed);
    }
}

/// Everything needed to bring up a driver
#[derive(Debug, Clone)]
pub struct Target {
    /// Driver configuration
    pub config: FlsConfig,
    /// Emulated device personality
    pub device: SimConfig,
    /// Chunking mode overriding the configured init mode
    pub mode: Option<MemIfMode>,
    /// Backing file for the flash array
    pub image: Option<PathBuf>,
}

impl Target {
    /// Build the emulated hardware and initialise the driver on it
    pub fn open<'a>(&self) -> Result<SimFls<'a>, CliError> {
        let clock = SimClock::with_step(CLOCK_STEP_US);
        let mut pal = sim_pal(self.device.clone(), clock);

        if let Some(path) = &self.image {
            if path.exists() {
                let bytes = fs::read(path).map_err(|source| CliError::Image {
                    path: path.clone(),
                    source,
                })?;
                if bytes.len() > self.device.size {
                    return Err(CliError::TooLarge {
                        what: "image",
                        start: 0,
                        len: bytes.len(),
                    });
                }
                pal.regs_mut().device_mut().fill(0, &bytes);
                log::info!("Loaded {} bytes from {:?}", bytes.len(), path);
            }
        }

        let mut fls = Fls::new(pal, JobLog::default());
        fls.init(&self.config).map_err(CliError::Init)?;
        if fls.status() != MemIfStatus::Idle {
            return Err(CliError::Init(PalError::NotSupported));
        }
        if let Some(mode) = self.mode {
            fls.set_mode(mode);
        }
        Ok(fls)
    }

    /// Write the flash array back to the backing file, if there is one
    pub fn save(&self, fls: &SimFls<'_>) -> Result<(), CliError> {
        let Some(path) = &self.image else {
            return Ok(());
        };
        let data = fls.pal().regs().device().data();
        fs::write(path, data).map_err(|source| CliError::Image {
            path: path.clone(),
            source,
        })?;
        log::info!("Saved {} bytes to {:?}", data.len(), path);
        Ok(())
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(total: u64, phase: &str) -> Result<ProgressBar, CliError> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Poll the submitted job until it settles
///
/// Returns the PAL error of a failed job.
pub fn run_job(fls: &mut SimFls<'_>, phase: &str) -> Result<(), CliError> {
    let job = fls.job();
    let total = fls.remaining() as u64;
    let pb = create_progress_bar_with_phase(total, phase)?;

    while fls.job_result() == JobResult::Pending {
        fls.main_function();
        pb.set_position(total - fls.remaining() as u64);
    }

    match fls.job_result() {
        JobResult::Ok => {
            pb.finish_with_message(format!("{} complete", phase));
            Ok(())
        }
        JobResult::Canceled => {
            pb.abandon();
            Err(CliError::Canceled(job))
        }
        JobResult::Failed | JobResult::Pending => {
            pb.abandon();
            let error = match fls.last_return() {
                Err(err) => err,
                Ok(_) => PalError::NotSupported,
            };
            Err(CliError::Job { job, error })
        }
    }
}

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Sector-aligned range covering `start..start + len`
///
/// `None` when the aligned range does not fit the address space.
fn sector_span(start: u32, len: u32, sector: u32) -> Option<(u32, u32)> {
    if sector == 0 {
        return Some((start, len));
    }
    let first = start - start % sector;
    let end = start.checked_add(len)?;
    let last = end.div_ceil(sector).checked_mul(sector)?;
    Some((first, last - first))
}
