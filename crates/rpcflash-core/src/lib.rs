//! rpcflash-core - Flash driver for QSPI NOR behind the RPC controller
//!
//! This crate provides a non-blocking flash driver (`Fls`) for serial and
//! quad SPI NOR flash attached to the memory-mapped RPC (SPI Multi-I/O bus)
//! controller. It is `no_std` and never blocks in its request path: callers
//! submit a job, then poll [`Fls::main_function`] until the job result is
//! no longer pending.
//!
//! The crate is split in two layers:
//!
//! - [`pal`] - the protocol driver. It talks to the controller registers
//!   through a [`RegisterFile`], identifies the flash vendor, performs
//!   manual-mode commands and memory-mapped window reads.
//! - [`fls`] - the job state machine. It validates and latches requests,
//!   then advances them one bounded chunk per poll.
//!
//! # Features
//!
//! - `std` - Enable standard library support, RON config loading and
//!   `std::error::Error` for all error types
//!
//! # Example
//!
//! ```ignore
//! use rpcflash_core::{Fls, FlsConfig, JobResult, Pal};
//!
//! fn read_boot_block<R: RegisterFile, C: Clock>(pal: Pal<R, C>, buf: &mut [u8]) {
//!     let mut fls = Fls::new(pal, ());
//!     fls.init(&FlsConfig::default()).ok();
//!     if fls.read(0, buf).is_ok() {
//!         while fls.job_result() == JobResult::Pending {
//!             fls.main_function();
//!         }
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod fls;
pub mod pal;
pub mod rpc;
pub mod sdf;
pub mod time;

pub use error::{JobResult, PalError, PalResult, RequestError};
pub use fls::{Fls, FlsConfig, JobKind, JobNotification, MemIfMode, MemIfStatus, VersionInfo};
pub use pal::{DeviceState, Pal, TransferMode};
pub use rpc::RegisterFile;
pub use sdf::Vendor;
pub use time::Clock;
