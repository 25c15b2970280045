//! Serial NOR flash (SDF) device knowledge
//!
//! Opcodes, status register bits and the per-vendor capability table. No
//! controller access happens here.

pub mod opcodes;
mod vendor;

pub use opcodes::StatusReg;
pub use vendor::{OtpAccess, OtpLock, SetupStep, Vendor, VendorCaps, MAX_TPP_US, VENDOR_TABLE};
