//! Verify and blank check commands

use super::{read_file, run_job, CliError, Target};
use rpcflash_core::PalError;
use std::path::Path;

/// Compare flash contents at `start` with a file
pub fn run_verify(
    target: &Target,
    input: &Path,
    start: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_file(input)?;

    let mut fls = target.open()?;
    fls.compare(start, &data)?;
    match run_job(&mut fls, "Verifying") {
        Ok(()) => {
            println!("Verification passed");
            Ok(())
        }
        Err(CliError::Job {
            error: PalError::Verify,
            ..
        }) => Err(format!("Verification FAILED: flash differs from {:?}", input).into()),
        Err(e) => Err(e.into()),
    }
}

/// Check that a flash range reads as erased
pub fn run_blank_check(
    target: &Target,
    start: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut fls = target.open()?;
    fls.blank_check(start, length)?;
    match run_job(&mut fls, "Checking") {
        Ok(()) => {
            println!("0x{:08X}+0x{:X} is blank", start, length);
            Ok(())
        }
        Err(CliError::Job {
            error: PalError::Erase,
            ..
        }) => Err(format!("0x{:08X}+0x{:X} is NOT blank", start, length).into()),
        Err(e) => Err(e.into()),
    }
}
