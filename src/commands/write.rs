//! Write command implementation
//!
//! A normal write is read-modify-write over whole sectors: the sectors
//! covering the input are read back, the input is merged in, then the span
//! is erased, programmed and compared. With `--no-erase` the input is only
//! padded to the program granularity with 0xFF, which leaves flash bits
//! untouched.

use super::{read_file, run_job, sector_span, CliError, SimFls, Target};
use rpcflash_core::pal::PROGRAM_ALIGN;
use std::path::Path;

/// Run the write command
pub fn run_write(
    target: &Target,
    input: &Path,
    start: u32,
    no_erase: bool,
    no_verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_file(input)?;
    let len = u32::try_from(data.len()).ok();
    let fits = len
        .and_then(|len| start.checked_add(len))
        .is_some_and(|end| end as usize <= target.device.size);
    if !fits {
        return Err(CliError::TooLarge {
            what: "input",
            start,
            len: data.len(),
        }
        .into());
    }
    if data.is_empty() {
        println!("Nothing to write");
        return Ok(());
    }

    if no_erase {
        write_in_place(target, &data, start, no_verify)
    } else {
        write_sectors(target, &data, start, no_verify)
    }
}

fn write_sectors(
    target: &Target,
    data: &[u8],
    start: u32,
    no_verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut merged = Vec::new();
    let mut fls = target.open()?;
    let (first, span) =
        sector_span(start, data.len() as u32, fls.sector_size()).ok_or(CliError::TooLarge {
            what: "input",
            start,
            len: data.len(),
        })?;
    log::debug!("Sector span 0x{:08X}+0x{:X}", first, span);

    merged.resize(span as usize, 0);
    fls.read(first, &mut merged)?;
    run_job(&mut fls, "Reading")?;
    let image = fls
        .take_buffer()
        .ok_or("read job did not return its buffer")?;
    let at = (start - first) as usize;
    image[at..at + data.len()].copy_from_slice(data);
    let image: &[u8] = image;

    fls.erase(first, span)?;
    run_job(&mut fls, "Erasing")?;
    program(&mut fls, first, image, no_verify)?;
    target.save(&fls)?;

    println!("Wrote {} bytes at 0x{:08X}", data.len(), start);
    Ok(())
}

fn write_in_place(
    target: &Target,
    data: &[u8],
    start: u32,
    no_verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if start % PROGRAM_ALIGN != 0 {
        return Err(format!(
            "--no-erase needs a start address aligned to {} bytes",
            PROGRAM_ALIGN
        )
        .into());
    }
    let mut padded = data.to_vec();
    padded.resize(data.len().next_multiple_of(PROGRAM_ALIGN as usize), 0xFF);

    let mut fls = target.open()?;
    program(&mut fls, start, &padded, no_verify)?;
    target.save(&fls)?;

    println!("Wrote {} bytes at 0x{:08X} without erase", data.len(), start);
    Ok(())
}

fn program<'a>(
    fls: &mut SimFls<'a>,
    addr: u32,
    data: &'a [u8],
    no_verify: bool,
) -> Result<(), CliError> {
    fls.write(addr, data)?;
    run_job(fls, "Writing")?;
    if !no_verify {
        fls.compare(addr, data)?;
        run_job(fls, "Verifying")?;
        println!("Verification passed");
    }
    Ok(())
}
