//! Read command implementation

use super::{run_job, CliError, Target};
use std::fs;
use std::path::Path;

/// Run the read command
pub fn run_read(
    target: &Target,
    output: &Path,
    start: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let device_size = target.device.size as u32;
    let len = length.unwrap_or_else(|| device_size.saturating_sub(start));
    if start.checked_add(len).map_or(true, |end| end > device_size) {
        return Err(CliError::TooLarge {
            what: "read",
            start,
            len: len as usize,
        }
        .into());
    }

    let mut data = vec![0u8; len as usize];
    {
        let mut fls = target.open()?;
        fls.read(start, &mut data)?;
        run_job(&mut fls, "Reading")?;
    }

    fs::write(output, &data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}
