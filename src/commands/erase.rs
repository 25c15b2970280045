//! Erase command implementation

use super::{run_job, Target};

/// Run the erase command
///
/// Without a length, erases from `start` to the end of the write window.
pub fn run_erase(
    target: &Target,
    start: u32,
    length: Option<u32>,
    small: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = &target.config;
    let len = length.unwrap_or_else(|| {
        let window_end = config.write_window_start + config.write_window_size;
        window_end.saturating_sub(start.saturating_add(config.nvm_offset))
    });

    let mut fls = target.open()?;
    if small {
        fls.erase_4k(start, len)?;
    } else {
        fls.erase(start, len)?;
    }
    run_job(&mut fls, "Erasing")?;
    target.save(&fls)?;

    println!("Erased {} bytes starting at 0x{:08X}", len, start);
    Ok(())
}
