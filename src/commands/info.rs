//! Info command implementation

use super::{SimFls, Target};

/// Print the detected device and the active driver configuration
pub fn run_info(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let fls = target.open()?;
    let pal = fls.pal();
    let version = SimFls::version_info();

    println!("Flash Device Information");
    println!("========================");
    println!();
    println!("Vendor:          {}", pal.vendor());
    if let Some(id) = pal.jedec_id() {
        println!("JEDEC ID:        {:02X} {:04X}", id.manufacturer, id.device);
    }
    let size = pal.device_size();
    println!(
        "Size:            {} bytes ({} KiB / {} MiB)",
        size,
        size / 1024,
        size / (1024 * 1024)
    );
    println!("Page size:       {} bytes", fls.page_size());
    println!("Sector size:     {} KiB", fls.sector_size() / 1024);
    println!("Read mode:       {:?}", pal.transfer_mode());
    println!("Page program:    {} us/word max", pal.word_write_timeout_us());
    println!("Sector erase:    {} ms max", pal.sector_erase_timeout_ms());

    let config = fls.config();
    println!();
    println!("Driver Configuration");
    println!("--------------------");
    println!(
        "Write window:    0x{:08X} - 0x{:08X}",
        config.write_window_start,
        u64::from(config.write_window_start) + u64::from(config.write_window_size)
    );
    println!("NVM offset:      0x{:08X}", config.nvm_offset);
    println!("Mode:            {:?}", fls.mode());
    println!(
        "Read at once:    {} / {} bytes (slow / fast)",
        config.read_at_once[0], config.read_at_once[1]
    );
    println!(
        "Write at once:   {} / {} bytes (slow / fast)",
        config.write_at_once[0], config.write_at_once[1]
    );
    println!();
    println!("Driver:          {} {}", version.name, version.version);

    Ok(())
}
