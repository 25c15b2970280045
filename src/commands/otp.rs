//! OTP commands

use super::{run_job, CliError, Target};

/// Dump OTP bytes as hex
pub fn run_otp_read(
    target: &Target,
    start: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = vec![0u8; length as usize];
    let mut fls = target.open()?;
    fls.otp_read(start, &mut buf)?;
    run_job(&mut fls, "Reading OTP")?;
    let data = fls
        .take_buffer()
        .ok_or("OTP read did not return its buffer")?;

    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:08X}: {}", start as usize + i * 16, hex.join(" "));
    }
    Ok(())
}

/// Program OTP bytes
pub fn run_otp_write(
    target: &Target,
    start: u32,
    data: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut fls = target.open()?;
    fls.otp_write(start, data)?;
    run_job(&mut fls, "Writing OTP")?;
    println!("Programmed {} OTP bytes at 0x{:08X}", data.len(), start);
    Ok(())
}

/// Permanently lock the OTP area
pub fn run_otp_lock(target: &Target, confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err("OTP lock is irreversible, pass --yes to confirm".into());
    }
    let mut fls = target.open()?;
    fls.lock_otp().map_err(CliError::from)?;
    println!("OTP area locked");
    Ok(())
}
