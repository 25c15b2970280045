//! rpcflash - QSPI NOR flash driver for the RPC controller
//!
//! Drives the non-blocking `Fls` flash driver from the command line. The
//! controller and the flash device are emulated by `rpcflash-sim`, with an
//! optional backing image so that writes survive between invocations.
//!
//! Each command brings the driver up from scratch: vendor detection, setup
//! sequence and DDR calibration run every time, exactly as they would after
//! a reset on real hardware.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ModeArg, OtpCommands, VendorArg};
use commands::Target;
use rpcflash_core::{FlsConfig, MemIfMode};
use rpcflash_sim::SimConfig;
use std::path::{Path, PathBuf};

/// Configuration file picked up from the working directory
const DEFAULT_CONFIG: &str = "rpcflash.ron";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load driver configuration: {}", e);
            std::process::exit(1);
        }
    };

    let target = Target {
        config,
        device: sim_config(cli.vendor),
        mode: cli.mode.map(|mode| match mode {
            ModeArg::Slow => MemIfMode::Slow,
            ModeArg::Fast => MemIfMode::Fast,
        }),
        image: cli.image,
    };

    match cli.command {
        Commands::Info => commands::run_info(&target),
        Commands::Read {
            output,
            start,
            length,
        } => commands::run_read(&target, &output, start, length),
        Commands::Write {
            input,
            start,
            no_verify,
            no_erase,
        } => commands::run_write(&target, &input, start, no_erase, no_verify),
        Commands::Erase {
            start,
            length,
            small,
        } => commands::run_erase(&target, start, length, small),
        Commands::Verify { input, start } => commands::run_verify(&target, &input, start),
        Commands::BlankCheck { start, length } => {
            commands::run_blank_check(&target, start, length)
        }
        Commands::Otp(otp_cmd) => match otp_cmd {
            OtpCommands::Read { start, length } => commands::run_otp_read(&target, start, length),
            OtpCommands::Write { start, data } => {
                commands::run_otp_write(&target, start, data.as_ref())
            }
            OtpCommands::Lock { yes } => commands::run_otp_lock(&target, yes),
        },
    }
}

/// Emulated device for a vendor choice
fn sim_config(vendor: VendorArg) -> SimConfig {
    match vendor {
        VendorArg::Micron => SimConfig::micron(),
        VendorArg::Macronix => SimConfig::macronix(),
        VendorArg::Cypress => SimConfig::cypress(),
    }
}

/// Load the driver configuration from the given file or the default location
fn load_config(path: Option<&Path>) -> Result<FlsConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let config = FlsConfig::load(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG);
    if default_path.is_file() {
        let config = FlsConfig::load(&default_path)?;
        log::debug!("Loaded configuration from {}", default_path.display());
        Ok(config)
    } else {
        log::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG);
        Ok(FlsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config = FlsConfig::from_ron_str(include_str!("../rpcflash.ron")).unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.write_window_size, 8 * 1024 * 1024);
    }

    #[test]
    fn test_sim_config_per_vendor() {
        assert_eq!(sim_config(VendorArg::Macronix).manufacturer_id, 0xC2);
        assert_eq!(sim_config(VendorArg::Cypress).manufacturer_id, 0x01);
    }
}
