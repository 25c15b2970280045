//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Raw bytes given on the command line as hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(Vec<u8>);

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parse a hex byte string such as "de ad be ef" or "0xdeadbeef"
fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let digits: String = s
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(format!("Expected an even number of hex digits, got {:?}", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex byte {:?}: {}", &digits[i..i + 2], e))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBytes)
}

/// Flash vendor personality of the emulated device
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VendorArg {
    /// Micron MT25Q (control byte OTP lock)
    #[default]
    Micron,
    /// Macronix MX25L (secured OTP area)
    Macronix,
    /// Cypress S25FL (no OTP support)
    Cypress,
}

/// Chunking profile for job steps
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Small chunks per step
    Slow,
    /// Large chunks per step
    Fast,
}

#[derive(Parser)]
#[command(name = "rpcflash")]
#[command(author, version, about = "QSPI NOR flash driver for the RPC controller", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Driver configuration file (RON format)
    /// Defaults to ./rpcflash.ron if present, built-in defaults otherwise
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Flash vendor to emulate
    #[arg(long, value_enum, default_value_t, global = true)]
    pub vendor: VendorArg,

    /// Backing image for the emulated flash array
    /// Loaded before the command runs, saved back after a write or erase.
    /// The OTP area is not part of the image.
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Job chunking mode (default: init_mode from the configuration)
    #[arg(long, value_enum, global = true)]
    pub mode: Option<ModeArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show detected device and driver information
    Info,

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (default: to the end of the device)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write file to flash
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Skip the compare pass after writing
        #[arg(long)]
        no_verify: bool,

        /// Don't erase before writing
        #[arg(long)]
        no_erase: bool,
    },

    /// Erase a flash range
    Erase {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Length of region to erase (default: the write window)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Use the 4 KiB erase command
        #[arg(long)]
        small: bool,
    },

    /// Verify flash contents against file
    Verify {
        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,
    },

    /// Check that a flash range is erased
    BlankCheck {
        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to check (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// OTP area operations
    #[command(subcommand)]
    Otp(OtpCommands),
}

/// OTP-related subcommands
#[derive(Subcommand)]
pub enum OtpCommands {
    /// Dump OTP bytes
    Read {
        /// OTP start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "16")]
        length: u32,
    },

    /// Program OTP bytes
    Write {
        /// OTP start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        start: u32,

        /// Bytes to program, as hex (e.g. "deadbeef")
        #[arg(long, value_parser = parse_hex_bytes)]
        data: HexBytes,
    },

    /// Permanently lock the OTP area
    Lock {
        /// Confirm the irreversible lock
        #[arg(long)]
        yes: bool,
    },
}
