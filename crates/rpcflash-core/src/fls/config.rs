//! Driver configuration
//!
//! [`FlsConfig`] is copied into the driver at init. With the `std` feature
//! it can also be loaded from a RON file:
//!
//! ```ron
//! (
//!     write_window_start: MiB(1),
//!     write_window_size: KiB(512),
//!     nvm_offset: B(0),
//!     init_mode: Fast,
//!     read_at_once: (slow: B(256), fast: KiB(4)),
//!     write_at_once: (slow: B(256), fast: B(256)),
//! )
//! ```

use thiserror::Error;

/// Throughput mode selecting the per-mode chunk sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
pub enum MemIfMode {
    /// Small chunks, short main function runtime
    Slow,
    /// Large chunks
    #[default]
    Fast,
}

impl MemIfMode {
    /// Index into the per-mode chunk tables
    pub const fn index(self) -> usize {
        match self {
            MemIfMode::Slow => 0,
            MemIfMode::Fast => 1,
        }
    }
}

/// Static driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlsConfig {
    /// First address of the writable region
    pub write_window_start: u32,
    /// Size of the writable region
    pub write_window_size: u32,
    /// Added to every request address
    pub nvm_offset: u32,
    /// Mode selected at init
    pub init_mode: MemIfMode,
    /// Read chunk per main function call, indexed by [`MemIfMode::index`]
    pub read_at_once: [u32; 2],
    /// Write chunk per main function call, indexed by [`MemIfMode::index`]
    pub write_at_once: [u32; 2],
}

impl Default for FlsConfig {
    fn default() -> Self {
        Self {
            write_window_start: 0,
            write_window_size: 8 * 1024 * 1024,
            nvm_offset: 0,
            init_mode: MemIfMode::Fast,
            read_at_once: [256, 4096],
            write_at_once: [256, 256],
        }
    }
}

/// Configuration rejected by [`FlsConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidConfig {
    /// A read or write chunk size is zero
    #[error("chunk sizes must be non-zero")]
    ZeroChunk,
    /// Write window end does not fit 32-bit addressing
    #[error("write window 0x{start:08X}+0x{size:X} overflows 32-bit addressing")]
    WindowOverflow {
        /// Window start
        start: u32,
        /// Window size
        size: u32,
    },
    /// A size in the configuration file does not fit 32 bits
    #[error("size does not fit 32 bits")]
    SizeOverflow,
}

impl FlsConfig {
    /// Check chunk sizes and the write window
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.read_at_once.contains(&0) || self.write_at_once.contains(&0) {
            return Err(InvalidConfig::ZeroChunk);
        }
        if self
            .write_window_start
            .checked_add(self.write_window_size)
            .is_none()
        {
            return Err(InvalidConfig::WindowOverflow {
                start: self.write_window_start,
                size: self.write_window_size,
            });
        }
        Ok(())
    }

    /// Whether `[addr, addr + len)` lies in the write window
    pub fn in_write_window(&self, addr: u32, len: u32) -> bool {
        let start = self.write_window_start as u64;
        let end = start + self.write_window_size as u64;
        addr as u64 >= start && addr as u64 + len as u64 <= end
    }
}

// ============================================================================
// RON loading
// ============================================================================

#[cfg(feature = "std")]
pub use self::file::{ConfigError, Size};

#[cfg(feature = "std")]
mod file {
    use super::{FlsConfig, InvalidConfig, MemIfMode};
    use std::path::Path;
    use thiserror::Error;

    /// Error loading a configuration file
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// I/O error reading the file
        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
        /// RON parsing error
        #[error("parse error: {0}")]
        Parse(#[from] ron::error::SpannedError),
        /// Parsed but inconsistent
        #[error("validation error: {0}")]
        Invalid(#[from] InvalidConfig),
    }

    /// Size with human-readable units
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
    pub enum Size {
        /// Bytes
        B(u32),
        /// Kibibytes
        KiB(u32),
        /// Mebibytes
        MiB(u32),
    }

    impl Size {
        /// Convert to bytes, `None` on overflow
        pub fn to_bytes(self) -> Option<u32> {
            match self {
                Size::B(n) => Some(n),
                Size::KiB(n) => n.checked_mul(1024),
                Size::MiB(n) => n.checked_mul(1024 * 1024),
            }
        }
    }

    #[derive(Debug, Clone, Copy, serde::Deserialize)]
    struct PerModeDef {
        slow: Size,
        fast: Size,
    }

    #[derive(Debug, Clone, Copy, serde::Deserialize)]
    struct FlsConfigDef {
        write_window_start: Size,
        write_window_size: Size,
        #[serde(default = "no_offset")]
        nvm_offset: Size,
        #[serde(default)]
        init_mode: MemIfMode,
        read_at_once: PerModeDef,
        write_at_once: PerModeDef,
    }

    fn no_offset() -> Size {
        Size::B(0)
    }

    fn bytes(size: Size) -> Result<u32, InvalidConfig> {
        size.to_bytes().ok_or(InvalidConfig::SizeOverflow)
    }

    impl FlsConfigDef {
        fn into_config(self) -> Result<FlsConfig, InvalidConfig> {
            let per_mode = |def: PerModeDef| -> Result<[u32; 2], InvalidConfig> {
                Ok([bytes(def.slow)?, bytes(def.fast)?])
            };
            let config = FlsConfig {
                write_window_start: bytes(self.write_window_start)?,
                write_window_size: bytes(self.write_window_size)?,
                nvm_offset: bytes(self.nvm_offset)?,
                init_mode: self.init_mode,
                read_at_once: per_mode(self.read_at_once)?,
                write_at_once: per_mode(self.write_at_once)?,
            };
            config.validate()?;
            Ok(config)
        }
    }

    impl FlsConfig {
        /// Parse and validate a RON configuration
        pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
            let def: FlsConfigDef = ron::from_str(content)?;
            Ok(def.into_config()?)
        }

        /// Load and validate a RON configuration file
        pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let content = std::fs::read_to_string(path.as_ref())?;
            let config = Self::from_ron_str(&content)?;
            log::debug!("Loaded config from {}", path.as_ref().display());
            Ok(config)
        }
    }
}
