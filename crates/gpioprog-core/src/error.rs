//! Error types for gpioprog-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Bus level faults never show up here: the transport
//! has no failure path and flash operations retry until they succeed.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Reading the input image failed
    Io,
    /// A sector still failed read-back verification after the configured
    /// number of attempts (only possible with a bounded retry policy)
    VerifyFailed {
        /// Start address of the sector that could not be written
        addr: u32,
    },
    /// The image would run past the end of the 24-bit address space
    AddressOutOfBounds,
    /// A configuration value is unusable (duplicate pin, misaligned offset, ...)
    InvalidConfig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "failed to read input image"),
            Self::VerifyFailed { addr } => {
                write!(f, "read-back verify failed for sector at 0x{:06X}", addr)
            }
            Self::AddressOutOfBounds => write!(f, "image does not fit below 16 MiB"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
