//! # HAL Error Types
//!
//! Errors the segmentation layer can report before the CPU is touched.
//! Anything that goes wrong after `lgdt` is a processor fault, not a value.

use core::fmt;

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;

/// HAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The kernel descriptor table has already been installed
    AlreadyInstalled,
    /// A segment limit does not fit the 20-bit descriptor field
    LimitOutOfRange {
        /// The rejected limit
        limit: u32,
    },
    /// Descriptor flags overlap the limit nibble of the granularity byte
    InvalidFlags {
        /// The rejected raw flags byte
        flags: u8,
    },
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "descriptor table already installed"),
            Self::LimitOutOfRange { limit } => {
                write!(f, "segment limit {limit:#x} exceeds 20 bits")
            },
            Self::InvalidFlags { flags } => {
                write!(f, "descriptor flags {flags:#04x} overlap the limit nibble")
            },
        }
    }
}
