//! # Boot Errors
//!
//! Failures the early boot sequence can still report. Once the descriptor
//! table is active, the only errors left are the ones found by read-back.

use core::fmt;

use ember_hal::{HalError, TableRegister};

/// Result type for boot operations
pub type BootResult<T> = Result<T, BootError>;

/// Early boot errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The boot sequence already ran to completion
    AlreadyBooted,
    /// The early console did not come up
    ConsoleUnavailable,
    /// Another logger was registered before ours
    Logger,
    /// The segmentation layer refused the request
    Hal(HalError),
    /// GDTR read back from the CPU differs from the installed image
    GdtMismatch {
        /// Image handed to the loader
        expected: TableRegister,
        /// Image the CPU reports
        found: TableRegister,
    },
}

impl BootError {
    /// Whether boot can continue past this error
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConsoleUnavailable)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBooted => write!(f, "boot sequence already executed"),
            Self::ConsoleUnavailable => write!(f, "early console unavailable"),
            Self::Logger => write!(f, "a different logger is already registered"),
            Self::Hal(e) => write!(f, "HAL error: {e}"),
            Self::GdtMismatch { expected, found } => write!(
                f,
                "GDTR mismatch: expected {:#x}/{}, found {:#x}/{}",
                expected.base(),
                expected.limit(),
                found.base(),
                found.limit()
            ),
        }
    }
}

impl From<HalError> for BootError {
    fn from(e: HalError) -> Self {
        Self::Hal(e)
    }
}
