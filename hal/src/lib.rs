//! # Ember Hardware Abstraction Layer
//!
//! Early-boot hardware support for the Ember kernel.
//!
//! The HAL currently covers one job: building the flat-model Global
//! Descriptor Table for 32-bit protected mode and pointing the CPU at it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ember_hal::arch::x86::segmentation;
//!
//! // On the boot CPU, before interrupts are enabled:
//! let gdtr = unsafe { segmentation::init() }?;
//! log::info!("GDT at {:#x}", gdtr.base());
//! ```
//!
//! Code that wants to run the table builder without real hardware passes its
//! own [`SegmentLoader`] to [`KernelGdt::install`].

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod arch;
pub mod error;

pub use arch::x86::segmentation::{
    KernelGdt, SegmentDescriptor, SegmentLoader, TableRegister, KERNEL_GDT,
};
pub use error::{HalError, HalResult};

/// HAL version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
