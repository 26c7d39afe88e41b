//! # Early Drivers
//!
//! Devices the boot sequence needs before the kernel's own drivers exist.

pub mod console;

pub use console::{ConsoleBackend, ConsoleWriter, SerialConsole};
