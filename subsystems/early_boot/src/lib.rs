//! # Ember Early Boot Sequence
//!
//! First Rust code to run after the loader hands over in 32-bit protected
//! mode. It brings up a serial console, routes `log` output to it, installs
//! the flat kernel GDT and jumps to the kernel.
//!
//! ## Boot Stages
//!
//! | Stage | Name         | Description                                   |
//! |-------|--------------|-----------------------------------------------|
//! | 1     | Console      | Program the UART, check it answers            |
//! | 2     | Logger       | Register [`logger::EarlyLogger`] with `log`   |
//! | 3     | Segmentation | Build, load and (optionally) verify the GDT   |
//! | 4     | Handoff      | Jump to `kernel_main`                         |
//!
//! ## Usage
//!
//! ```rust,ignore
//! extern "C" fn kernel_main() -> ! {
//!     loop {}
//! }
//!
//! // From the assembly stub, with a stack set up and interrupts disabled:
//! unsafe { ember_early_boot::ember_early_boot(kernel_main) }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

use bitflags::bitflags;
use log::LevelFilter;
use spin::{Mutex, RwLock};

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Early drivers
pub mod drivers;

/// Error handling
pub mod error;

/// `log` backend
pub mod logger;

/// Boot stages and sequencing
pub mod stages;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use crate::drivers::{ConsoleBackend, ConsoleWriter, SerialConsole};
pub use crate::error::{BootError, BootResult};
pub use crate::logger::EarlyLogger;
pub use crate::stages::{BootSequence, BootStage};

// =============================================================================
// GLOBAL STATE
// =============================================================================

/// Boot status, written once by the boot sequence
static BOOT_STATUS: Mutex<BootStatus> = Mutex::new(BootStatus::empty());

/// Boot configuration - read-mostly, write rarely
static BOOT_CONFIG: RwLock<BootConfig> = RwLock::new(BootConfig::new());

// =============================================================================
// BOOT CONFIGURATION
// =============================================================================

/// Boot configuration options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    /// Serial port configuration
    pub serial: SerialConfig,

    /// Maximum level passed to the early logger
    pub log_level: LevelFilter,

    /// Log every GDT entry after install
    pub dump_gdt: bool,

    /// Read GDTR back after install and compare it with the image
    pub verify_gdt: bool,
}

impl BootConfig {
    /// Create a new default configuration
    pub const fn new() -> Self {
        Self {
            serial: SerialConfig::default_com1(),
            log_level: LevelFilter::Info,
            dump_gdt: false,
            verify_gdt: true,
        }
    }

    /// Create configuration for QEMU testing
    pub const fn qemu() -> Self {
        Self {
            serial: SerialConfig::default_com1(),
            log_level: LevelFilter::Debug,
            dump_gdt: true,
            verify_gdt: true,
        }
    }

    /// Create minimal configuration for fast boot
    pub const fn minimal() -> Self {
        Self {
            serial: SerialConfig::default_com1(),
            log_level: LevelFilter::Warn,
            dump_gdt: false,
            verify_gdt: false,
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Serial port configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// I/O port base
    pub port: u16,
    /// Baud rate
    pub baud_rate: u32,
}

impl SerialConfig {
    /// UART input clock divided by 16
    pub const BASE_BAUD: u32 = 115_200;

    /// Default COM1 configuration
    pub const fn default_com1() -> Self {
        Self {
            port: 0x3F8,
            baud_rate: Self::BASE_BAUD,
        }
    }

    /// Divisor latch value for `baud_rate`, never zero
    pub const fn divisor(&self) -> u16 {
        if self.baud_rate == 0 || self.baud_rate >= Self::BASE_BAUD {
            return 1;
        }
        let divisor = Self::BASE_BAUD / self.baud_rate;
        if divisor > u16::MAX as u32 {
            u16::MAX
        } else {
            divisor as u16
        }
    }
}

/// Replace the process-wide configuration
pub fn configure(config: BootConfig) {
    *BOOT_CONFIG.write() = config;
}

/// Current process-wide configuration
pub fn config() -> BootConfig {
    *BOOT_CONFIG.read()
}

// =============================================================================
// BOOT FLAGS
// =============================================================================

bitflags! {
    /// Boot status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BootStatus: u32 {
        /// Early console online
        const CONSOLE = 1 << 0;
        /// Logger registered
        const LOGGER = 1 << 1;
        /// GDT installed and segment registers reloaded
        const SEGMENTATION = 1 << 2;
        /// Handoff complete
        const HANDOFF = 1 << 7;
        /// Error occurred
        const ERROR = 1 << 31;
    }
}

/// Get boot status flags
pub fn boot_status() -> BootStatus {
    *BOOT_STATUS.lock()
}

pub(crate) fn publish_status(status: BootStatus) {
    *BOOT_STATUS.lock() = status;
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

#[cfg(target_arch = "x86")]
static SERIAL: spin::Once<SerialConsole> = spin::Once::new();

/// Main early boot entry point
///
/// # Safety
///
/// Must be called exactly once, on the boot CPU, in 32-bit protected mode
/// with a valid stack and interrupts disabled.
#[cfg(target_arch = "x86")]
#[no_mangle]
pub unsafe extern "C" fn ember_early_boot(kernel_main: extern "C" fn() -> !) -> ! {
    let config = config();
    let console: &'static SerialConsole =
        SERIAL.call_once(|| unsafe { SerialConsole::new(config.serial) });

    let mut loader = ember_hal::arch::x86::segmentation::ProtectedModeLoader;
    let mut sequence = BootSequence::new(config);

    match unsafe { sequence.execute(&ember_hal::KERNEL_GDT, &mut loader, console) } {
        Ok(_) => kernel_main(),
        Err(e) => boot_panic(console, &e, sequence.stage()),
    }
}

/// Report a fatal boot error and stop
#[cfg(target_arch = "x86")]
fn boot_panic(console: &dyn ConsoleBackend, error: &BootError, stage: BootStage) -> ! {
    use core::fmt::Write;

    let mut out = ConsoleWriter::new(console);
    let _ = writeln!(out, "\n!!! BOOT PANIC !!!");
    let _ = writeln!(out, "Error: {}", error);
    let _ = writeln!(out, "Stage: {}", stage.name());

    halt_forever()
}

/// Disable interrupts and halt
#[cfg(target_arch = "x86")]
pub fn halt_forever() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli; hlt", options(nomem, nostack));
        }
    }
}

// =============================================================================
// VERSION INFORMATION
// =============================================================================

/// Early boot subsystem version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
