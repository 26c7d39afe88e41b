//! # Early Logger
//!
//! `log` backend that writes to the early console. Every crate in the boot
//! path logs through the `log` macros; this is where those lines end up until
//! the kernel installs something better.
//!
//! Output format:
//!
//! ```text
//! [INFO ] ember_hal::arch::x86::segmentation::builder: GDT: 3 descriptors active (CS=0x0008, DS=0x0010)
//! ```

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::drivers::console::{ConsoleBackend, ConsoleWriter};
use crate::error::{BootError, BootResult};

/// The logger registered with `log`
static LOGGER: EarlyLogger = EarlyLogger::new();

/// Set once `log::set_logger` has accepted [`LOGGER`]
static REGISTERED: AtomicBool = AtomicBool::new(false);

struct LoggerState {
    console: Option<&'static dyn ConsoleBackend>,
    level: LevelFilter,
}

/// Console-backed `log` implementation
pub struct EarlyLogger {
    state: Mutex<LoggerState>,
}

impl EarlyLogger {
    /// A logger with no console attached
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(LoggerState {
                console: None,
                level: LevelFilter::Off,
            }),
        }
    }

    /// Send output to `console` for records at or above `level`
    pub fn attach(&self, console: &'static dyn ConsoleBackend, level: LevelFilter) {
        let mut state = self.state.lock();
        state.console = Some(console);
        state.level = level;
    }

    /// Stop writing output
    pub fn detach(&self) {
        self.state.lock().console = None;
    }

    /// Current level filter
    pub fn level(&self) -> LevelFilter {
        self.state.lock().level
    }
}

impl Default for EarlyLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EarlyLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EarlyLogger")
            .field("console", &state.console.map(|c| c.name()))
            .field("level", &state.level)
            .finish()
    }
}

impl Log for EarlyLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.state.lock().level
    }

    fn log(&self, record: &Record<'_>) {
        let state = self.state.lock();
        if record.level() > state.level {
            return;
        }
        if let Some(console) = state.console {
            let mut writer = ConsoleWriter::new(console);
            let _ = write_record(&mut writer, record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Format one log line
pub fn write_record<W: Write>(
    out: &mut W,
    level: Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> fmt::Result {
    writeln!(out, "[{:<5}] {}: {}", level, target, args)
}

/// Route `log` output to `console`.
///
/// Safe to call again later, e.g. to switch consoles or change the level;
/// only the first call registers with `log`.
pub fn init(console: &'static dyn ConsoleBackend, level: LevelFilter) -> BootResult<()> {
    LOGGER.attach(console, level);

    if !REGISTERED.swap(true, Ordering::AcqRel) && log::set_logger(&LOGGER).is_err() {
        REGISTERED.store(false, Ordering::Release);
        LOGGER.detach();
        return Err(BootError::Logger);
    }

    log::set_max_level(level);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::console::tests::BufferConsole;

    fn record<'a>(level: Level, args: fmt::Arguments<'a>) -> Record<'a> {
        Record::builder()
            .level(level)
            .target("ember_hal::gdt")
            .args(args)
            .build()
    }

    #[test]
    fn test_write_record_format() {
        let mut out = String::new();
        write_record(&mut out, Level::Info, "boot", &format_args!("limit={}", 23)).unwrap();
        assert_eq!(out, "[INFO ] boot: limit=23\n");
    }

    #[test]
    fn test_logger_writes_to_console() {
        let console = BufferConsole::leak();
        let logger = EarlyLogger::new();
        logger.attach(console, LevelFilter::Debug);

        logger.log(&record(Level::Debug, format_args!("base={:#x}", 0x1000)));
        assert_eq!(console.contents(), "[DEBUG] ember_hal::gdt: base=0x1000\n");
    }

    #[test]
    fn test_logger_filters_by_level() {
        let console = BufferConsole::leak();
        let logger = EarlyLogger::new();
        logger.attach(console, LevelFilter::Warn);

        logger.log(&record(Level::Info, format_args!("dropped")));
        logger.log(&record(Level::Error, format_args!("kept")));

        assert_eq!(console.contents(), "[ERROR] ember_hal::gdt: kept\n");
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn test_detached_logger_is_silent() {
        let console = BufferConsole::leak();
        let logger = EarlyLogger::new();
        logger.attach(console, LevelFilter::Trace);
        logger.detach();

        logger.log(&record(Level::Error, format_args!("nobody hears this")));
        assert!(console.contents().is_empty());
        assert_eq!(logger.level(), LevelFilter::Trace);
    }

    #[test]
    fn test_init_can_be_repeated() {
        let console = BufferConsole::leak();
        init(console, LevelFilter::Info).unwrap();
        init(console, LevelFilter::Debug).unwrap();
        assert!(REGISTERED.load(Ordering::Acquire));
    }
}
