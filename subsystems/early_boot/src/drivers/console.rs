//! # Early Console
//!
//! Byte-oriented output used before any real driver stack exists. The boot
//! sequence only needs to write text, so backends implement a single
//! `write_byte` and get string and `fmt::Write` support for free.

use core::fmt::{self, Write};

use crate::SerialConfig;

// =============================================================================
// CONSOLE BACKEND TRAIT
// =============================================================================

/// An output device usable during early boot
pub trait ConsoleBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &'static str;

    /// Check if the backend is ready for output
    fn is_available(&self) -> bool;

    /// Write a single byte
    fn write_byte(&self, byte: u8);

    /// Write a string
    fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }
}

/// `fmt::Write` adapter over a backend
pub struct ConsoleWriter<'a> {
    console: &'a dyn ConsoleBackend,
}

impl<'a> ConsoleWriter<'a> {
    /// Wrap `console`
    pub fn new(console: &'a dyn ConsoleBackend) -> Self {
        Self { console }
    }
}

impl Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.write_str(s);
        Ok(())
    }
}

impl fmt::Debug for ConsoleWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleWriter")
            .field("console", &self.console.name())
            .finish()
    }
}

// =============================================================================
// SERIAL CONSOLE BACKEND
// =============================================================================

/// 16550 UART register offsets
mod uart {
    pub const DATA: u16 = 0;
    pub const INTERRUPT_ENABLE: u16 = 1;
    pub const FIFO_CONTROL: u16 = 2;
    pub const LINE_CONTROL: u16 = 3;
    pub const MODEM_CONTROL: u16 = 4;
    pub const LINE_STATUS: u16 = 5;

    /// Divisor latch access bit in LINE_CONTROL
    pub const DLAB: u8 = 0x80;
    /// Transmit holding register empty in LINE_STATUS
    pub const THR_EMPTY: u8 = 0x20;
}

/// 16550 serial console on an I/O port
#[derive(Debug)]
pub struct SerialConsole {
    port: u16,
    initialized: bool,
}

impl SerialConsole {
    /// Program the UART described by `config` and return a console for it.
    ///
    /// # Safety
    /// `config.port` must be the base of a 16550-compatible UART that nothing
    /// else is driving.
    pub unsafe fn new(config: SerialConfig) -> Self {
        let port = config.port;
        let [divisor_low, divisor_high] = config.divisor().to_le_bytes();

        unsafe {
            outb(port + uart::INTERRUPT_ENABLE, 0x00);
            outb(port + uart::LINE_CONTROL, uart::DLAB);
            outb(port + uart::DATA, divisor_low);
            outb(port + uart::INTERRUPT_ENABLE, divisor_high);
            // 8 bits, no parity, one stop bit
            outb(port + uart::LINE_CONTROL, 0x03);
            // Enable FIFO, clear them, 14-byte threshold
            outb(port + uart::FIFO_CONTROL, 0xC7);
            // IRQs disabled, RTS/DTR set
            outb(port + uart::MODEM_CONTROL, 0x03);
        }

        Self {
            port,
            initialized: cfg!(any(target_arch = "x86", target_arch = "x86_64")),
        }
    }

    /// Base I/O port
    pub fn port(&self) -> u16 {
        self.port
    }

    fn write_raw(&self, byte: u8) {
        unsafe {
            while inb(self.port + uart::LINE_STATUS) & uart::THR_EMPTY == 0 {
                core::hint::spin_loop();
            }
            outb(self.port + uart::DATA, byte);
        }
    }
}

impl ConsoleBackend for SerialConsole {
    fn name(&self) -> &'static str {
        "Serial"
    }

    fn is_available(&self) -> bool {
        self.initialized
    }

    fn write_byte(&self, byte: u8) {
        if byte == b'\n' {
            self.write_raw(b'\r');
        }
        self.write_raw(byte);
    }
}

// =============================================================================
// PORT I/O
// =============================================================================

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
unsafe fn outb(port: u16, value: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    unsafe {
        core::arch::asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
    }
    value
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
unsafe fn outb(_port: u16, _value: u8) {}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
unsafe fn inb(_port: u16) -> u8 {
    uart::THR_EMPTY
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Console that appends everything to a string
    #[derive(Debug, Default)]
    pub(crate) struct BufferConsole {
        pub(crate) output: spin::Mutex<String>,
        pub(crate) offline: bool,
    }

    impl BufferConsole {
        pub(crate) fn leak() -> &'static Self {
            Box::leak(Box::<Self>::default())
        }

        pub(crate) fn leak_offline() -> &'static Self {
            Box::leak(Box::new(Self {
                offline: true,
                ..Self::default()
            }))
        }

        pub(crate) fn contents(&self) -> String {
            self.output.lock().clone()
        }
    }

    impl ConsoleBackend for BufferConsole {
        fn name(&self) -> &'static str {
            "Buffer"
        }

        fn is_available(&self) -> bool {
            !self.offline
        }

        fn write_byte(&self, byte: u8) {
            self.output.lock().push(byte as char);
        }
    }

    #[test]
    fn test_writer_formats_into_backend() {
        let console = BufferConsole::default();
        let mut writer = ConsoleWriter::new(&console);
        write!(writer, "GDTR {:#06x}", 0x17).unwrap();
        assert_eq!(console.contents(), "GDTR 0x0017");
    }

    #[test]
    fn test_writer_debug_names_backend() {
        let console = BufferConsole::default();
        let writer = ConsoleWriter::new(&console);
        assert_eq!(format!("{writer:?}"), "ConsoleWriter { console: \"Buffer\" }");
    }
}
