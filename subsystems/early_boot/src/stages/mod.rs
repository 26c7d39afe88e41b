//! # Boot Stages and Sequencing
//!
//! ## Execution Flow
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                     BOOT SEQUENCE EXECUTION                        │
//! │                                                                    │
//! │   Console ──▶ Logger ──▶ Segmentation ──▶ Handoff ──▶ [KERNEL]     │
//! │      │                        │                                    │
//! │      │ unavailable            ├── install flat GDT via loader      │
//! │      ▼                        ├── dump table      (dump_gdt)       │
//! │   skip Logger,                └── read back GDTR  (verify_gdt)     │
//! │   boot silently                                                    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Segmentation runs before anything that depends on segment register
//! contents; nothing between `lgdt` and the segment reload is allowed to
//! assume the old table.

use ember_hal::arch::x86::segmentation::{KernelTable, SegmentSelector, ENTRY_SIZE};
use ember_hal::{KernelGdt, SegmentLoader, TableRegister};

use crate::drivers::console::ConsoleBackend;
use crate::error::{BootError, BootResult};
use crate::{logger, BootConfig, BootStatus};

// =============================================================================
// BOOT STAGES
// =============================================================================

/// Boot stage enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BootStage {
    /// Nothing has run yet
    NotStarted   = 0,
    /// Early console bring-up
    Console      = 1,
    /// `log` backend registration
    Logger       = 2,
    /// GDT build and activation
    Segmentation = 3,
    /// Control passes to the kernel
    Handoff      = 4,
}

impl BootStage {
    /// Stage name
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Console => "Console",
            Self::Logger => "Logger",
            Self::Segmentation => "Segmentation",
            Self::Handoff => "Handoff",
        }
    }

    /// Status bit set when this stage completes
    pub const fn status_flag(self) -> BootStatus {
        match self {
            Self::NotStarted => BootStatus::empty(),
            Self::Console => BootStatus::CONSOLE,
            Self::Logger => BootStatus::LOGGER,
            Self::Segmentation => BootStatus::SEGMENTATION,
            Self::Handoff => BootStatus::HANDOFF,
        }
    }
}

// =============================================================================
// BOOT SEQUENCE
// =============================================================================

/// Runs the early boot stages in order
#[derive(Debug)]
pub struct BootSequence {
    config: BootConfig,
    stage: BootStage,
    status: BootStatus,
}

impl BootSequence {
    /// Create a new boot sequence with configuration
    pub const fn new(config: BootConfig) -> Self {
        Self {
            config,
            stage: BootStage::NotStarted,
            status: BootStatus::empty(),
        }
    }

    /// Stage currently (or last) executing
    pub fn stage(&self) -> BootStage {
        self.stage
    }

    /// Completed stages and error state
    pub fn status(&self) -> BootStatus {
        self.status
    }

    /// Run every stage and return the GDTR image now held by the CPU.
    ///
    /// The resulting status is also published to [`crate::boot_status`].
    ///
    /// # Safety
    /// Must run once on the boot CPU with interrupts disabled, and `loader`
    /// must honour the [`SegmentLoader`] contract.
    pub unsafe fn execute<L>(
        &mut self,
        gdt: &'static KernelGdt,
        loader: &mut L,
        console: &'static dyn ConsoleBackend,
    ) -> BootResult<&'static TableRegister>
    where
        L: SegmentLoader + ?Sized,
    {
        if self.status.contains(BootStatus::HANDOFF) {
            return Err(BootError::AlreadyBooted);
        }

        let result = unsafe { self.run(gdt, loader, console) };
        if result.is_err() {
            self.status |= BootStatus::ERROR;
        }
        crate::publish_status(self.status);

        result
    }

    unsafe fn run<L>(
        &mut self,
        gdt: &'static KernelGdt,
        loader: &mut L,
        console: &'static dyn ConsoleBackend,
    ) -> BootResult<&'static TableRegister>
    where
        L: SegmentLoader + ?Sized,
    {
        self.enter(BootStage::Console);
        match Self::check_console(console) {
            Ok(()) => {
                self.complete(BootStage::Console);

                self.enter(BootStage::Logger);
                logger::init(console, self.config.log_level)?;
                self.complete(BootStage::Logger);
                log::info!("Ember early boot v{} on {}", crate::VERSION, console.name());
            },
            Err(e) if e.is_recoverable() => {},
            Err(e) => return Err(e),
        }

        self.enter(BootStage::Segmentation);
        let register = unsafe { gdt.install(loader) }?;
        if self.config.dump_gdt {
            if let Some(table) = gdt.table() {
                dump_table(table);
            }
        }
        if self.config.verify_gdt {
            verify_register(register, loader.active_register())?;
        }
        self.complete(BootStage::Segmentation);

        self.enter(BootStage::Handoff);
        self.complete(BootStage::Handoff);
        log::info!("Early boot complete, status {:?}", self.status);

        Ok(register)
    }

    fn check_console(console: &dyn ConsoleBackend) -> BootResult<()> {
        if console.is_available() {
            Ok(())
        } else {
            Err(BootError::ConsoleUnavailable)
        }
    }

    fn enter(&mut self, stage: BootStage) {
        self.stage = stage;
        log::trace!("Entering stage: {}", stage.name());
    }

    fn complete(&mut self, stage: BootStage) {
        self.status |= stage.status_flag();
    }
}

/// Log every descriptor with its selector offset
fn dump_table(table: &KernelTable) {
    for (index, entry) in table.entries().iter().enumerate() {
        let selector = SegmentSelector::from_raw((index * ENTRY_SIZE) as u16);
        log::debug!(
            "GDT[{}] {} base={:#010x} limit={:#07x} access={:#04x} gran={:#04x} size={:#x}",
            index,
            selector,
            entry.base(),
            entry.limit(),
            entry.access().bits(),
            entry.granularity_byte(),
            if entry.is_null() { 0 } else { entry.segment_size() }
        );
    }
}

/// Compare the installed image with what the CPU reports
fn verify_register(expected: &TableRegister, active: Option<TableRegister>) -> BootResult<()> {
    match active {
        Some(found) if found != *expected => {
            log::error!("GDTR mismatch: installed {:?}, CPU holds {:?}", expected, found);
            Err(BootError::GdtMismatch {
                expected: *expected,
                found,
            })
        },
        Some(_) => {
            log::debug!("GDTR verified");
            Ok(())
        },
        None => {
            log::debug!("GDTR read-back unavailable, skipping verification");
            Ok(())
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::console::tests::BufferConsole;
    use ember_hal::HalError;

    #[derive(Debug, Default)]
    struct MockLoader {
        loaded: Option<TableRegister>,
        report: Option<TableRegister>,
        calls: usize,
    }

    impl SegmentLoader for MockLoader {
        unsafe fn activate(&mut self, register: &TableRegister) {
            self.loaded = Some(*register);
            self.calls += 1;
        }

        fn active_register(&self) -> Option<TableRegister> {
            self.report.or(self.loaded)
        }
    }

    fn fresh_gdt() -> &'static KernelGdt {
        Box::leak(Box::new(KernelGdt::new()))
    }

    #[test]
    fn test_sequence_installs_gdt() {
        let gdt = fresh_gdt();
        let mut loader = MockLoader::default();
        let mut sequence = BootSequence::new(BootConfig::qemu());

        let register = unsafe { sequence.execute(gdt, &mut loader, BufferConsole::leak()) }.unwrap();

        assert_eq!(register.limit(), 23);
        assert_eq!(register.base(), gdt.table().unwrap().linear_address());
        assert_eq!(loader.loaded, Some(*register));
        assert_eq!(sequence.stage(), BootStage::Handoff);
        assert_eq!(
            sequence.status(),
            BootStatus::CONSOLE | BootStatus::LOGGER | BootStatus::SEGMENTATION | BootStatus::HANDOFF
        );
    }

    #[test]
    fn test_sequence_runs_once() {
        let gdt = fresh_gdt();
        let mut loader = MockLoader::default();
        let console = BufferConsole::leak();
        let mut sequence = BootSequence::new(BootConfig::minimal());

        unsafe { sequence.execute(gdt, &mut loader, console) }.unwrap();
        let again = unsafe { sequence.execute(gdt, &mut loader, console) };

        assert_eq!(again, Err(BootError::AlreadyBooted));
        assert_eq!(loader.calls, 1);
    }

    #[test]
    fn test_offline_console_is_skipped() {
        let gdt = fresh_gdt();
        let mut loader = MockLoader::default();
        let mut sequence = BootSequence::new(BootConfig::new());

        let result = unsafe { sequence.execute(gdt, &mut loader, BufferConsole::leak_offline()) };

        assert!(result.is_ok());
        assert!(!sequence.status().contains(BootStatus::CONSOLE));
        assert!(!sequence.status().contains(BootStatus::LOGGER));
        assert!(sequence.status().contains(BootStatus::SEGMENTATION));
    }

    #[test]
    fn test_reinstall_is_reported() {
        let gdt = fresh_gdt();
        let mut loader = MockLoader::default();
        unsafe { gdt.install(&mut loader) }.unwrap();

        let mut sequence = BootSequence::new(BootConfig::new());
        let result = unsafe { sequence.execute(gdt, &mut loader, BufferConsole::leak()) };

        assert_eq!(result, Err(BootError::Hal(HalError::AlreadyInstalled)));
        assert_eq!(sequence.stage(), BootStage::Segmentation);
        assert!(sequence.status().contains(BootStatus::ERROR));
        assert!(!sequence.status().contains(BootStatus::SEGMENTATION));
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let gdt = fresh_gdt();
        let bogus = TableRegister::new(7, 0xDEAD_0000);
        let mut loader = MockLoader {
            report: Some(bogus),
            ..MockLoader::default()
        };
        let mut sequence = BootSequence::new(BootConfig::qemu());

        let result = unsafe { sequence.execute(gdt, &mut loader, BufferConsole::leak()) };

        match result {
            Err(BootError::GdtMismatch { expected, found }) => {
                assert_eq!(expected.limit(), 23);
                assert_eq!(found, bogus);
            },
            other => panic!("expected GDTR mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_can_be_disabled() {
        let gdt = fresh_gdt();
        let mut loader = MockLoader {
            report: Some(TableRegister::new(7, 0)),
            ..MockLoader::default()
        };
        let config = BootConfig {
            verify_gdt: false,
            ..BootConfig::new()
        };
        let mut sequence = BootSequence::new(config);

        assert!(unsafe { sequence.execute(gdt, &mut loader, BufferConsole::leak()) }.is_ok());
    }

    #[test]
    fn test_verify_register_without_readback() {
        let expected = TableRegister::new(23, 0x1000);
        assert_eq!(verify_register(&expected, None), Ok(()));
        assert_eq!(verify_register(&expected, Some(expected)), Ok(()));
    }

    #[test]
    fn test_stage_flags() {
        assert!(BootStage::Console < BootStage::Segmentation);
        assert_eq!(BootStage::Segmentation.status_flag(), BootStatus::SEGMENTATION);
        assert_eq!(BootStage::NotStarted.status_flag(), BootStatus::empty());
        assert_eq!(BootStage::Handoff.name(), "Handoff");
    }
}
