//! # Kernel GDT Builder
//!
//! Builds the flat three-entry table and owns the process-wide copy that the
//! CPU is pointed at.
//!
//! ```text
//! Index  Selector   Segment        Access   Flags
//! ───────────────────────────────────────────────────
//! 0      0x00       Null           -        -
//! 1      0x08       Kernel Code    0x9A     G=1 D=1
//! 2      0x10       Kernel Data    0x92     G=1 D=1
//! ```
//!
//! Both segments start at 0 and span 4 GiB.

use core::mem::size_of;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Once;

use super::descriptor::SegmentDescriptor;
use super::loader::SegmentLoader;
use super::selectors::{KERNEL_CODE_INDEX, KERNEL_CS, KERNEL_DATA_INDEX, KERNEL_DS};
use super::table::{DescriptorTable, TableRegister, MAX_TABLE_BYTES};
use crate::{HalError, HalResult};

// =============================================================================
// KERNEL TABLE
// =============================================================================

/// Number of entries in the kernel table (null + code + data)
pub const KERNEL_GDT_ENTRIES: usize = 3;

/// The kernel's descriptor table type
pub type KernelTable = DescriptorTable<KERNEL_GDT_ENTRIES>;

static_assertions::const_assert!(size_of::<KernelTable>() <= MAX_TABLE_BYTES);

/// Build the flat kernel table
pub const fn flat_table() -> KernelTable {
    DescriptorTable::new()
        .with_entry(KERNEL_CODE_INDEX, SegmentDescriptor::kernel_code())
        .with_entry(KERNEL_DATA_INDEX, SegmentDescriptor::kernel_data())
}

// =============================================================================
// KERNEL GDT
// =============================================================================

/// Write-once home of the kernel table and its GDTR image.
///
/// Both are filled by [`KernelGdt::install`] and only shared references are
/// handed out afterwards.
#[derive(Debug)]
pub struct KernelGdt {
    claimed: AtomicBool,
    table: Once<KernelTable>,
    register: Once<TableRegister>,
}

/// The kernel descriptor table
pub static KERNEL_GDT: KernelGdt = KernelGdt::new();

impl KernelGdt {
    /// An empty, not yet installed slot
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            table: Once::new(),
            register: Once::new(),
        }
    }

    /// Build the flat table, fill the GDTR image and activate it via `loader`.
    ///
    /// Returns the register image handed to the loader. A second call fails
    /// with [`HalError::AlreadyInstalled`] without touching the loader.
    ///
    /// # Safety
    /// Must run on the boot CPU before anything relies on segment register
    /// contents, and `loader` must honour the [`SegmentLoader`] contract.
    pub unsafe fn install<L>(&'static self, loader: &mut L) -> HalResult<&'static TableRegister>
    where
        L: SegmentLoader + ?Sized,
    {
        if self.claimed.swap(true, Ordering::AcqRel) {
            log::warn!("GDT: refusing to reinstall descriptor table");
            return Err(HalError::AlreadyInstalled);
        }

        let table = self.table.call_once(flat_table);
        let register = self.register.call_once(|| table.register());

        log::debug!("GDT: {:?}", register);

        unsafe { loader.activate(register) };

        log::info!(
            "GDT: {} descriptors active (CS={}, DS={})",
            register.entry_count(),
            KERNEL_CS,
            KERNEL_DS
        );

        Ok(register)
    }

    /// Check if the table has been installed
    pub fn is_installed(&self) -> bool {
        self.register.is_completed()
    }

    /// The installed table
    pub fn table(&self) -> Option<&KernelTable> {
        self.table.get()
    }

    /// The installed GDTR image
    pub fn register(&self) -> Option<&TableRegister> {
        self.register.get()
    }
}

impl Default for KernelGdt {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
