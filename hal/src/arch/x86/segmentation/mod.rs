//! # x86 Segmentation
//!
//! Flat-model GDT for 32-bit protected mode.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        KERNEL_GDT                              │
//! │  ┌──────────────────────────────────────┐   ┌───────────────┐  │
//! │  │ DescriptorTable<3>                   │◀──│ TableRegister │  │
//! │  ├────────────┬────────────┬────────────┤   │ limit = 23    │  │
//! │  │ Null  [0]  │ Code  [1]  │ Data  [2]  │   │ base  = &table│  │
//! │  └────────────┴────────────┴────────────┘   └───────┬───────┘  │
//! └─────────────────────────────────────────────────────┼──────────┘
//!                                                       ▼
//!                                       SegmentLoader::activate
//!                                     (lgdt, reload CS/DS/ES/FS/GS/SS)
//! ```
//!
//! ## Segment Layout
//!
//! | Index | Selector | Description        | DPL |
//! |-------|----------|--------------------|-----|
//! | 0     | 0x00     | Null descriptor    | -   |
//! | 1     | 0x08     | Kernel Code 32-bit | 0   |
//! | 2     | 0x10     | Kernel Data        | 0   |

pub mod builder;
pub mod descriptor;
pub mod loader;
pub mod selectors;
pub mod table;

// Re-exports
pub use builder::{flat_table, KernelGdt, KernelTable, KERNEL_GDT, KERNEL_GDT_ENTRIES};
pub use descriptor::{AccessByte, DescriptorFlags, SegmentDescriptor, ENTRY_SIZE, MAX_LIMIT};
#[cfg(target_arch = "x86")]
pub use loader::{sgdt, ProtectedModeLoader};
pub use loader::SegmentLoader;
pub use selectors::{
    Rpl, SegmentSelector, KERNEL_CODE_INDEX, KERNEL_CODE_SELECTOR, KERNEL_CS,
    KERNEL_DATA_INDEX, KERNEL_DATA_SELECTOR, KERNEL_DS, NULL_SELECTOR,
};
pub use table::{DescriptorTable, TableRegister, MAX_ENTRIES, MAX_TABLE_BYTES};

/// Build and load the kernel GDT on the boot processor
///
/// # Safety
/// Must be called exactly once during early boot, before interrupts are
/// enabled or any other processor is started.
#[cfg(target_arch = "x86")]
pub unsafe fn init() -> crate::HalResult<&'static TableRegister> {
    unsafe { KERNEL_GDT.install(&mut ProtectedModeLoader) }
}
