//! # Table Activation
//!
//! The only code in the segmentation layer that touches the CPU. Everything
//! else encodes bytes and can be exercised on any host; activation goes through
//! [`SegmentLoader`] so a recording loader can stand in for the hardware.

#[cfg(target_arch = "x86")]
use super::selectors::{KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
use super::table::TableRegister;

// =============================================================================
// LOADER CAPABILITY
// =============================================================================

/// Loads a GDTR image and switches the segment registers over to it
pub trait SegmentLoader {
    /// Load `register` into GDTR and reload CS, DS, ES, FS, GS and SS.
    ///
    /// On return CS holds [`KERNEL_CS`](super::KERNEL_CS) and every data
    /// segment register holds [`KERNEL_DS`](super::KERNEL_DS) of the new table.
    ///
    /// # Safety
    /// `register` must describe a table that stays mapped and unmodified for
    /// the rest of the kernel's life, with a flat code descriptor at index 1
    /// and a flat data descriptor at index 2.
    unsafe fn activate(&mut self, register: &TableRegister);

    /// The GDTR image currently held by the CPU, if the loader can read it
    fn active_register(&self) -> Option<TableRegister> {
        None
    }
}

// =============================================================================
// PROTECTED MODE LOADER
// =============================================================================

/// Hardware loader for 32-bit protected mode
#[cfg(target_arch = "x86")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtectedModeLoader;

#[cfg(target_arch = "x86")]
impl SegmentLoader for ProtectedModeLoader {
    unsafe fn activate(&mut self, register: &TableRegister) {
        unsafe {
            core::arch::asm!(
                "lgdt [{gdtr}]",
                "mov ds, {data:x}",
                "mov es, {data:x}",
                "mov fs, {data:x}",
                "mov gs, {data:x}",
                "mov ss, {data:x}",
                // CS can only change through a far transfer.
                "push {code}",
                "lea {tmp}, [2f]",
                "push {tmp}",
                "retf",
                "2:",
                gdtr = in(reg) register as *const TableRegister,
                data = in(reg) KERNEL_DATA_SELECTOR as u32,
                code = in(reg) KERNEL_CODE_SELECTOR as u32,
                tmp = lateout(reg) _,
                options(preserves_flags)
            );
        }
    }

    fn active_register(&self) -> Option<TableRegister> {
        Some(sgdt())
    }
}

/// Store the current GDTR
#[cfg(target_arch = "x86")]
pub fn sgdt() -> TableRegister {
    let mut register = TableRegister::new(0, 0);
    unsafe {
        core::arch::asm!(
            "sgdt [{}]",
            in(reg) &mut register as *mut TableRegister,
            options(nostack, preserves_flags)
        );
    }
    register
}

// =============================================================================
// TESTS
// =============================================================================
