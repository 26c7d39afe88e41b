//! # Segment Selectors
//!
//! Type-safe segment selectors for the kernel descriptor table.
//!
//! Interrupt gates and mode switches encode these values directly, so the
//! entry order of the table is part of the ABI.

use core::fmt;

use super::descriptor::ENTRY_SIZE;

// =============================================================================
// PRIVILEGE LEVELS
// =============================================================================

/// Requested privilege level carried in the low two selector bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rpl {
    /// Kernel
    Ring0 = 0,
    /// Unused
    Ring1 = 1,
    /// Unused
    Ring2 = 2,
    /// User
    Ring3 = 3,
}

impl Rpl {
    /// Decode the low two bits of `value`
    pub const fn from_raw(value: u8) -> Self {
        match value & 3 {
            0 => Rpl::Ring0,
            1 => Rpl::Ring1,
            2 => Rpl::Ring2,
            _ => Rpl::Ring3,
        }
    }

    /// Ring 0
    pub const fn is_kernel(self) -> bool {
        matches!(self, Rpl::Ring0)
    }

    /// Ring 3
    pub const fn is_user(self) -> bool {
        matches!(self, Rpl::Ring3)
    }
}

// =============================================================================
// SEGMENT SELECTOR
// =============================================================================

/// Segment Selector
///
/// ```text
///  15                              3   2   1   0
/// ┌────────────────────────────────┬───┬───────┐
/// │ Index                          │TI │  RPL  │
/// └────────────────────────────────┴───┴───────┘
///   Index: entry number, so index * 8 is the byte offset into the table
///   TI:    0 = GDT, 1 = LDT
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentSelector(u16);

impl SegmentSelector {
    /// The null selector
    pub const NULL: Self = Self(0);

    /// Selector for GDT entry `index`
    pub const fn new(index: u16, rpl: Rpl) -> Self {
        Self((index << 3) | (rpl as u16))
    }

    /// Selector for LDT entry `index`
    pub const fn ldt(index: u16, rpl: Rpl) -> Self {
        Self((index << 3) | 0x04 | (rpl as u16))
    }

    /// Wrap a raw selector value, e.g. one read back from a segment register
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw selector value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Table index
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    /// Byte offset of the referenced entry within its table
    pub const fn byte_offset(self) -> usize {
        (self.0 & !7) as usize
    }

    /// References the LDT instead of the GDT
    pub const fn is_ldt(self) -> bool {
        (self.0 & 0x04) != 0
    }

    /// Requested privilege level
    pub const fn rpl(self) -> Rpl {
        Rpl::from_raw((self.0 & 3) as u8)
    }

    /// Same entry with a different RPL
    pub const fn with_rpl(self, rpl: Rpl) -> Self {
        Self((self.0 & !3) | (rpl as u16))
    }

    /// Check if this is the null selector
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for SegmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentSelector")
            .field("raw", &format_args!("{:#06x}", self.0))
            .field("index", &self.index())
            .field("rpl", &self.rpl())
            .field("ldt", &self.is_ldt())
            .finish()
    }
}

impl fmt::Display for SegmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// =============================================================================
// STANDARD SELECTORS
// =============================================================================

/// Table index of the flat code segment
pub const KERNEL_CODE_INDEX: usize = 1;

/// Table index of the flat data segment
pub const KERNEL_DATA_INDEX: usize = 2;

/// Null segment selector (index 0)
pub const NULL_SELECTOR: SegmentSelector = SegmentSelector::NULL;

/// Kernel Code Segment selector (index 1, RPL 0)
pub const KERNEL_CS: SegmentSelector = SegmentSelector::new(KERNEL_CODE_INDEX as u16, Rpl::Ring0);

/// Kernel Data Segment selector (index 2, RPL 0)
pub const KERNEL_DS: SegmentSelector = SegmentSelector::new(KERNEL_DATA_INDEX as u16, Rpl::Ring0);

/// Raw kernel code selector (`index * 8`)
pub const KERNEL_CODE_SELECTOR: u16 = (KERNEL_CODE_INDEX * ENTRY_SIZE) as u16;

/// Raw kernel data selector (`index * 8`)
pub const KERNEL_DATA_SELECTOR: u16 = (KERNEL_DATA_INDEX * ENTRY_SIZE) as u16;

static_assertions::const_assert_eq!(KERNEL_CS.raw(), KERNEL_CODE_SELECTOR);
static_assertions::const_assert_eq!(KERNEL_DS.raw(), KERNEL_DATA_SELECTOR);

// =============================================================================
// TESTS
// =============================================================================
