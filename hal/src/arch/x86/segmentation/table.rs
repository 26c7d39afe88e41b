//! # Descriptor Table and GDTR Image
//!
//! A descriptor table is a fixed array of [`SegmentDescriptor`]s. Its size is
//! part of the type, so the 16-bit GDTR limit is checked when the table type
//! is instantiated, not when it is loaded.
//!
//! ```compile_fail
//! use ember_hal::arch::x86::segmentation::DescriptorTable;
//!
//! // 8193 entries = 65544 bytes, one entry more than GDTR can describe.
//! let table = DescriptorTable::<8193>::new();
//! ```

use core::fmt;
use core::mem::size_of;

use super::descriptor::{SegmentDescriptor, ENTRY_SIZE};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Largest table a 16-bit limit can describe (limit 0xFFFF)
pub const MAX_TABLE_BYTES: usize = 1 << 16;

/// Largest entry count a table may have
pub const MAX_ENTRIES: usize = MAX_TABLE_BYTES / ENTRY_SIZE;

// =============================================================================
// DESCRIPTOR TABLE
// =============================================================================

/// Fixed-size descriptor table in the layout the CPU reads
#[derive(Clone, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct DescriptorTable<const N: usize> {
    entries: [SegmentDescriptor; N],
}

impl<const N: usize> DescriptorTable<N> {
    /// Size of the table in bytes
    pub const BYTE_SIZE: usize = N * ENTRY_SIZE;

    /// Evaluated by every constructor; a table that overflows the GDTR limit
    /// fails to build.
    const FITS_REGISTER: () = assert!(
        N > 0 && N <= MAX_ENTRIES,
        "descriptor table must hold between 1 and 8192 entries"
    );

    /// A table with every entry null
    pub const fn new() -> Self {
        let () = Self::FITS_REGISTER;
        Self {
            entries: [SegmentDescriptor::null(); N],
        }
    }

    /// Place `entry` at `index`.
    ///
    /// Index 0 is reserved for the null descriptor.
    pub const fn with_entry(mut self, index: usize, entry: SegmentDescriptor) -> Self {
        assert!(index != 0, "index 0 is reserved for the null descriptor");
        assert!(index < N, "descriptor index out of range");
        self.entries[index] = entry;
        self
    }

    /// Number of entries
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false; a table holds at least the null descriptor
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// GDTR limit for this table (`size - 1`)
    pub const fn limit(&self) -> u16 {
        (Self::BYTE_SIZE - 1) as u16
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&SegmentDescriptor> {
        self.entries.get(index)
    }

    /// All entries in table order
    pub fn entries(&self) -> &[SegmentDescriptor; N] {
        &self.entries
    }

    /// The raw bytes the CPU will read
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: SegmentDescriptor is repr(C) with no padding, so the array
        // is exactly BYTE_SIZE initialized bytes.
        unsafe { core::slice::from_raw_parts(self.entries.as_ptr().cast::<u8>(), Self::BYTE_SIZE) }
    }

    /// Linear address of the first entry
    pub fn linear_address(&self) -> u32 {
        self.entries.as_ptr() as usize as u32
    }

    /// Build the GDTR image for this table.
    ///
    /// The CPU keeps re-reading descriptors after `lgdt`, so only tables
    /// that live for the rest of the kernel may be described.
    pub fn register(&'static self) -> TableRegister {
        TableRegister::new(self.limit(), self.linear_address())
    }
}

impl<const N: usize> Default for DescriptorTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Selector-style offset label for table dumps
struct Offset(usize);

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl<const N: usize> fmt::Debug for DescriptorTable<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| (Offset(index * ENTRY_SIZE), entry)),
            )
            .finish()
    }
}

// =============================================================================
// TABLE REGISTER (for LGDT)
// =============================================================================

/// GDTR image consumed by `lgdt`: `{u16 limit}{u32 base}`, no padding
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TableRegister {
    limit: u16,
    base: u32,
}

static_assertions::const_assert_eq!(size_of::<TableRegister>(), 6);

impl TableRegister {
    /// Create a register image from raw parts
    pub const fn new(limit: u16, base: u32) -> Self {
        Self { limit, base }
    }

    /// Table size in bytes minus one
    pub const fn limit(&self) -> u16 {
        self.limit
    }

    /// Linear address of the table
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Table size in bytes
    pub const fn table_size(&self) -> usize {
        self.limit as usize + 1
    }

    /// Number of whole descriptors the register covers
    pub const fn entry_count(&self) -> usize {
        self.table_size() / ENTRY_SIZE
    }
}

impl fmt::Debug for TableRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRegister")
            .field("limit", &self.limit())
            .field("base", &format_args!("{:#010x}", self.base()))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_layout() {
        assert_eq!(size_of::<TableRegister>(), 6);

        let reg = TableRegister::new(23, 0x0010_2000);
        // SAFETY: TableRegister is 6 bytes of plain integers.
        let bytes: [u8; 6] = unsafe { core::mem::transmute(reg) };
        assert_eq!(bytes, [23, 0, 0x00, 0x20, 0x10, 0x00]);
    }

    #[test]
    fn test_register_sizes() {
        let reg = TableRegister::new(23, 0);
        assert_eq!(reg.table_size(), 24);
        assert_eq!(reg.entry_count(), 3);
    }

    #[test]
    fn test_table_size() {
        assert_eq!(size_of::<DescriptorTable<3>>(), 24);
        assert_eq!(DescriptorTable::<3>::BYTE_SIZE, 24);
        assert_eq!(DescriptorTable::<3>::new().limit(), 23);
    }

    #[test]
    fn test_largest_table_limit() {
        assert_eq!(DescriptorTable::<MAX_ENTRIES>::BYTE_SIZE, MAX_TABLE_BYTES);
        assert_eq!(DescriptorTable::<MAX_ENTRIES>::new().limit(), 0xFFFF);
    }

    #[test]
    fn test_new_table_is_null() {
        let table = DescriptorTable::<4>::new();
        assert!(table.entries().iter().all(SegmentDescriptor::is_null));
        assert!(table.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_with_entry() {
        let table = DescriptorTable::<2>::new().with_entry(1, SegmentDescriptor::kernel_data());
        assert_eq!(table.get(1), Some(&SegmentDescriptor::kernel_data()));
        assert_eq!(&table.as_bytes()[8..], &SegmentDescriptor::kernel_data().to_bytes());
        assert_eq!(table.get(2), None);
    }

    #[test]
    #[should_panic(expected = "null descriptor")]
    fn test_with_entry_rejects_null_slot() {
        let _ = DescriptorTable::<2>::new().with_entry(0, SegmentDescriptor::kernel_code());
    }

    #[test]
    fn test_register_for_static_table() {
        static TABLE: DescriptorTable<3> = DescriptorTable::new();

        let reg = TABLE.register();
        assert_eq!(reg.limit(), 23);
        assert_eq!(reg.base(), &TABLE as *const _ as usize as u32);
    }

    #[test]
    fn test_debug_dump_uses_offsets() {
        let table = DescriptorTable::<2>::new().with_entry(1, SegmentDescriptor::kernel_code());
        let dump = format!("{table:?}");
        assert!(dump.contains("0x0000"));
        assert!(dump.contains("0x0008"));
        assert!(dump.contains("access: 0x9a"));
    }
}
