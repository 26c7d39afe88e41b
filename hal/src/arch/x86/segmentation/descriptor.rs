//! # Segment Descriptors
//!
//! 32-bit code/data segment descriptor encoding.
//!
//! ## Entry Layout
//!
//! ```text
//! Byte   Field                     Contents
//! ─────────────────────────────────────────────────────────
//! 0-1    limit (low)               limit bits 0-15
//! 2-3    base (low)                base bits 0-15
//! 4      base (middle)             base bits 16-23
//! 5      access                    P DPL DPL S E DC RW A
//! 6      granularity / limit high  G D/B L AVL | limit bits 16-19
//! 7      base (high)               base bits 24-31
//! ```
//!
//! The limit is a 20-bit field. With [`DescriptorFlags::GRANULARITY`] set it
//! counts 4 KiB units, so `0xFFFFF` spans the whole 4 GiB address space.

use core::fmt;
use core::mem::size_of;

use crate::{HalError, HalResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Size of a single descriptor (8 bytes)
pub const ENTRY_SIZE: usize = 8;

/// Largest value the 20-bit limit field can hold
pub const MAX_LIMIT: u32 = 0xF_FFFF;

/// Granularity unit when [`DescriptorFlags::GRANULARITY`] is set
pub const PAGE_GRANULE: u64 = 4096;

// =============================================================================
// DESCRIPTOR FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Descriptor flags (high nibble of the granularity byte)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        /// Granularity (0=byte, 1=4KB pages)
        const GRANULARITY = 1 << 7;
        /// Default operand size (0=16-bit, 1=32-bit)
        const SIZE_32 = 1 << 6;
        /// Long mode code segment (must be 0 in protected mode)
        const LONG_MODE = 1 << 5;
        /// Available for system use
        const AVAILABLE = 1 << 4;
    }
}

impl DescriptorFlags {
    /// Flat 32-bit segment: 4 KiB granularity, 32-bit operands
    pub const FLAT_32: Self = Self::GRANULARITY.union(Self::SIZE_32);
}

// =============================================================================
// ACCESS BYTE
// =============================================================================

bitflags::bitflags! {
    /// Descriptor access byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessByte: u8 {
        /// Present bit - must be 1 for valid segments
        const PRESENT = 1 << 7;
        /// Privilege level bit 1
        const DPL_1 = 1 << 6;
        /// Privilege level bit 0
        const DPL_0 = 1 << 5;
        /// Descriptor type (0=system, 1=code/data)
        const DESCRIPTOR_TYPE = 1 << 4;
        /// Executable (1=code, 0=data)
        const EXECUTABLE = 1 << 3;
        /// Direction/Conforming
        /// - Data: 0=grows up, 1=grows down
        /// - Code: 0=non-conforming, 1=conforming
        const DIRECTION_CONFORMING = 1 << 2;
        /// Readable (code) / Writable (data)
        const READABLE_WRITABLE = 1 << 1;
        /// Accessed (set by CPU)
        const ACCESSED = 1 << 0;
    }
}

impl AccessByte {
    /// Present, ring 0, code, executable, readable (0x9A)
    pub const KERNEL_CODE: Self = Self::PRESENT
        .union(Self::DESCRIPTOR_TYPE)
        .union(Self::EXECUTABLE)
        .union(Self::READABLE_WRITABLE);

    /// Present, ring 0, data, writable (0x92)
    pub const KERNEL_DATA: Self = Self::PRESENT
        .union(Self::DESCRIPTOR_TYPE)
        .union(Self::READABLE_WRITABLE);

    /// Replace the descriptor privilege level
    pub const fn with_dpl(self, dpl: u8) -> Self {
        Self::from_bits_retain((self.bits() & !0x60) | ((dpl & 3) << 5))
    }

    /// Descriptor privilege level
    pub const fn dpl(self) -> u8 {
        (self.bits() >> 5) & 3
    }
}

// =============================================================================
// SEGMENT DESCRIPTOR
// =============================================================================

/// A single 8-byte segment descriptor, laid out exactly as the CPU reads it
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct SegmentDescriptor {
    limit_low: u16,
    base_low: u16,
    base_middle: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

static_assertions::const_assert_eq!(size_of::<SegmentDescriptor>(), ENTRY_SIZE);

impl SegmentDescriptor {
    /// The mandatory all-zero descriptor at index 0
    pub const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_middle: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    /// Encode a descriptor.
    ///
    /// Only bits 0-19 of `limit` reach the descriptor; anything above bit 19
    /// is ignored. Use [`SegmentDescriptor::checked`] to reject such limits.
    pub const fn new(base: u32, limit: u32, access: AccessByte, flags: DescriptorFlags) -> Self {
        Self::from_raw_parts(base, limit, access.bits(), flags.bits())
    }

    /// Encode a descriptor from raw access and flag bytes.
    ///
    /// The low nibble of `flags` is discarded so it can never clobber the
    /// limit bits sharing that byte.
    pub const fn from_raw_parts(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_middle: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: ((limit >> 16) & 0x0F) as u8 | (flags & 0xF0),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    /// Encode a descriptor, rejecting out-of-range limits and flags that
    /// spill into the limit nibble.
    pub fn checked(base: u32, limit: u32, access: u8, flags: u8) -> HalResult<Self> {
        if limit > MAX_LIMIT {
            return Err(HalError::LimitOutOfRange { limit });
        }
        if flags & 0x0F != 0 {
            return Err(HalError::InvalidFlags { flags });
        }
        Ok(Self::from_raw_parts(base, limit, access, flags))
    }

    /// Flat ring-0 code segment covering 4 GiB
    pub const fn kernel_code() -> Self {
        Self::new(0, u32::MAX, AccessByte::KERNEL_CODE, DescriptorFlags::FLAT_32)
    }

    /// Flat ring-0 data segment covering 4 GiB
    pub const fn kernel_data() -> Self {
        Self::new(0, u32::MAX, AccessByte::KERNEL_DATA, DescriptorFlags::FLAT_32)
    }

    /// Segment base address
    pub const fn base(&self) -> u32 {
        self.base_low as u32 | (self.base_middle as u32) << 16 | (self.base_high as u32) << 24
    }

    /// Raw 20-bit limit field
    pub const fn limit(&self) -> u32 {
        self.limit_low as u32 | ((self.granularity & 0x0F) as u32) << 16
    }

    /// Access byte
    pub const fn access(&self) -> AccessByte {
        AccessByte::from_bits_retain(self.access)
    }

    /// Flags nibble
    pub const fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::from_bits_retain(self.granularity & 0xF0)
    }

    /// Raw granularity byte (flags and limit bits 16-19)
    pub const fn granularity_byte(&self) -> u8 {
        self.granularity
    }

    /// Number of addressable bytes, honouring the granularity flag
    pub const fn segment_size(&self) -> u64 {
        let units = self.limit() as u64 + 1;
        if self.granularity & DescriptorFlags::GRANULARITY.bits() != 0 {
            units * PAGE_GRANULE
        } else {
            units
        }
    }

    /// Check if this is a null descriptor
    pub const fn is_null(&self) -> bool {
        self.limit_low == 0
            && self.base_low == 0
            && self.base_middle == 0
            && self.access == 0
            && self.granularity == 0
            && self.base_high == 0
    }

    /// Check the present bit
    pub const fn is_present(&self) -> bool {
        self.access & AccessByte::PRESENT.bits() != 0
    }

    /// Check if this describes a code segment
    pub const fn is_code(&self) -> bool {
        let code = AccessByte::DESCRIPTOR_TYPE.bits() | AccessByte::EXECUTABLE.bits();
        self.access & code == code
    }

    /// Descriptor privilege level
    pub const fn dpl(&self) -> u8 {
        self.access().dpl()
    }

    /// The 8 bytes the CPU reads
    pub const fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let limit = self.limit_low.to_le_bytes();
        let base = self.base_low.to_le_bytes();
        [
            limit[0],
            limit[1],
            base[0],
            base[1],
            self.base_middle,
            self.access,
            self.granularity,
            self.base_high,
        ]
    }

    /// Decode a descriptor from its in-memory bytes
    pub const fn from_bytes(bytes: [u8; ENTRY_SIZE]) -> Self {
        Self {
            limit_low: u16::from_le_bytes([bytes[0], bytes[1]]),
            base_low: u16::from_le_bytes([bytes[2], bytes[3]]),
            base_middle: bytes[4],
            access: bytes[5],
            granularity: bytes[6],
            base_high: bytes[7],
        }
    }
}

impl fmt::Debug for SegmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentDescriptor")
            .field("base", &format_args!("{:#010x}", self.base()))
            .field("limit", &format_args!("{:#07x}", self.limit()))
            .field("access", &format_args!("{:#04x}", self.access))
            .field("granularity", &format_args!("{:#04x}", self.granularity))
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
    fn test_entry_size() {
        assert_eq!(size_of::<SegmentDescriptor>(), 8);
    }

    #[test]
    fn test_null_entry() {
        let entry = SegmentDescriptor::null();
        assert!(entry.is_null());
        assert_eq!(entry.to_bytes(), [0; 8]);
        assert_eq!(entry, SegmentDescriptor::default());
    }

    #[test]
    fn test_access_constants() {
        assert_eq!(AccessByte::KERNEL_CODE.bits(), 0x9A);
        assert_eq!(AccessByte::KERNEL_DATA.bits(), 0x92);
        assert_eq!(DescriptorFlags::FLAT_32.bits(), 0xC0);
    }

    #[test]
    fn test_kernel_code_bytes() {
        let entry = SegmentDescriptor::kernel_code();
        assert_eq!(
            entry.to_bytes(),
            [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x9A, 0xCF, 0x00]
        );
        assert!(entry.is_present());
        assert!(entry.is_code());
        assert_eq!(entry.dpl(), 0);
    }

    #[test]
    fn test_kernel_data_bytes() {
        let entry = SegmentDescriptor::kernel_data();
        assert_eq!(
            entry.to_bytes(),
            [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x92, 0xCF, 0x00]
        );
        assert!(entry.is_present());
        assert!(!entry.is_code());
    }

    #[test]
    fn test_oversized_limit_does_not_leak_into_flags() {
        // Bits above 19 must not set AVL/L in the granularity byte.
        let entry = SegmentDescriptor::from_raw_parts(0, u32::MAX, 0x92, 0xC0);
        assert_eq!(entry.granularity_byte(), 0xCF);
        assert!(!entry.flags().contains(DescriptorFlags::LONG_MODE));
        assert!(!entry.flags().contains(DescriptorFlags::AVAILABLE));
        assert_eq!(entry.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_flag_low_nibble_is_masked() {
        let entry = SegmentDescriptor::from_raw_parts(0, 0x3_0000, 0x92, 0xCF);
        assert_eq!(entry.granularity_byte(), 0xC3);
        assert_eq!(entry.limit(), 0x3_0000);
    }

    #[test]
    fn test_base_split() {
        let entry = SegmentDescriptor::new(
            0xDEAD_BEEF,
            0x1234,
            AccessByte::KERNEL_DATA,
            DescriptorFlags::empty(),
        );
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[2..5], &[0xEF, 0xBE, 0xAD]);
        assert_eq!(bytes[7], 0xDE);
        assert_eq!(entry.base(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_decode_recovers_fields() {
        let cases = [
            (0u32, 0u32, 0x9Au8, 0xC0u8),
            (0xFFFF_FFFF, 0xF_FFFF, 0xF2, 0x90),
            (0x0010_0000, 0xABCDE, 0x82, 0x00),
            (0x1234_5678, 0xFFF0_0042, 0xFA, 0x40),
        ];

        for (base, limit, access, flags) in cases {
            let entry = SegmentDescriptor::from_raw_parts(base, limit, access, flags);
            let decoded = SegmentDescriptor::from_bytes(entry.to_bytes());
            assert_eq!(decoded.base(), base);
            assert_eq!(decoded.limit(), limit & MAX_LIMIT);
            assert_eq!(decoded.access().bits(), access);
            assert_eq!(decoded.flags().bits(), flags);
        }
    }

    #[test]
    fn test_segment_size() {
        assert_eq!(SegmentDescriptor::kernel_code().segment_size(), 1 << 32);

        let small = SegmentDescriptor::new(
            0,
            0xFFFF,
            AccessByte::KERNEL_DATA,
            DescriptorFlags::SIZE_32,
        );
        assert_eq!(small.segment_size(), 0x1_0000);
    }

    #[test]
    fn test_checked_rejects_bad_input() {
        assert_eq!(
            SegmentDescriptor::checked(0, 0x10_0000, 0x92, 0xC0),
            Err(HalError::LimitOutOfRange { limit: 0x10_0000 })
        );
        assert_eq!(
            SegmentDescriptor::checked(0, 0xF_FFFF, 0x92, 0xCF),
            Err(HalError::InvalidFlags { flags: 0xCF })
        );
        assert_eq!(
            SegmentDescriptor::checked(0, 0xF_FFFF, 0x9A, 0xC0),
            Ok(SegmentDescriptor::kernel_code())
        );
    }

    #[test]
    fn test_with_dpl() {
        let user = AccessByte::KERNEL_DATA.with_dpl(3);
        assert_eq!(user.bits(), 0xF2);
        assert_eq!(user.dpl(), 3);
        assert_eq!(user.with_dpl(0), AccessByte::KERNEL_DATA);
    }
}
