//! # x86 Architecture HAL Implementation
//!
//! Hardware support for 32-bit x86 in protected mode.
//!
//! ## Module Organization
//!
//! - [`segmentation`]: Flat GDT construction and activation
//!   - [`segmentation::descriptor`]: Segment descriptor encoding
//!   - [`segmentation::table`]: Descriptor table and GDTR image
//!   - [`segmentation::selectors`]: Type-safe segment selectors
//!   - [`segmentation::builder`]: Kernel table builder and install
//!   - [`segmentation::loader`]: `lgdt` and segment register reload
//!
//! Only [`segmentation::loader`] contains inline assembly and it is compiled
//! for `target_arch = "x86"` only; the rest builds and tests on any host.

pub mod segmentation;
