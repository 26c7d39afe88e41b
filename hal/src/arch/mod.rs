//! # Architecture Support
//!
//! The descriptor encoding is plain data and is compiled everywhere so it can
//! be unit tested on the build host. Instructions that only exist on the
//! target live behind `cfg(target_arch)` inside each architecture module.

pub mod x86;
