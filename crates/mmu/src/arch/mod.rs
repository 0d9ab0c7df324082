//! Architecture-specific page-table formats and hardware access.
//!
//! Exactly one architecture is active at a time, selected here:
//!
//! - x86_64 hardware paging when targeting x86_64 outside of tests.
//! - The software-emulated architecture during tests or with the
//!   `software-emulation` feature, so the walker runs on any host.
//! - The unsupported fallback everywhere else: deterministic failure
//!   instead of best-effort translation.
//!
//! Inactive modules are still compiled where possible so their unit tests
//! and rust-analyzer coverage stay alive.

#[cfg(target_arch = "x86_64")]
#[cfg_attr(any(test, feature = "software-emulation"), allow(dead_code))]
mod x86_64;
#[cfg(all(target_arch = "x86_64", not(test), not(feature = "software-emulation")))]
pub use x86_64::*;

#[cfg(any(test, feature = "software-emulation"))]
mod software;
#[cfg(any(test, feature = "software-emulation"))]
pub use software::*;

#[cfg(any(
    test,
    all(not(target_arch = "x86_64"), not(feature = "software-emulation"))
))]
#[cfg_attr(test, allow(dead_code))]
mod unsupported;
#[cfg(all(
    not(target_arch = "x86_64"),
    not(test),
    not(feature = "software-emulation")
))]
pub use unsupported::*;
