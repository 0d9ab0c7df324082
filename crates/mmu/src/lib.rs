#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # Virtual-Memory Mapping Layer
//!
//! Architecture-abstracted virtual-memory mapping for a kernel. It provides:
//!
//! - Distinct physical/virtual address types with per-architecture validation.
//! - An architecture-neutral page-table-entry codec (protection + attribute
//!   flags to and from hardware bit layouts).
//! - Per-address-space page-table management: mapping, unmapping, translation
//!   queries, large pages, and teardown.
//! - A complete walker for x86_64, a software-emulated architecture for
//!   host-side testing, and a deterministic fallback for architectures
//!   without a walker.
//!
//! Physical frames, translation-cache shootdown, and address-space lifecycle
//! policy are external collaborators, reached through the [`FrameAllocator`]
//! and [`TlbMaintenance`] traits.

mod address;
mod address_space;
mod arch;
mod error;
mod frame;
mod mapper;
mod protection;
mod tlb;

pub use address::{AddressTranslator, PhysicalAddress, VirtualAddress};
pub use address_space::{
    AddressSpace, AddressSpaceId, current_address_space, translate_current,
};
pub use error::{Error, RangeError};
#[cfg(any(test, feature = "software-emulation"))]
pub use frame::EmulatedFrameAllocator;
pub use frame::FrameAllocator;
pub use protection::{Decoded, MappingFlags, Protection};
pub use tlb::{LocalFlush, TlbMaintenance};

pub use arch::{HAS_LARGE_PAGES, LARGE_PAGE_SIZE, PAGE_SIZE, PAGE_TABLE_LEVELS};
