//! Fallback for architectures without a page-table walker.
//!
//! Policy: fail deterministically, never translate on a best-effort basis.
//! Mapping operations are refused with `Unsupported` before any state is
//! touched, there is no current address space, and `translate_current`
//! degrades to the identity function — which is only correct while the
//! execution mode guarantees virtual == physical (early boot, MMU off).
//! Once a port gains a real walker it replaces this module wholesale.

use crate::PhysicalAddress;
use crate::protection::{Decoded, MappingFlags, Protection};
use crate::VirtualAddress;

/// No walker exists; the mapping service refuses every mutation.
pub const SUPPORTED: bool = false;

/// Physical width is unknown; accept everything so identity translation
/// stays total.
pub const MAX_PHYSICAL_BITS: usize = 64;

/// Virtual width is unknown; accept everything.
pub const MAX_VIRTUAL_BITS: usize = 64;

/// Nominal page granularity for argument validation.
pub const PAGE_SIZE: usize = 4096;

/// A single nominal level; the walker never runs.
pub const PAGE_TABLE_LEVELS: usize = 1;

/// Large pages cannot be requested without a walker.
pub const HAS_LARGE_PAGES: bool = false;

/// Unused; present to complete the architecture contract.
pub const LARGE_PAGE_LEVEL: usize = 0;

/// Unused; present to complete the architecture contract.
pub const LARGE_PAGE_SIZE: usize = PAGE_SIZE;

/// No index bits are defined without a table format.
#[inline]
pub const fn page_index(_address: usize, _level: usize) -> usize {
    0
}

/// Every physical address is accepted.
#[inline]
pub const fn validate_physical(_addr: usize) -> bool {
    true
}

/// Every virtual address is accepted.
#[inline]
pub const fn validate_virtual(_addr: usize) -> bool {
    true
}

/// There is never a current address space ("no address space" sentinel).
pub fn current_root() -> Option<PhysicalAddress> {
    None
}

/// No translation base exists to load.
///
/// # Safety
///
/// Trivially safe; kept `unsafe` to match the architecture contract.
pub unsafe fn activate_root(_root: PhysicalAddress) {}

/// No translation cache exists to flush.
pub fn flush_page(_virt: VirtualAddress) {}

/// No translation cache exists to flush.
pub fn flush_all() {}

/// Placeholder entry type; no walker ever constructs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(usize);

impl PageEntry {
    pub fn encode(
        _protection: Protection,
        _flags: MappingFlags,
        _address: PhysicalAddress,
    ) -> Self {
        Self(0)
    }

    pub fn intermediate(_table: PhysicalAddress) -> Self {
        Self(0)
    }

    pub fn decode(self) -> Decoded {
        Decoded {
            protection: Protection::None,
            flags: MappingFlags::empty(),
            address: PhysicalAddress::new(0),
            present: false,
            accessed: false,
            dirty: false,
        }
    }

    pub fn address(self) -> PhysicalAddress {
        PhysicalAddress::new(0)
    }

    pub fn is_unused(self) -> bool {
        true
    }

    pub fn is_present(self) -> bool {
        false
    }

    pub fn is_huge(self) -> bool {
        false
    }

    pub fn clear(&mut self) {}

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// Placeholder table type; no walker ever reaches one.
#[repr(C)]
pub struct PageTable {
    entries: [PageEntry; 1],
}

impl PageTable {
    pub fn entry(&self, _index: usize) -> PageEntry {
        self.entries[0]
    }

    pub fn entry_mut(&mut self, _index: usize) -> &mut PageEntry {
        &mut self.entries[0]
    }

    pub const fn len(&self) -> usize {
        1
    }

    pub fn is_vacant(&self) -> bool {
        true
    }
}
