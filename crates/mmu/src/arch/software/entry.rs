//! Page table entry for the software-emulated architecture.

use crate::PhysicalAddress;
use crate::protection::{Decoded, MappingFlags, Protection};

use super::flags::PageFlags;

/// A single emulated page-table entry: physical frame bits 6-17, flag bits
/// below and above (see [`PageFlags`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(usize);

impl PageEntry {
    /// Physical address mask (bits 6-17; 64-byte aligned, 18-bit space).
    const ADDRESS_MASK: usize = 0x3FFC0;

    /// Encodes a leaf entry from protection, attribute flags, and the target
    /// frame.
    pub fn encode(
        protection: Protection,
        flags: MappingFlags,
        address: PhysicalAddress,
    ) -> Self {
        debug_assert!(
            address.is_aligned(super::PAGE_SIZE),
            "physical address must be page-aligned"
        );
        let addr_bits = address.as_usize() & Self::ADDRESS_MASK;
        Self(addr_bits | PageFlags::leaf(protection, flags).to_raw())
    }

    /// Encodes an intermediate entry pointing at the next table level.
    pub fn intermediate(table: PhysicalAddress) -> Self {
        debug_assert!(
            table.is_aligned(super::PAGE_SIZE),
            "table address must be page-aligned"
        );
        let addr_bits = table.as_usize() & Self::ADDRESS_MASK;
        Self(addr_bits | PageFlags::intermediate().to_raw())
    }

    /// Decodes this entry. Total: any bit pattern decodes, reserved bits are
    /// masked out.
    pub fn decode(self) -> Decoded {
        let flags = self.flags();
        let (protection, mapping) = flags.decode();
        Decoded {
            protection,
            flags: mapping,
            address: self.address(),
            present: flags.is_present(),
            accessed: flags.accessed(),
            dirty: flags.dirty(),
        }
    }

    /// Returns the flag bits of this entry.
    pub fn flags(self) -> PageFlags {
        PageFlags::from_raw(self.0)
    }

    /// Returns the physical address recorded in this entry, present or not.
    pub fn address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 & Self::ADDRESS_MASK)
    }

    /// Returns whether the entry is all-zero (nothing recorded).
    pub fn is_unused(self) -> bool {
        self.0 == 0
    }

    /// Returns whether the present bit is set.
    pub fn is_present(self) -> bool {
        self.flags().is_present()
    }

    /// Returns whether the page-size bit is set (leaf above level 0).
    pub fn is_huge(self) -> bool {
        self.flags().is_huge()
    }

    /// Clears the entry.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Returns the raw value of this entry.
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for PageEntry {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl Default for PageEntry {
    fn default() -> Self {
        Self(0)
    }
}
