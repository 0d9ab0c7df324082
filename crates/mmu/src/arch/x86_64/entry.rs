//! Page table entry for x86_64.

use crate::PhysicalAddress;
use crate::protection::{Decoded, MappingFlags, Protection};

use super::flags::PageFlags;

/// A single x86_64 page-table entry: physical frame bits 12-51, flag bits
/// elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(usize);

impl PageEntry {
    /// Physical address mask (bits 12-51, 52-bit physical addresses).
    const ADDRESS_MASK: usize = 0x000F_FFFF_FFFF_F000;

    /// Flag bits mask (bits 0-11 and 52-63).
    const FLAGS_MASK: usize = !Self::ADDRESS_MASK;

    /// Encodes a leaf entry from protection, attribute flags, and the target
    /// frame. Pure; the only failure mode is the alignment debug assertion.
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
        let flag_bits = PageFlags::leaf(protection, flags).to_raw() & Self::FLAGS_MASK;
        Self(addr_bits | flag_bits)
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
        PageFlags::from_raw(self.0 & Self::FLAGS_MASK)
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

#[cfg(test)]
mod tests {
    use super::*;

    // Test addresses stay small: in test builds the address types validate
    // against the active (software) architecture.

    #[test]
    fn encode_is_bit_exact() {
        let entry = PageEntry::encode(
            Protection::ReadWrite,
            MappingFlags::empty(),
            PhysicalAddress::new(0x1000),
        );
        assert_eq!(entry.as_usize(), 0x1000 | 0x3 | (1 << 63));
    }

    #[test]
    fn round_trip_all_protections() {
        let address = PhysicalAddress::new(0x2000);
        for protection in [
            Protection::ReadOnly,
            Protection::ReadWrite,
            Protection::ReadExecute,
            Protection::ReadWriteExecute,
        ] {
            let flags = MappingFlags::USER | MappingFlags::GLOBAL;
            let decoded = PageEntry::encode(protection, flags, address).decode();
            assert_eq!(decoded.protection, protection);
            assert_eq!(decoded.flags, flags);
            assert_eq!(decoded.address, address);
            assert!(decoded.present);
            assert!(!decoded.accessed);
            assert!(!decoded.dirty);
        }
    }

    #[test]
    fn no_access_keeps_frame() {
        let address = PhysicalAddress::new(0x3000);
        let entry = PageEntry::encode(Protection::None, MappingFlags::empty(), address);
        assert!(!entry.is_present());
        assert!(!entry.is_unused());
        let decoded = entry.decode();
        assert_eq!(decoded.protection, Protection::None);
        assert_eq!(decoded.address, address);
        assert!(!decoded.present);
    }

    #[test]
    fn intermediate_is_present_and_permissive() {
        let entry = PageEntry::intermediate(PhysicalAddress::new(0x1000));
        assert!(entry.is_present());
        assert!(!entry.is_huge());
        assert_eq!(entry.address(), PhysicalAddress::new(0x1000));
        // P | RW | US.
        assert_eq!(entry.as_usize() & 0xFFF, 0x7);
    }

    #[test]
    fn hardware_set_bits_are_reported() {
        let entry = PageEntry::encode(
            Protection::ReadWrite,
            MappingFlags::empty(),
            PhysicalAddress::new(0x1000),
        );
        // Simulate the MMU setting accessed (bit 5) and dirty (bit 6).
        let touched = PageEntry::from(entry.as_usize() | (1 << 5) | (1 << 6));
        let decoded = touched.decode();
        assert!(decoded.accessed);
        assert!(decoded.dirty);
        // A/D never leak into the mapping flags.
        assert_eq!(decoded.flags, MappingFlags::empty());
    }
}
