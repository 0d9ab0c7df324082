//! Page table structure for the software-emulated architecture.

use super::entry::PageEntry;

/// Number of entries in an emulated page table (3-bit indexes).
const ENTRY_COUNT: usize = 8;

/// One level of the emulated hierarchy: 8 entries filling exactly one
/// 64-byte frame, so the frame-backed table discipline matches hardware.
#[repr(C, align(64))]
pub struct PageTable {
    entries: [PageEntry; ENTRY_COUNT],
}

const _: () = assert!(core::mem::size_of::<PageTable>() == super::PAGE_SIZE);

impl PageTable {
    /// Returns the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    pub fn entry(&self, index: usize) -> PageEntry {
        assert!(index < ENTRY_COUNT, "page table index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    pub fn entry_mut(&mut self, index: usize) -> &mut PageEntry {
        assert!(index < ENTRY_COUNT, "page table index out of bounds");
        &mut self.entries[index]
    }

    /// Returns the number of entries in this table.
    pub const fn len(&self) -> usize {
        ENTRY_COUNT
    }

    /// Returns whether every entry is unused, making the table eligible for
    /// release.
    pub fn is_vacant(&self) -> bool {
        self.entries.iter().all(|entry| entry.is_unused())
    }
}
