//! Page table structure for x86_64.

use super::entry::PageEntry;

/// Number of entries in an x86_64 page table.
const ENTRY_COUNT: usize = 512;

/// One level of the x86_64 hierarchy: 512 entries filling exactly one 4 KiB
/// frame.
///
/// Tables are never owned as Rust values; they live in physical frames and
/// are viewed through the direct map. The walker is the only code that
/// mutates them.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntry; ENTRY_COUNT],
}

// The hierarchy links tables by physical frame, so the struct must cover a
// frame exactly.
const _: () = assert!(core::mem::size_of::<PageTable>() == super::PAGE_SIZE);

impl PageTable {
    /// Returns the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 512`.
    pub fn entry(&self, index: usize) -> PageEntry {
        assert!(index < ENTRY_COUNT, "page table index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 512`.
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
