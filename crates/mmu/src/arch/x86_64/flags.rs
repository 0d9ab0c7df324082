//! Page-table entry flags for x86_64.

use x86_64::structures::paging::PageTableFlags;

use crate::protection::{MappingFlags, Protection};

/// The flag bits of one x86_64 page-table entry.
///
/// Wraps the `x86_64` crate's flag constants, whose bit positions match the
/// hardware layout: P=0, RW=1, US=2, PWT=3, PCD=4, A=5, D=6, PS=7, G=8,
/// XD=63.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags(PageTableFlags);

impl PageFlags {
    /// Creates empty flags (entry not present).
    pub const fn empty() -> Self {
        Self(PageTableFlags::empty())
    }

    /// Builds the flag bits for a leaf entry.
    ///
    /// Execute permission is expressed inverted (XD), so a non-executable
    /// protection sets the bit. A non-readable protection clears the present
    /// bit; the entry then faults on every access while keeping its frame.
    pub fn leaf(protection: Protection, flags: MappingFlags) -> Self {
        let mut bits = PageTableFlags::empty();
        if protection.readable() {
            bits |= PageTableFlags::PRESENT;
        }
        if protection.writable() {
            bits |= PageTableFlags::WRITABLE;
        }
        if !protection.executable() {
            bits |= PageTableFlags::NO_EXECUTE;
        }
        if flags.contains(MappingFlags::UNCACHED) {
            bits |= PageTableFlags::NO_CACHE;
        }
        if flags.contains(MappingFlags::WRITE_THROUGH) {
            bits |= PageTableFlags::WRITE_THROUGH;
        }
        if flags.contains(MappingFlags::USER) {
            bits |= PageTableFlags::USER_ACCESSIBLE;
        }
        if flags.contains(MappingFlags::GLOBAL) {
            bits |= PageTableFlags::GLOBAL;
        }
        if flags.contains(MappingFlags::LARGE_PAGE) {
            bits |= PageTableFlags::HUGE_PAGE;
        }
        Self(bits)
    }

    /// Builds the flag bits for an intermediate (table-pointer) entry.
    ///
    /// Intermediate levels are permissive; the leaf entry is authoritative
    /// for protection.
    pub fn intermediate() -> Self {
        Self(PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE)
    }

    /// Decodes the flag bits back into architecture-neutral terms.
    ///
    /// Total: unknown or software-available bits are ignored.
    pub fn decode(self) -> (Protection, MappingFlags) {
        let mut flags = MappingFlags::empty();
        if self.0.contains(PageTableFlags::NO_CACHE) {
            flags |= MappingFlags::UNCACHED;
        }
        if self.0.contains(PageTableFlags::WRITE_THROUGH) {
            flags |= MappingFlags::WRITE_THROUGH;
        }
        if self.0.contains(PageTableFlags::USER_ACCESSIBLE) {
            flags |= MappingFlags::USER;
        }
        if self.0.contains(PageTableFlags::GLOBAL) {
            flags |= MappingFlags::GLOBAL;
        }
        if self.0.contains(PageTableFlags::HUGE_PAGE) {
            flags |= MappingFlags::LARGE_PAGE;
        }

        let protection = if !self.is_present() {
            Protection::None
        } else {
            let writable = self.0.contains(PageTableFlags::WRITABLE);
            let no_execute = self.0.contains(PageTableFlags::NO_EXECUTE);
            match (writable, no_execute) {
                (false, true) => Protection::ReadOnly,
                (true, true) => Protection::ReadWrite,
                (false, false) => Protection::ReadExecute,
                (true, false) => Protection::ReadWriteExecute,
            }
        };

        (protection, flags)
    }

    /// Returns whether the present bit is set.
    pub fn is_present(self) -> bool {
        self.0.contains(PageTableFlags::PRESENT)
    }

    /// Returns whether the page-size bit is set.
    pub fn is_huge(self) -> bool {
        self.0.contains(PageTableFlags::HUGE_PAGE)
    }

    /// Hardware-maintained accessed bit.
    pub fn accessed(self) -> bool {
        self.0.contains(PageTableFlags::ACCESSED)
    }

    /// Hardware-maintained dirty bit.
    pub fn dirty(self) -> bool {
        self.0.contains(PageTableFlags::DIRTY)
    }

    /// Returns the raw bit value of these flags.
    pub const fn to_raw(self) -> usize {
        self.0.bits() as usize
    }

    /// Creates flags from raw entry bits, dropping unknown bits.
    pub fn from_raw(raw: usize) -> Self {
        Self(PageTableFlags::from_bits_truncate(raw as u64))
    }
}

impl Default for PageFlags {
    fn default() -> Self {
        Self::empty()
    }
}
