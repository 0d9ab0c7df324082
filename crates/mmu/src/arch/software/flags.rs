//! Page-table entry flags for the software-emulated architecture.

use crate::protection::{MappingFlags, Protection};

/// The flag bits of one emulated page-table entry.
///
/// Low flags sit below the address field, high flags above it, mirroring how
/// real formats scatter their bits:
///
/// - bit 0: present, 1: writable, 2: user, 3: write-through,
///   4: cache-disable, 5: page-size
/// - bit 52: accessed, 53: dirty, 54: global
/// - bit 63: execute-disable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags(usize);

impl PageFlags {
    const PRESENT: usize = 1 << 0;
    const WRITABLE: usize = 1 << 1;
    const USER: usize = 1 << 2;
    const WRITE_THROUGH: usize = 1 << 3;
    const CACHE_DISABLE: usize = 1 << 4;
    const PAGE_SIZE: usize = 1 << 5;
    const ACCESSED: usize = 1 << 52;
    const DIRTY: usize = 1 << 53;
    const GLOBAL: usize = 1 << 54;
    const NO_EXECUTE: usize = 1 << 63;

    /// Every bit the model defines; anything else is reserved and ignored.
    pub(super) const ALL: usize = Self::PRESENT
        | Self::WRITABLE
        | Self::USER
        | Self::WRITE_THROUGH
        | Self::CACHE_DISABLE
        | Self::PAGE_SIZE
        | Self::ACCESSED
        | Self::DIRTY
        | Self::GLOBAL
        | Self::NO_EXECUTE;

    /// Creates empty flags (entry not present).
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds the flag bits for a leaf entry. Same shape as the reference
    /// architecture: execute permission is inverted, no-access clears the
    /// present bit.
    pub fn leaf(protection: Protection, flags: MappingFlags) -> Self {
        let mut bits = 0;
        if protection.readable() {
            bits |= Self::PRESENT;
        }
        if protection.writable() {
            bits |= Self::WRITABLE;
        }
        if !protection.executable() {
            bits |= Self::NO_EXECUTE;
        }
        if flags.contains(MappingFlags::UNCACHED) {
            bits |= Self::CACHE_DISABLE;
        }
        if flags.contains(MappingFlags::WRITE_THROUGH) {
            bits |= Self::WRITE_THROUGH;
        }
        if flags.contains(MappingFlags::USER) {
            bits |= Self::USER;
        }
        if flags.contains(MappingFlags::GLOBAL) {
            bits |= Self::GLOBAL;
        }
        if flags.contains(MappingFlags::LARGE_PAGE) {
            bits |= Self::PAGE_SIZE;
        }
        Self(bits)
    }

    /// Builds the flag bits for an intermediate (table-pointer) entry.
    pub fn intermediate() -> Self {
        Self(Self::PRESENT | Self::WRITABLE | Self::USER)
    }

    /// Decodes the flag bits back into architecture-neutral terms.
    pub fn decode(self) -> (Protection, MappingFlags) {
        let mut flags = MappingFlags::empty();
        if self.0 & Self::CACHE_DISABLE != 0 {
            flags |= MappingFlags::UNCACHED;
        }
        if self.0 & Self::WRITE_THROUGH != 0 {
            flags |= MappingFlags::WRITE_THROUGH;
        }
        if self.0 & Self::USER != 0 {
            flags |= MappingFlags::USER;
        }
        if self.0 & Self::GLOBAL != 0 {
            flags |= MappingFlags::GLOBAL;
        }
        if self.0 & Self::PAGE_SIZE != 0 {
            flags |= MappingFlags::LARGE_PAGE;
        }

        let protection = if !self.is_present() {
            Protection::None
        } else {
            let writable = self.0 & Self::WRITABLE != 0;
            let no_execute = self.0 & Self::NO_EXECUTE != 0;
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
    pub const fn is_present(self) -> bool {
        self.0 & Self::PRESENT != 0
    }

    /// Returns whether the page-size bit is set.
    pub const fn is_huge(self) -> bool {
        self.0 & Self::PAGE_SIZE != 0
    }

    /// Hardware-maintained accessed bit.
    pub const fn accessed(self) -> bool {
        self.0 & Self::ACCESSED != 0
    }

    /// Hardware-maintained dirty bit.
    pub const fn dirty(self) -> bool {
        self.0 & Self::DIRTY != 0
    }

    /// Returns the raw bit value of these flags.
    pub const fn to_raw(self) -> usize {
        self.0
    }

    /// Creates flags from raw entry bits, dropping unknown bits.
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw & Self::ALL)
    }
}

impl Default for PageFlags {
    fn default() -> Self {
        Self::empty()
    }
}
