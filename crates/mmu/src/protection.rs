//! Protection and mapping-attribute types shared by every architecture.

use bitflags::bitflags;

use crate::PhysicalAddress;

/// Access protection for a mapping.
///
/// This is a closed set: write access and execute access always imply read
/// access, matching what the page-table formats of the supported
/// architectures can express. Write-only or execute-only mappings are
/// unrepresentable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// No access. The entry is installed non-present but still records the
    /// target frame; every access faults.
    None,
    /// Read access only.
    ReadOnly,
    /// Read and write access.
    ReadWrite,
    /// Read and execute access.
    ReadExecute,
    /// Read, write, and execute access.
    ReadWriteExecute,
}

impl Protection {
    /// Returns whether the mapping permits any access at all.
    pub const fn readable(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns whether the mapping permits writes.
    pub const fn writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::ReadWriteExecute)
    }

    /// Returns whether the mapping permits instruction fetch.
    pub const fn executable(self) -> bool {
        matches!(self, Self::ReadExecute | Self::ReadWriteExecute)
    }
}

bitflags! {
    /// Attribute modifiers for a mapping, orthogonal to [`Protection`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MappingFlags: u32 {
        /// Disable caching for the mapped range (device memory).
        const UNCACHED = 1 << 0;
        /// Write-through caching instead of write-back.
        const WRITE_THROUGH = 1 << 1;
        /// Accessible from user mode.
        const USER = 1 << 2;
        /// Shared across address spaces; survives translation-base switches.
        const GLOBAL = 1 << 3;
        /// Map with the architecture's large page size instead of the base
        /// page size.
        const LARGE_PAGE = 1 << 4;
    }
}

/// A page-table entry decoded back into architecture-neutral terms.
///
/// Decoding is total: any bit pattern decodes, with unknown or reserved bits
/// masked out. The accessed/dirty bits are hardware-maintained and reported
/// here read-only; they are never part of [`MappingFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Access protection encoded in the entry.
    pub protection: Protection,
    /// Attribute flags encoded in the entry.
    pub flags: MappingFlags,
    /// Target frame address recorded in the entry.
    pub address: PhysicalAddress,
    /// Whether the entry is present to the hardware.
    pub present: bool,
    /// Hardware-set: the page has been accessed since the bit was cleared.
    pub accessed: bool,
    /// Hardware-set: the page has been written since the bit was cleared.
    pub dirty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protection_accessors() {
        assert!(!Protection::None.readable());
        assert!(Protection::ReadOnly.readable());
        assert!(!Protection::ReadOnly.writable());
        assert!(Protection::ReadWrite.writable());
        assert!(!Protection::ReadWrite.executable());
        assert!(Protection::ReadExecute.executable());
        assert!(!Protection::ReadExecute.writable());
        assert!(Protection::ReadWriteExecute.writable());
        assert!(Protection::ReadWriteExecute.executable());
    }

    #[test]
    fn flags_are_orthogonal() {
        let flags = MappingFlags::UNCACHED | MappingFlags::USER;
        assert!(flags.contains(MappingFlags::UNCACHED));
        assert!(flags.contains(MappingFlags::USER));
        assert!(!flags.contains(MappingFlags::GLOBAL));
        assert!(!flags.contains(MappingFlags::LARGE_PAGE));
    }
}
