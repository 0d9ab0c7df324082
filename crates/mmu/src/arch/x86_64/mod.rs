//! x86_64 4-level paging.
//!
//! The reference architecture: 4 KiB base pages, 2 MiB large pages at the
//! page-directory level, 9-bit table indexes, 48-bit canonical virtual
//! addresses. The entry bit layout is fixed by hardware (present, writable,
//! user, write-through, cache-disable, accessed, dirty, page-size, global in
//! bits 0-8; execute-disable in bit 63) and must match it exactly.

mod entry;
mod flags;
mod table;

pub use entry::PageEntry;
pub use flags::PageFlags;
pub use table::PageTable;

use crate::{PhysicalAddress, VirtualAddress};

/// A complete walker exists for this architecture.
pub const SUPPORTED: bool = true;

/// Maximum physical address width. 52 bits on paper; 48 is the conservative
/// default for real CPUs.
pub const MAX_PHYSICAL_BITS: usize = 48;

/// Maximum virtual address width with 4-level paging.
pub const MAX_VIRTUAL_BITS: usize = 48;

/// Base page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 4096;

/// Number of page table levels (4-level paging).
pub const PAGE_TABLE_LEVELS: usize = 4;

/// Large-page leaves are supported (2 MiB at the page-directory level).
pub const HAS_LARGE_PAGES: bool = true;

/// Level at which a large-page leaf terminates the walk.
pub const LARGE_PAGE_LEVEL: usize = 1;

/// Large page size in bytes (2 MiB).
pub const LARGE_PAGE_SIZE: usize = PAGE_SIZE << 9;

/// Returns the page table index for a virtual address at the given level.
///
/// Each level consumes 9 bits: level 0 is the page table (PT), level 1 the
/// page directory (PD), level 2 the PDPT, and level 3 the PML4.
#[inline]
pub const fn page_index(address: usize, level: usize) -> usize {
    assert!(level < PAGE_TABLE_LEVELS, "level out of range for x86_64");
    let shift = 12 + level * 9;
    (address >> shift) & 0x1FF
}

/// Validates a physical address against the maximum physical width.
#[inline]
pub const fn validate_physical(addr: usize) -> bool {
    addr < (1usize << MAX_PHYSICAL_BITS)
}

/// Validates that a virtual address is canonical (bits 48-63 sign-extended
/// from bit 47).
#[inline]
pub const fn validate_virtual(addr: usize) -> bool {
    let canonical = if (addr & (1 << 47)) != 0 {
        addr | 0xFFFF_0000_0000_0000
    } else {
        addr & 0x0000_FFFF_FFFF_FFFF
    };
    canonical == addr
}

/// Returns the physical address of the active root table, from CR3.
pub fn current_root() -> Option<PhysicalAddress> {
    let (frame, _) = x86_64::registers::control::Cr3::read();
    Some(PhysicalAddress::new(frame.start_address().as_u64() as usize))
}

/// Loads `root` into CR3, making its hierarchy the active address space.
///
/// # Safety
///
/// `root` must be the root table of a hierarchy that maps the kernel, the
/// current stack, and the direct map; loading anything else loses control of
/// the machine.
pub unsafe fn activate_root(root: PhysicalAddress) {
    use x86_64::registers::control::{Cr3, Cr3Flags};
    use x86_64::structures::paging::PhysFrame;

    let frame = PhysFrame::containing_address(x86_64::PhysAddr::new(root.as_usize() as u64));
    // SAFETY: Guaranteed by the caller.
    unsafe {
        Cr3::write(frame, Cr3Flags::empty());
    }
}

/// Invalidates the local TLB entry for one page.
pub fn flush_page(virt: VirtualAddress) {
    x86_64::instructions::tlb::flush(x86_64::VirtAddr::new(virt.as_usize() as u64));
}

/// Invalidates the entire local TLB (global pages excepted).
pub fn flush_all() {
    x86_64::instructions::tlb::flush_all();
}
