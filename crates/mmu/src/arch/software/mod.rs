//! Software-emulated architecture for testing and development.
//!
//! A scale model of the x86_64 reference architecture that runs on any host:
//!
//! - 18-bit addresses (vs 48-bit), sign-extended from bit 17
//! - The same 4 levels of page tables
//! - 3-bit indexes (8 entries per table, vs 9-bit/512)
//! - 6-bit page offset (64-byte pages, vs 12-bit/4 KiB)
//! - Large-page leaves one level up (512-byte pages, vs 2 MiB)
//!
//! The walker therefore exercises the full hierarchy depth and flag set of
//! the real architecture while a whole test address space fits in a few
//! kilobytes of simulated physical memory.

mod entry;
mod flags;
mod table;

pub use entry::PageEntry;
pub use flags::PageFlags;
pub use table::PageTable;

use core::cell::Cell;

use crate::{PhysicalAddress, VirtualAddress};

/// A complete walker exists for this architecture.
pub const SUPPORTED: bool = true;

/// Maximum physical address width.
pub const MAX_PHYSICAL_BITS: usize = 18;

/// Maximum virtual address width.
pub const MAX_VIRTUAL_BITS: usize = 18;

/// Base page size in bytes.
pub const PAGE_SIZE: usize = 64;

/// Number of page table levels.
pub const PAGE_TABLE_LEVELS: usize = 4;

/// Large-page leaves are supported.
pub const HAS_LARGE_PAGES: bool = true;

/// Level at which a large-page leaf terminates the walk.
pub const LARGE_PAGE_LEVEL: usize = 1;

/// Large page size in bytes (one full leaf table's reach).
pub const LARGE_PAGE_SIZE: usize = PAGE_SIZE << 3;

/// Returns the page table index for a virtual address at the given level.
///
/// Each level consumes 3 bits above the 6-bit page offset.
#[inline]
pub const fn page_index(address: usize, level: usize) -> usize {
    assert!(
        level < PAGE_TABLE_LEVELS,
        "level out of range for the software model"
    );
    let shift = 6 + level * 3;
    (address >> shift) & 0x7
}

/// Validates a physical address against the maximum physical width.
#[inline]
pub const fn validate_physical(addr: usize) -> bool {
    addr < (1usize << MAX_PHYSICAL_BITS)
}

/// Validates that a virtual address is canonical (bits 18-63 sign-extended
/// from bit 17).
#[inline]
pub const fn validate_virtual(addr: usize) -> bool {
    let canonical = if (addr & (1 << 17)) != 0 {
        addr | !0x3FFFF
    } else {
        addr & 0x3FFFF
    };
    canonical == addr
}

std::thread_local! {
    /// Active root table, standing in for the hardware translation base.
    /// Zero means none; frame 0 is reserved by the emulated memory.
    static CURRENT_ROOT: Cell<usize> = const { Cell::new(0) };
}

/// Returns the physical address of the active root table, if one has been
/// activated on this thread.
pub fn current_root() -> Option<PhysicalAddress> {
    CURRENT_ROOT.with(|root| match root.get() {
        0 => None,
        addr => Some(PhysicalAddress::new(addr)),
    })
}

/// Makes `root` the active address space for this thread.
///
/// # Safety
///
/// `root` must be the root table of a live hierarchy. (The emulation does
/// not dereference it implicitly, but callers must uphold the same contract
/// as on hardware.)
pub unsafe fn activate_root(root: PhysicalAddress) {
    CURRENT_ROOT.with(|current| current.set(root.as_usize()));
}

/// Translation-cache flush for one page. The emulation caches nothing, so
/// this only has to exist.
pub fn flush_page(_virt: VirtualAddress) {}

/// Full translation-cache flush; a no-op in the emulation.
pub fn flush_all() {}

/// Simulated physical memory for the emulated architecture.
///
/// Provides the backing store that page-table frames are carved out of, so
/// walker behavior can be tested without hardware or host-OS paging.
pub struct EmulatedMemory {
    /// Frame-aligned backing store, so frame-aligned physical addresses
    /// translate to pointers aligned for [`PageTable`].
    memory: Vec<AlignedFrame>,
    /// Next bump-allocation offset.
    next_alloc: core::sync::atomic::AtomicUsize,
}

/// One frame of backing store, aligned like the tables it may hold.
#[derive(Clone)]
#[repr(C, align(64))]
struct AlignedFrame([u8; PAGE_SIZE]);

impl EmulatedMemory {
    /// Creates an emulated physical memory of `size` bytes.
    ///
    /// Frame 0 is reserved so that zero can serve as the null root sentinel.
    pub fn new(size: usize) -> Self {
        Self {
            memory: vec![AlignedFrame([0u8; PAGE_SIZE]); size.div_ceil(PAGE_SIZE)],
            next_alloc: core::sync::atomic::AtomicUsize::new(PAGE_SIZE),
        }
    }

    /// Backing store size in bytes.
    fn len(&self) -> usize {
        self.memory.len() * PAGE_SIZE
    }

    /// Allocates a block of simulated physical memory.
    ///
    /// Returns the physical address, or `None` when the buffer is exhausted.
    pub fn allocate(&self, size: usize, align: usize) -> Option<usize> {
        use core::sync::atomic::Ordering;

        loop {
            let current = self.next_alloc.load(Ordering::Relaxed);
            let aligned = (current + align - 1) & !(align - 1);
            let end = aligned + size;
            if end > self.len() {
                return None;
            }
            if self
                .next_alloc
                .compare_exchange(current, end, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(aligned);
            }
        }
    }

    /// Translates a physical address to a pointer into the buffer.
    pub fn translate(&self, phys: usize) -> *mut u8 {
        assert!(phys < self.len(), "physical address out of bounds");
        unsafe { (self.memory.as_ptr() as *mut u8).add(phys) }
    }

    /// Translates a pointer into the buffer back to a physical address.
    pub fn ptr_to_phys(&self, ptr: *const u8) -> usize {
        let offset = unsafe { ptr.offset_from(self.memory.as_ptr() as *const u8) };
        assert!(offset >= 0, "pointer not within emulated memory");
        assert!(
            (offset as usize) < self.len(),
            "pointer not within emulated memory"
        );
        offset as usize
    }
}
