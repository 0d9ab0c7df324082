//! Address spaces and the range-level mapping operations.
//!
//! An [`AddressSpace`] owns one page-table hierarchy: the root frame and
//! every intermediate table frame below it. Leaf target frames are never
//! owned here. All mutation and traversal of one space is serialized by the
//! lock inside it; distinct spaces share nothing but the external frame
//! allocator.

use crate::arch;
use crate::error::{Error, RangeError};
use crate::frame::FrameAllocator;
use crate::mapper::Mapper;
use crate::protection::{Decoded, MappingFlags, Protection};
use crate::tlb::TlbMaintenance;
use crate::{PhysicalAddress, VirtualAddress};

use core::fmt;

/// Identifies an address space by its root table frame.
///
/// Copyable and comparable, usable where holding the [`AddressSpace`] itself
/// is not possible (interrupt context, the TLB shootdown path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpaceId(usize);

impl AddressSpaceId {
    /// Sentinel for "no address space": before the first activation, or on
    /// an architecture without a walker. Frame 0 is never a table root.
    pub const NONE: Self = Self(0);

    /// Returns the root table frame address this id stands for.
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns whether this is the [`AddressSpaceId::NONE`] sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// One virtual address space: a root table frame plus the walker state over
/// it.
pub struct AddressSpace {
    root: PhysicalAddress,
    mapper: spin::Mutex<Mapper>,
}

impl AddressSpace {
    /// Creates an empty address space with a freshly allocated root table.
    ///
    /// Fails with [`Error::Unsupported`] when the architecture has no
    /// page-table walker, and [`Error::OutOfMemory`] when no frame is
    /// available for the root.
    pub fn new(allocator: &dyn FrameAllocator) -> Result<Self, Error> {
        if !arch::SUPPORTED {
            return Err(Error::Unsupported);
        }
        let mapper = Mapper::new(allocator)?;
        let root = mapper.root();
        log::debug!("created address space {root}");
        Ok(Self {
            root,
            mapper: spin::Mutex::new(mapper),
        })
    }

    /// Identifier of this address space.
    pub fn id(&self) -> AddressSpaceId {
        AddressSpaceId(self.root.as_usize())
    }

    /// Maps `size` bytes at `virt` to the physical range starting at `phys`.
    ///
    /// The granularity is one base page, or one large page when
    /// [`MappingFlags::LARGE_PAGE`] is set; `virt`, `phys`, and `size` must
    /// all be multiples of it. Installation is atomic per page: on failure
    /// the already-mapped prefix stays in place and
    /// [`RangeError::stopped_at`] names the first address not processed.
    ///
    /// Mapping over any occupied slot fails with
    /// [`Error::ConflictingMapping`]; unmap first. Because a successful call
    /// never replaces a live translation, no cache invalidation is needed on
    /// this path.
    pub fn map(
        &self,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        size: usize,
        protection: Protection,
        flags: MappingFlags,
        allocator: &dyn FrameAllocator,
    ) -> Result<(), RangeError> {
        let step = granularity(flags).map_err(|cause| RangeError {
            cause,
            stopped_at: virt,
        })?;
        validate_range(virt, size, step).map_err(|cause| RangeError {
            cause,
            stopped_at: virt,
        })?;
        if !phys.is_aligned(step) {
            return Err(RangeError {
                cause: Error::InvalidArgument,
                stopped_at: virt,
            });
        }

        let mut mapper = self.mapper.lock();
        let mut offset = 0;
        while offset < size {
            let page_virt = virt + offset;
            mapper
                .map_page(page_virt, phys + offset, protection, flags, allocator)
                .map_err(|cause| RangeError {
                    cause,
                    stopped_at: page_virt,
                })?;
            offset += step;
        }
        log::trace!(
            "mapped {size:#x} bytes at {virt} -> {phys} ({protection:?}, {flags:?}) in {}",
            self.id()
        );
        Ok(())
    }

    /// Removes every mapping in the `size` bytes starting at `virt` and
    /// invalidates the translation cache for the range.
    ///
    /// `virt` and `size` must be base-page aligned. Holes in the range are
    /// not an error. A large page is removed only when the range covers it
    /// entirely; a partial overlap fails with [`Error::ConflictingMapping`].
    /// Removal is atomic per page: on failure the prefix stays removed (and
    /// invalidated) and [`RangeError::stopped_at`] names the first address
    /// not processed. Intermediate tables left empty are returned to
    /// `allocator`.
    pub fn unmap(
        &self,
        virt: VirtualAddress,
        size: usize,
        allocator: &dyn FrameAllocator,
        tlb: &dyn TlbMaintenance,
    ) -> Result<(), RangeError> {
        validate_range(virt, size, arch::PAGE_SIZE).map_err(|cause| RangeError {
            cause,
            stopped_at: virt,
        })?;

        let mut mapper = self.mapper.lock();
        let mut offset = 0;
        while offset < size {
            let page_virt = virt + offset;
            match mapper.unmap_page(page_virt, size - offset, allocator) {
                Ok(spanned) => offset += spanned,
                Err(cause) => {
                    // The removed prefix must not stay cached.
                    if offset > 0 {
                        tlb.invalidate(self.id(), virt, offset);
                    }
                    return Err(RangeError {
                        cause,
                        stopped_at: page_virt,
                    });
                }
            }
        }
        // Invalidate before releasing the lock, so no new mapping for these
        // addresses can race with the stale cached entries.
        tlb.invalidate(self.id(), virt, size);
        log::trace!("unmapped {size:#x} bytes at {virt} in {}", self.id());
        Ok(())
    }

    /// Resolves `virt` in this address space.
    ///
    /// `None` is the normal answer for an unmapped or inaccessible address,
    /// not an error.
    pub fn translate(&self, virt: VirtualAddress) -> Option<PhysicalAddress> {
        self.mapper.lock().translate(virt)
    }

    /// Returns the decoded leaf entry covering `virt`, if any.
    ///
    /// Unlike [`AddressSpace::translate`] this also reports non-present
    /// entries that still record a frame ([`Protection::None`] mappings).
    pub fn attributes(&self, virt: VirtualAddress) -> Option<Decoded> {
        self.mapper.lock().attributes(virt)
    }

    /// Loads this address space into the hardware translation base.
    ///
    /// # Safety
    ///
    /// Every translation the executing code relies on (its own instructions,
    /// stack, and the direct map) must be present in this space, and the
    /// space must outlive its activation.
    pub unsafe fn activate(&self) {
        log::debug!("activating address space {}", self.id());
        unsafe { arch::activate_root(self.root) };
    }

    /// Tears the address space down, returning the root and every
    /// intermediate table frame to `allocator`.
    ///
    /// Frames the mappings pointed at are untouched. The caller must ensure
    /// the space is not active on any processor.
    pub fn destroy(self, allocator: &dyn FrameAllocator) {
        log::debug!("destroying address space {}", self.id());
        self.mapper.into_inner().free_tables(allocator);
    }
}

/// Step size implied by the requested flags.
fn granularity(flags: MappingFlags) -> Result<usize, Error> {
    if flags.contains(MappingFlags::LARGE_PAGE) {
        if !arch::HAS_LARGE_PAGES {
            return Err(Error::InvalidArgument);
        }
        Ok(arch::LARGE_PAGE_SIZE)
    } else {
        Ok(arch::PAGE_SIZE)
    }
}

/// Range validation shared by `map` and `unmap`.
///
/// The whole range must be `step`-aligned, non-empty, and canonical: the
/// last byte must be a valid virtual address in the same half as the first,
/// so that no address the per-page loop forms crosses the non-canonical
/// hole.
fn validate_range(virt: VirtualAddress, size: usize, step: usize) -> Result<(), Error> {
    if size == 0 || size % step != 0 || !virt.is_aligned(step) {
        return Err(Error::InvalidArgument);
    }
    let start = virt.as_usize();
    let end = start.checked_add(size - 1).ok_or(Error::InvalidArgument)?;
    if !arch::validate_virtual(end) {
        return Err(Error::InvalidArgument);
    }
    let half = 1usize << (arch::MAX_VIRTUAL_BITS - 1);
    if (start & half) != (end & half) {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

/// Identifier of the address space the processor is currently translating
/// through, or [`AddressSpaceId::NONE`] when there is none.
pub fn current_address_space() -> AddressSpaceId {
    match arch::current_root() {
        Some(root) => AddressSpaceId(root.as_usize()),
        None => AddressSpaceId::NONE,
    }
}

/// Resolves `virt` in the currently active address space.
///
/// On an architecture without a walker this degrades to the identity
/// function, which is only correct while virtual and physical addresses
/// coincide (early boot, translation off). With a walker but no active
/// space, every lookup is `None`.
pub fn translate_current(virt: VirtualAddress) -> Option<PhysicalAddress> {
    if !arch::SUPPORTED {
        return Some(PhysicalAddress::new(virt.as_usize()));
    }
    let root = arch::current_root()?;
    // SAFETY: Read-only walk over the hierarchy the hardware is actively
    // translating through; the tables are live by definition.
    let mapper = unsafe { Mapper::with_root(root) };
    mapper.translate(virt)
}
