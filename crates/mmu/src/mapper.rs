//! Page-table walker.
//!
//! Walks one address space's table hierarchy to install, query, and remove
//! leaf entries, allocating and releasing intermediate levels on demand.
//! Tables are physical frames linked by physical address; the walker reaches
//! them through the direct-map [`AddressTranslator`]. It takes no locks of
//! its own — the owning [`crate::AddressSpace`] serializes callers.

use crate::address::AddressTranslator;
use crate::arch::{self, PageEntry, PageTable};
use crate::error::Error;
use crate::frame::FrameAllocator;
use crate::protection::{Decoded, MappingFlags, Protection};
use crate::{PhysicalAddress, VirtualAddress};

/// Allocates and zeroes one page-table frame.
///
/// Nothing is linked into the hierarchy here; on failure the walk reports
/// out-of-memory with no trace of the attempt.
fn alloc_table(allocator: &dyn FrameAllocator) -> Result<PhysicalAddress, Error> {
    let frame = allocator.allocate_frame().ok_or(Error::OutOfMemory)?;
    let translator = AddressTranslator::current();
    // Fresh tables must start with every entry non-present.
    unsafe {
        core::ptr::write_bytes(
            translator.phys_to_ptr::<u8>(frame.as_usize()),
            0,
            arch::PAGE_SIZE,
        );
    }
    Ok(frame)
}

/// Views a page-table frame through the direct map.
///
/// # Safety
///
/// `phys` must be a live page-table frame of this hierarchy, and the caller
/// must hold the address space's lock for the reference's lifetime.
unsafe fn table_mut<'a>(phys: PhysicalAddress) -> &'a mut PageTable {
    let translator = AddressTranslator::current();
    unsafe { &mut *translator.phys_to_ptr::<PageTable>(phys.as_usize()) }
}

/// Shared-view counterpart of [`table_mut`], same contract.
unsafe fn table_ref<'a>(phys: PhysicalAddress) -> &'a PageTable {
    let translator = AddressTranslator::current();
    unsafe { &*(translator.phys_to_ptr::<PageTable>(phys.as_usize()) as *const PageTable) }
}

/// The level a leaf entry is installed at for the requested granularity.
fn leaf_level(flags: MappingFlags) -> usize {
    if flags.contains(MappingFlags::LARGE_PAGE) {
        arch::LARGE_PAGE_LEVEL
    } else {
        0
    }
}

/// Walker over one page-table hierarchy, identified by its root frame.
pub(crate) struct Mapper {
    root: PhysicalAddress,
}

impl Mapper {
    /// Creates a new hierarchy with an empty root table.
    pub(crate) fn new(allocator: &dyn FrameAllocator) -> Result<Self, Error> {
        let root = alloc_table(allocator)?;
        Ok(Self { root })
    }

    /// Wraps an existing hierarchy by its root frame.
    ///
    /// # Safety
    ///
    /// `root` must be the root table of a live hierarchy, and the caller must
    /// prevent concurrent mutation for the walker's lifetime.
    pub(crate) unsafe fn with_root(root: PhysicalAddress) -> Self {
        Self { root }
    }

    /// Physical address of the root table.
    pub(crate) fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Installs one leaf entry for `virt`, at the granularity `flags`
    /// requests.
    ///
    /// Any occupied slot along the way is a conflict: a large-page leaf where
    /// the walk must descend, a table where a large-page leaf should go, or
    /// an occupied leaf slot. Nothing is overwritten; callers unmap first.
    pub(crate) fn map_page(
        &mut self,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        protection: Protection,
        flags: MappingFlags,
        allocator: &dyn FrameAllocator,
    ) -> Result<(), Error> {
        let target = leaf_level(flags);
        let mut table_phys = self.root;

        for level in ((target + 1)..arch::PAGE_TABLE_LEVELS).rev() {
            // SAFETY: Root and intermediate frames are owned by this
            // hierarchy; the address space lock is held.
            let table = unsafe { table_mut(table_phys) };
            let entry = table.entry_mut(virt.page_index(level));

            if entry.is_unused() {
                let frame = alloc_table(allocator)?;
                *entry = PageEntry::intermediate(frame);
                log::trace!("allocated level-{level} table at {frame} for {virt}");
            } else if !entry.is_present() || entry.is_huge() {
                // A leaf (or no-access placeholder) already covers this
                // address at a coarser granularity.
                return Err(Error::ConflictingMapping);
            }
            table_phys = entry.address();
        }

        // SAFETY: As above.
        let table = unsafe { table_mut(table_phys) };
        let entry = table.entry_mut(virt.page_index(target));
        if !entry.is_unused() {
            return Err(Error::ConflictingMapping);
        }
        *entry = PageEntry::encode(protection, flags, phys);
        Ok(())
    }

    /// Removes whatever mapping covers `virt` and returns the number of
    /// bytes it spanned.
    ///
    /// Holes advance by one base page. A large-page leaf is removed only if
    /// `virt` sits at its start and `remaining` covers all of it; anything
    /// else would silently split the page, so it is a conflict. Intermediate
    /// tables left without a single used entry are released to `allocator`.
    pub(crate) fn unmap_page(
        &mut self,
        virt: VirtualAddress,
        remaining: usize,
        allocator: &dyn FrameAllocator,
    ) -> Result<usize, Error> {
        // Ancestors of the table being modified, root first: the table's
        // frame and the index of the entry pointing one level down.
        let mut path = [(self.root, 0usize); arch::PAGE_TABLE_LEVELS];
        let mut depth = 0;
        let mut table_phys = self.root;

        for level in (1..arch::PAGE_TABLE_LEVELS).rev() {
            // SAFETY: Hierarchy frames are live; the space's lock is held.
            let table = unsafe { table_mut(table_phys) };
            let index = virt.page_index(level);
            let entry = table.entry_mut(index);

            if entry.is_unused() {
                // Nothing mapped under this entry.
                return Ok(arch::PAGE_SIZE);
            }
            if entry.is_present() && !entry.is_huge() {
                path[depth] = (table_phys, index);
                depth += 1;
                table_phys = entry.address();
                continue;
            }

            // A leaf at this level: removable only as a whole.
            if level == arch::LARGE_PAGE_LEVEL
                && virt.is_aligned(arch::LARGE_PAGE_SIZE)
                && remaining >= arch::LARGE_PAGE_SIZE
            {
                entry.clear();
                self.prune(&path[..depth], table_phys, allocator);
                return Ok(arch::LARGE_PAGE_SIZE);
            }
            return Err(Error::ConflictingMapping);
        }

        // SAFETY: As above.
        let table = unsafe { table_mut(table_phys) };
        let entry = table.entry_mut(virt.page_index(0));
        if !entry.is_unused() {
            entry.clear();
        }
        self.prune(&path[..depth], table_phys, allocator);
        Ok(arch::PAGE_SIZE)
    }

    /// Releases tables emptied by a removal, walking back up the recorded
    /// path. The root is never released.
    fn prune(
        &mut self,
        path: &[(PhysicalAddress, usize)],
        mut table_phys: PhysicalAddress,
        allocator: &dyn FrameAllocator,
    ) {
        for &(parent_phys, index) in path.iter().rev() {
            // SAFETY: Hierarchy frames are live; the space's lock is held.
            let table = unsafe { table_ref(table_phys) };
            if !table.is_vacant() {
                break;
            }
            let parent = unsafe { table_mut(parent_phys) };
            parent.entry_mut(index).clear();
            allocator.free_frame(table_phys);
            log::trace!("released empty table at {table_phys}");
            table_phys = parent_phys;
        }
    }

    /// Resolves `virt` to the physical address it maps to, or `None` when no
    /// present translation covers it.
    pub(crate) fn translate(&self, virt: VirtualAddress) -> Option<PhysicalAddress> {
        let mut table_phys = self.root;

        for level in (1..arch::PAGE_TABLE_LEVELS).rev() {
            // SAFETY: Hierarchy frames are live for the space's lifetime.
            let table = unsafe { table_ref(table_phys) };
            let entry = table.entry(virt.page_index(level));

            if !entry.is_present() {
                return None;
            }
            if entry.is_huge() {
                if level != arch::LARGE_PAGE_LEVEL {
                    // Leaf at a level the architecture does not define.
                    return None;
                }
                let offset = virt.as_usize() & (arch::LARGE_PAGE_SIZE - 1);
                return Some(entry.address() + offset);
            }
            table_phys = entry.address();
        }

        // SAFETY: As above.
        let table = unsafe { table_ref(table_phys) };
        let entry = table.entry(virt.page_index(0));
        if !entry.is_present() {
            return None;
        }
        Some(entry.address() + virt.page_offset())
    }

    /// Returns the decoded leaf entry covering `virt`, including non-present
    /// placeholders, or `None` when the slot is empty.
    pub(crate) fn attributes(&self, virt: VirtualAddress) -> Option<Decoded> {
        let mut table_phys = self.root;

        for level in (1..arch::PAGE_TABLE_LEVELS).rev() {
            // SAFETY: Hierarchy frames are live for the space's lifetime.
            let table = unsafe { table_ref(table_phys) };
            let entry = table.entry(virt.page_index(level));

            if entry.is_unused() {
                return None;
            }
            if entry.is_present() && !entry.is_huge() {
                table_phys = entry.address();
                continue;
            }
            // Leaf (or placeholder) terminating the walk at this level.
            return Some(entry.decode());
        }

        // SAFETY: As above.
        let table = unsafe { table_ref(table_phys) };
        let entry = table.entry(virt.page_index(0));
        if entry.is_unused() {
            return None;
        }
        Some(entry.decode())
    }

    /// Releases every table frame of the hierarchy, the root included.
    ///
    /// Leaf target frames are not owned by the hierarchy and are untouched.
    pub(crate) fn free_tables(&mut self, allocator: &dyn FrameAllocator) {
        free_level(self.root, arch::PAGE_TABLE_LEVELS - 1, allocator);
    }
}

/// Post-order release of a table whose entries sit at `entry_level`.
fn free_level(table_phys: PhysicalAddress, entry_level: usize, allocator: &dyn FrameAllocator) {
    if entry_level > 0 {
        // SAFETY: Called only from teardown with exclusive ownership.
        let table = unsafe { table_ref(table_phys) };
        for index in 0..table.len() {
            let entry = table.entry(index);
            if entry.is_present() && !entry.is_huge() {
                free_level(entry.address(), entry_level - 1, allocator);
            }
        }
    }
    allocator.free_frame(table_phys);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EmulatedFrameAllocator;

    fn setup() {
        if AddressTranslator::try_current().is_none() {
            AddressTranslator::set_current(AddressTranslator::emulated(16 * 1024));
        }
    }

    #[test]
    fn map_allocates_intermediate_levels() {
        setup();
        let allocator = EmulatedFrameAllocator::unbounded();
        let mut mapper = Mapper::new(&allocator).unwrap();
        assert_eq!(allocator.outstanding(), 1);

        mapper
            .map_page(
                VirtualAddress::new(0x2000),
                PhysicalAddress::new(0x9000),
                Protection::ReadWrite,
                MappingFlags::empty(),
                &allocator,
            )
            .unwrap();

        // Root plus one table per level below it.
        assert_eq!(allocator.outstanding(), arch::PAGE_TABLE_LEVELS);
        assert_eq!(
            mapper.translate(VirtualAddress::new(0x2000)),
            Some(PhysicalAddress::new(0x9000))
        );
    }

    #[test]
    fn unmap_prunes_empty_tables() {
        setup();
        let allocator = EmulatedFrameAllocator::unbounded();
        let mut mapper = Mapper::new(&allocator).unwrap();

        mapper
            .map_page(
                VirtualAddress::new(0x2000),
                PhysicalAddress::new(0x9000),
                Protection::ReadWrite,
                MappingFlags::empty(),
                &allocator,
            )
            .unwrap();
        let spanned = mapper
            .unmap_page(VirtualAddress::new(0x2000), arch::PAGE_SIZE, &allocator)
            .unwrap();

        assert_eq!(spanned, arch::PAGE_SIZE);
        // Everything but the root was released.
        assert_eq!(allocator.outstanding(), 1);
        assert_eq!(mapper.translate(VirtualAddress::new(0x2000)), None);
    }

    #[test]
    fn descending_through_large_leaf_conflicts() {
        setup();
        let allocator = EmulatedFrameAllocator::unbounded();
        let mut mapper = Mapper::new(&allocator).unwrap();

        mapper
            .map_page(
                VirtualAddress::new(0x2000),
                PhysicalAddress::new(0x8000),
                Protection::ReadOnly,
                MappingFlags::LARGE_PAGE,
                &allocator,
            )
            .unwrap();

        // 0x2040 lies inside the large page; a base mapping must not split it.
        let result = mapper.map_page(
            VirtualAddress::new(0x2040),
            PhysicalAddress::new(0x9000),
            Protection::ReadOnly,
            MappingFlags::empty(),
            &allocator,
        );
        assert_eq!(result, Err(Error::ConflictingMapping));
    }

    #[test]
    fn free_tables_releases_whole_hierarchy() {
        setup();
        let allocator = EmulatedFrameAllocator::unbounded();
        let mut mapper = Mapper::new(&allocator).unwrap();

        for page in 0..4usize {
            mapper
                .map_page(
                    VirtualAddress::new(0x1000 + page * arch::PAGE_SIZE),
                    PhysicalAddress::new(0x8000 + page * arch::PAGE_SIZE),
                    Protection::ReadWrite,
                    MappingFlags::empty(),
                    &allocator,
                )
                .unwrap();
        }
        mapper.free_tables(&allocator);
        assert_eq!(allocator.outstanding(), 0);
    }
}
