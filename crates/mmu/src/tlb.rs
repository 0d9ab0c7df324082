//! Translation-cache maintenance boundary.
//!
//! The hardware caches translations; whenever a live translation is changed
//! or removed, every processor that may hold it stale must be told. The
//! cross-processor shootdown itself is an external service reached through
//! [`TlbMaintenance`]; the mapping layer only decides when it must run.

use crate::address_space::AddressSpaceId;
use crate::{VirtualAddress, arch};

/// Invalidation of cached translations after a mapping change.
///
/// Implementations must not return from either method until the
/// invalidation is visible on every processor that may cache translations
/// for the given address space. On a single-processor system that reduces
/// to a local flush; with multiple processors it involves a shootdown
/// round-trip.
pub trait TlbMaintenance {
    /// Invalidates cached translations for `size` bytes starting at `virt`
    /// in the given address space.
    fn invalidate(&self, space: AddressSpaceId, virt: VirtualAddress, size: usize);

    /// Invalidates every cached translation for the given address space.
    fn invalidate_all(&self, space: AddressSpaceId);
}

/// Local-processor-only invalidation policy.
///
/// Correct while no other processor can cache translations for the affected
/// address space: before secondary processors start, or for spaces pinned to
/// one processor.
pub struct LocalFlush;

impl TlbMaintenance for LocalFlush {
    fn invalidate(&self, _space: AddressSpaceId, virt: VirtualAddress, size: usize) {
        let mut offset = 0;
        while offset < size {
            arch::flush_page(virt + offset);
            offset += arch::PAGE_SIZE;
        }
    }

    fn invalidate_all(&self, _space: AddressSpaceId) {
        arch::flush_all();
    }
}
