//! Physical-frame allocator boundary.
//!
//! Frames backing page-table levels come from outside this crate. The
//! mapping layer allocates frames only for intermediate tables; frames a
//! mapping points at are never owned and never freed here.

use crate::PhysicalAddress;

/// Supplier of physical frames for page-table levels.
///
/// Implementations are shared between address spaces and between processors,
/// so the methods take `&self`; interior synchronization is the
/// implementation's responsibility. [`FrameAllocator::allocate_frame`] may
/// block while the allocator reclaims memory, but must not depend on the
/// mapping layer to make progress.
pub trait FrameAllocator {
    /// Allocates one frame of [`crate::PAGE_SIZE`] bytes.
    ///
    /// Returns `None` when no frame is available; the mapping layer reports
    /// that to its caller as [`crate::Error::OutOfMemory`].
    fn allocate_frame(&self) -> Option<PhysicalAddress>;

    /// Returns a frame previously obtained from
    /// [`FrameAllocator::allocate_frame`].
    fn free_frame(&self, frame: PhysicalAddress);
}

#[cfg(any(test, feature = "software-emulation"))]
struct EmulatedAllocatorState {
    free: Vec<PhysicalAddress>,
    handed_out: usize,
    outstanding: usize,
}

/// Frame allocator backed by the emulated physical memory, for host tests.
///
/// Frames are bump-allocated from the emulated buffer and recycled through a
/// free list. A frame capacity can be set to provoke out-of-memory paths,
/// and the outstanding-frame count is observable so tests can check that
/// table levels are released.
#[cfg(any(test, feature = "software-emulation"))]
pub struct EmulatedFrameAllocator {
    state: spin::Mutex<EmulatedAllocatorState>,
    capacity: usize,
}

#[cfg(any(test, feature = "software-emulation"))]
impl EmulatedFrameAllocator {
    /// Creates an allocator that will hand out at most `capacity` distinct
    /// frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: spin::Mutex::new(EmulatedAllocatorState {
                free: Vec::new(),
                handed_out: 0,
                outstanding: 0,
            }),
            capacity,
        }
    }

    /// Creates an allocator bounded only by the emulated memory size.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Number of frames currently allocated and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }
}

#[cfg(any(test, feature = "software-emulation"))]
impl FrameAllocator for EmulatedFrameAllocator {
    fn allocate_frame(&self) -> Option<PhysicalAddress> {
        use crate::address::AddressTranslator;

        let mut state = self.state.lock();
        if let Some(frame) = state.free.pop() {
            state.outstanding += 1;
            return Some(frame);
        }
        if state.handed_out >= self.capacity {
            return None;
        }
        let phys = AddressTranslator::current().allocate(crate::arch::PAGE_SIZE, crate::arch::PAGE_SIZE)?;
        state.handed_out += 1;
        state.outstanding += 1;
        Some(PhysicalAddress::new(phys))
    }

    fn free_frame(&self, frame: PhysicalAddress) {
        let mut state = self.state.lock();
        state.outstanding -= 1;
        state.free.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressTranslator;

    fn setup() {
        if AddressTranslator::try_current().is_none() {
            AddressTranslator::set_current(AddressTranslator::emulated(4096));
        }
    }

    #[test]
    fn respects_capacity() {
        setup();
        let allocator = EmulatedFrameAllocator::new(2);
        let a = allocator.allocate_frame().unwrap();
        let _b = allocator.allocate_frame().unwrap();
        assert_eq!(allocator.allocate_frame(), None);
        assert_eq!(allocator.outstanding(), 2);

        // Freed frames are recycled without counting against the capacity.
        allocator.free_frame(a);
        assert_eq!(allocator.outstanding(), 1);
        assert_eq!(allocator.allocate_frame(), Some(a));
    }

    #[test]
    fn frames_are_page_aligned() {
        setup();
        let allocator = EmulatedFrameAllocator::unbounded();
        let frame = allocator.allocate_frame().unwrap();
        assert!(frame.is_aligned(crate::arch::PAGE_SIZE));
    }
}
