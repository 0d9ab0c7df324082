//! Address types for the mapping layer.
//!
//! Physical and virtual addresses are deliberately distinct types: mixing
//! them is the classic defect of this layer, so conversions are explicit and
//! go through the [`AddressTranslator`].

use core::fmt;
use core::ops::{Add, Sub};

use crate::arch;

#[cfg(any(test, feature = "software-emulation"))]
use crate::arch::EmulatedMemory;

/// Converts between physical addresses and the virtual addresses the kernel
/// can actually dereference.
///
/// Page tables are linked by physical address; the walker reaches them
/// through this translator. Two modes exist:
///
/// - `Hardware`: the kernel's direct map of physical memory at a fixed
///   virtual offset.
/// - `Emulated`: a host-side memory buffer standing in for physical memory,
///   used by tests and the `software-emulation` feature.
pub enum AddressTranslator {
    /// Direct-map translation at a fixed offset.
    Hardware { direct_map_offset: usize },
    /// Translation into a simulated physical memory buffer.
    #[cfg(any(test, feature = "software-emulation"))]
    Emulated(EmulatedMemory),
}

impl AddressTranslator {
    /// Creates a hardware translator with the given direct-map offset.
    pub const fn hardware(direct_map_offset: usize) -> Self {
        Self::Hardware { direct_map_offset }
    }

    /// Creates an emulated translator backed by `size` bytes of simulated
    /// physical memory.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn emulated(size: usize) -> Self {
        Self::Emulated(EmulatedMemory::new(size))
    }

    /// Installs the global translator. Must be called exactly once during
    /// initialization, before any address space is created.
    ///
    /// # Panics
    ///
    /// Panics if the translator has already been set.
    pub fn set_current(translator: AddressTranslator) {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            if ADDRESS_TRANSLATOR.get().is_some() {
                panic!("address translator already set");
            }
            ADDRESS_TRANSLATOR.call_once(|| translator);
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                if t.get().is_some() {
                    panic!("address translator already set");
                }
                t.call_once(|| translator);
            });
        }
    }

    /// Returns the global translator.
    ///
    /// # Panics
    ///
    /// Panics if [`AddressTranslator::set_current`] has not run yet.
    pub fn current() -> &'static AddressTranslator {
        #[cfg(not(any(test, feature = "software-emulation")))]
        {
            ADDRESS_TRANSLATOR
                .get()
                .expect("address translator not set; call AddressTranslator::set_current first")
        }

        #[cfg(any(test, feature = "software-emulation"))]
        {
            ADDRESS_TRANSLATOR.with(|t| {
                // SAFETY: The reference is leaked to 'static. In emulated mode
                // the slot is thread-local, write-once (spin::Once), and lives
                // for the whole thread, so the reference never dangles within
                // the thread that uses it.
                unsafe {
                    &*(t.get().expect(
                        "address translator not set; call AddressTranslator::set_current first",
                    ) as *const AddressTranslator)
                }
            })
        }
    }

    /// Returns the global translator if it has been set.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn try_current() -> Option<&'static AddressTranslator> {
        ADDRESS_TRANSLATOR.with(|t| {
            t.get().map(|translator| {
                // SAFETY: Same reasoning as in `current`.
                unsafe { &*(translator as *const AddressTranslator) }
            })
        })
    }

    /// Translates a physical address to a dereferenceable virtual address.
    pub fn phys_to_virt(&self, phys: usize) -> usize {
        match self {
            Self::Hardware { direct_map_offset } => phys.wrapping_add(*direct_map_offset),
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.translate(phys) as usize,
        }
    }

    /// Translates a direct-mapped virtual address back to physical.
    pub fn virt_to_phys(&self, virt: usize) -> usize {
        match self {
            Self::Hardware { direct_map_offset } => virt.wrapping_sub(*direct_map_offset),
            #[cfg(any(test, feature = "software-emulation"))]
            Self::Emulated(mem) => mem.ptr_to_phys(virt as *const u8),
        }
    }

    /// Translates a physical address to a typed pointer.
    pub fn phys_to_ptr<T>(&self, phys: usize) -> *mut T {
        self.phys_to_virt(phys) as *mut T
    }

    /// Allocates from the emulated physical memory (test mode only).
    ///
    /// Returns the physical address of the block, or `None` when the buffer
    /// is exhausted.
    #[cfg(any(test, feature = "software-emulation"))]
    pub fn allocate(&self, size: usize, align: usize) -> Option<usize> {
        match self {
            Self::Hardware { .. } => panic!("cannot allocate from hardware translator"),
            Self::Emulated(mem) => mem.allocate(size, align),
        }
    }
}

/// Global translator slot, set once during initialization.
///
/// Thread-local in test/emulation mode so every test thread gets its own
/// simulated physical memory.
#[cfg(not(any(test, feature = "software-emulation")))]
static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();

#[cfg(any(test, feature = "software-emulation"))]
std::thread_local! {
    static ADDRESS_TRANSLATOR: spin::Once<AddressTranslator> = spin::Once::new();
}

/// Generates the structure and methods shared by both address types.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new address without validation.
            ///
            /// # Safety
            ///
            /// The caller must ensure the address is valid for the active
            /// architecture.
            #[inline]
            pub const unsafe fn new_unchecked(addr: usize) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Checks whether the address is aligned to `align`.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn is_aligned(self, align: usize) -> bool {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                self.0 & (align - 1) == 0
            }

            /// Aligns the address down to `align`.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_down(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self(self.0 & !(align - 1))
            }

            /// Aligns the address up to `align`.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_up(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self((self.0 + align - 1) & !(align - 1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(addr: usize) -> Self {
                Self::new(addr)
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                Self::new(self.0 + rhs)
            }
        }

        impl Sub<usize> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: usize) -> Self::Output {
                Self::new(self.0 - rhs)
            }
        }

        impl Sub<$name> for $name {
            type Output = usize;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A physical memory address.\n\n\
     Never dereferenceable directly; go through the [`AddressTranslator`]."
);

impl PhysicalAddress {
    /// Creates a new physical address.
    ///
    /// # Panics
    ///
    /// Panics if the address exceeds the architecture's physical address
    /// width.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(
            arch::validate_physical(addr),
            "physical address exceeds maximum width"
        );
        Self(addr)
    }
}

impl_address_common!(
    VirtualAddress,
    "A virtual memory address, canonical for the active architecture."
);

impl VirtualAddress {
    /// Creates a new virtual address.
    ///
    /// # Panics
    ///
    /// Panics if the address is not canonical for the architecture.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(arch::validate_virtual(addr), "address is not canonical");
        Self(addr)
    }

    /// Converts the address to a pointer.
    #[inline]
    pub const fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// Converts the address to a mutable pointer.
    #[inline]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Returns the byte offset within the containing base page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & (arch::PAGE_SIZE - 1)
    }

    /// Returns the page-table index at the given level.
    ///
    /// Levels count from 0 (leaf table) up to the root; width and position of
    /// the index bits are architecture-defined.
    ///
    /// # Panics
    ///
    /// Panics if `level` is out of range for the architecture.
    #[inline]
    pub const fn page_index(self, level: usize) -> usize {
        arch::page_index(self.0, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod physical_address {
        use super::*;

        #[test]
        fn new_accepts_valid_addresses() {
            assert_eq!(PhysicalAddress::new(0).as_usize(), 0);
            let max = (1usize << arch::MAX_PHYSICAL_BITS) - 1;
            assert_eq!(PhysicalAddress::new(max).as_usize(), max);
        }

        #[test]
        #[should_panic(expected = "physical address exceeds maximum width")]
        fn new_rejects_oversized_address() {
            PhysicalAddress::new(1usize << arch::MAX_PHYSICAL_BITS);
        }

        #[test]
        fn alignment_helpers() {
            let addr = PhysicalAddress::new(arch::PAGE_SIZE * 4);
            assert!(addr.is_aligned(arch::PAGE_SIZE));
            assert!(!addr.is_aligned(arch::PAGE_SIZE * 8));

            let odd = PhysicalAddress::new(arch::PAGE_SIZE + 4);
            assert_eq!(
                odd.align_down(arch::PAGE_SIZE),
                PhysicalAddress::new(arch::PAGE_SIZE)
            );
            assert_eq!(
                odd.align_up(arch::PAGE_SIZE),
                PhysicalAddress::new(arch::PAGE_SIZE * 2)
            );
        }

        #[test]
        fn arithmetic() {
            let addr = PhysicalAddress::new(0x100);
            assert_eq!((addr + 0x50).as_usize(), 0x150);
            assert_eq!((addr - 0x80).as_usize(), 0x80);
            assert_eq!(PhysicalAddress::new(0x150) - addr, 0x50);
        }

        #[test]
        fn formatting() {
            let addr = PhysicalAddress::new(0x100);
            assert_eq!(format!("{addr:?}"), "PhysicalAddress(0x100)");
            assert_eq!(format!("{addr}"), "0x100");
        }
    }

    mod virtual_address {
        use super::*;

        #[test]
        fn new_accepts_canonical_addresses() {
            // Software model: 18-bit addresses, sign-extended from bit 17.
            assert_eq!(VirtualAddress::new(0x1FFFF).as_usize(), 0x1FFFF);
            let high = 0xFFFF_FFFF_FFFF_E000;
            assert_eq!(VirtualAddress::new(high).as_usize(), high);
        }

        #[test]
        #[should_panic(expected = "address is not canonical")]
        fn new_rejects_non_canonical_low() {
            // Bit 17 set without sign extension.
            VirtualAddress::new(0x20000);
        }

        #[test]
        #[should_panic(expected = "address is not canonical")]
        fn new_rejects_non_canonical_high() {
            // Upper bits set while bit 17 is clear.
            VirtualAddress::new(0xFFFF_FFFF_0001_0000);
        }

        #[test]
        fn page_offset_and_indexes() {
            // Software model: 64-byte pages, 3-bit indexes at each of the
            // four levels. 0x2A53 = 0b000_010_101_001_010011.
            let addr = VirtualAddress::new(0x2A53);
            assert_eq!(addr.page_offset(), 0x13);
            assert_eq!(addr.page_index(0), 0b001);
            assert_eq!(addr.page_index(1), 0b101);
            assert_eq!(addr.page_index(2), 0b010);
            assert_eq!(addr.page_index(3), 0b000);
        }

        #[test]
        fn pointer_conversion() {
            let addr = VirtualAddress::new(0x140);
            assert_eq!(addr.as_ptr::<u8>() as usize, 0x140);
            assert_eq!(addr.as_mut_ptr::<u8>() as usize, 0x140);
        }
    }

    mod translator {
        use super::*;

        #[test]
        fn hardware_direct_map_round_trip() {
            // High-half direct-map base, canonical for the 18-bit model.
            let offset = 0xFFFF_FFFF_FFFE_0000usize;
            let translator = AddressTranslator::hardware(offset);
            let virt = translator.phys_to_virt(0x140);
            assert_eq!(virt, offset + 0x140);
            assert_eq!(translator.virt_to_phys(virt), 0x140);
        }

        #[test]
        fn emulated_round_trip() {
            let translator = AddressTranslator::emulated(4096);
            let phys = translator.allocate(64, 64).expect("allocation failed");
            let ptr: *mut u8 = translator.phys_to_ptr(phys);
            assert_eq!(translator.virt_to_phys(ptr as usize), phys);
        }

        #[test]
        #[should_panic(expected = "address translator already set")]
        fn double_set_panics() {
            AddressTranslator::set_current(AddressTranslator::hardware(0xFFFF_FFFF_FFFE_0000));
            AddressTranslator::set_current(AddressTranslator::hardware(0xFFFF_FFFF_FFFE_0000));
        }
    }
}
