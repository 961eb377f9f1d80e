use crate::{PAGE_FRAME, PAGE_SHIFT, PAGE_SIZE, PhysicalAddress, is_page_aligned};
use core::fmt;

/// Page-aligned base of a physical frame.
///
/// ### Invariants
/// - The low [`PAGE_SHIFT`] bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pp = PhysicalAddress::new(0x0008_1234).page();
/// assert_eq!(pp.base().as_u32(), 0x0008_1000);
/// assert_eq!(pp.number(), 0x81);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(u32);

impl PhysicalPage {
    /// The frame containing `addr`.
    #[inline]
    #[must_use]
    pub const fn containing(addr: PhysicalAddress) -> Self {
        Self(addr.as_u32() & PAGE_FRAME)
    }

    /// `Some` if `addr` is already page-aligned.
    #[inline]
    #[must_use]
    pub const fn try_from_addr(addr: PhysicalAddress) -> Option<Self> {
        if is_page_aligned(addr.as_u32()) {
            Some(Self(addr.as_u32()))
        } else {
            None
        }
    }

    /// The frame with physical frame number `pfn`.
    #[inline]
    #[must_use]
    pub const fn from_number(pfn: u32) -> Self {
        Self(pfn << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0)
    }

    /// Physical frame number (`base >> PAGE_SHIFT`).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// The address `offset` bytes into this frame.
    #[inline]
    #[must_use]
    pub const fn join(self, offset: u32) -> PhysicalAddress {
        debug_assert!(offset < PAGE_SIZE);
        PhysicalAddress::new(self.0 | offset)
    }

    /// The frame `count` frames above this one.
    #[inline]
    #[must_use]
    pub const fn add_pages(self, count: u32) -> Self {
        Self(self.0 + count * PAGE_SIZE)
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.base(), f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:08X})", self.0)
    }
}
