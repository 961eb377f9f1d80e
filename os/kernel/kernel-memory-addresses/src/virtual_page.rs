use crate::{PAGE_FRAME, PAGE_SHIFT, PAGE_SIZE, VirtualAddress};
use core::fmt;

/// Page-aligned base of a virtual page.
///
/// This is what a TLB entry matches on: the virtual page number is
/// `base >> PAGE_SHIFT`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u32);

impl VirtualPage {
    /// The page containing `addr`.
    #[inline]
    #[must_use]
    pub const fn containing(addr: VirtualAddress) -> Self {
        Self(addr.as_u32() & PAGE_FRAME)
    }

    /// The page with virtual page number `vpn`.
    #[inline]
    #[must_use]
    pub const fn from_number(vpn: u32) -> Self {
        Self(vpn << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0)
    }

    /// Virtual page number (`base >> PAGE_SHIFT`).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// The address `offset` bytes into this page.
    #[inline]
    #[must_use]
    pub const fn join(self, offset: u32) -> VirtualAddress {
        debug_assert!(offset < PAGE_SIZE);
        VirtualAddress::new(self.0 | offset)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.base(), f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:08X})", self.0)
    }
}
