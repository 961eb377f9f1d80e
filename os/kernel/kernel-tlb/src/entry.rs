use bitfield_struct::bitfield;
use kernel_memory_addresses::{MIPS_KSEG0, PAGE_SHIFT, PhysicalPage, VirtualPage};

/// `EntryHi`: the match half of a TLB entry (R3000 layout).
///
/// A lookup hits when the virtual page number (and, for non-global entries,
/// the address space identifier) equals the one of the access.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryHi {
    /// Bits 0–5: Reserved (must be 0).
    #[bits(6, default = 0)]
    _reserved_0_5: u8,

    /// Bits 6–11: Address space identifier.
    ///
    /// The core runs every process with ASID 0 and flushes the TLB on a
    /// context switch instead.
    #[bits(6)]
    pub asid: u8,

    /// Bits 12–31: Virtual page number (`vaddr >> 12`).
    #[bits(20)]
    pub vpn: u32,
}

impl EntryHi {
    /// Match word for `page` under ASID 0.
    #[inline]
    #[must_use]
    pub const fn for_page(page: VirtualPage) -> Self {
        Self::new().with_vpn(page.number())
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::from_number(self.vpn())
    }

    /// The match word an invalidated slot `index` carries.
    ///
    /// Each slot gets its own KSEG0 page number so no two slots ever hold the
    /// same `EntryHi` and none can match a user address.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn invalid_slot(index: usize) -> Self {
        Self::new().with_vpn((MIPS_KSEG0 >> PAGE_SHIFT) + index as u32)
    }
}

/// `EntryLo`: the translation half of a TLB entry (R3000 layout).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryLo {
    /// Bits 0–7: Reserved (must be 0).
    #[bits(8, default = 0)]
    _reserved_0_7: u8,

    /// Bit 8: Global, match regardless of ASID.
    pub global: bool,

    /// Bit 9: Valid. Accesses through an invalid entry fault.
    pub valid: bool,

    /// Bit 10: Dirty, i.e. writable.
    ///
    /// A store through an entry with this bit clear raises a
    /// write-to-read-only fault.
    pub dirty: bool,

    /// Bit 11: Bypass the cache.
    pub nocache: bool,

    /// Bits 12–31: Physical frame number (`paddr >> 12`).
    #[bits(20)]
    pub pfn: u32,
}

impl EntryLo {
    /// `VALID` as a raw mask.
    pub const VALID: u32 = 1 << 9;

    /// `DIRTY` as a raw mask.
    pub const DIRTY: u32 = 1 << 10;

    /// A valid translation to `frame`, writable if `writable` is set.
    #[inline]
    #[must_use]
    pub const fn for_frame(frame: PhysicalPage, writable: bool) -> Self {
        Self::new()
            .with_pfn(frame.number())
            .with_valid(true)
            .with_dirty(writable)
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalPage {
        PhysicalPage::from_number(self.pfn())
    }
}

/// One slot of the translation cache.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TlbEntry {
    pub hi: EntryHi,
    pub lo: EntryLo,
}

impl TlbEntry {
    #[inline]
    #[must_use]
    pub const fn new(hi: EntryHi, lo: EntryLo) -> Self {
        Self { hi, lo }
    }

    /// Translation of `page` to `frame`.
    #[inline]
    #[must_use]
    pub const fn map(page: VirtualPage, frame: PhysicalPage, writable: bool) -> Self {
        Self::new(EntryHi::for_page(page), EntryLo::for_frame(frame, writable))
    }

    /// The contents of an invalidated slot `index`.
    #[inline]
    #[must_use]
    pub const fn invalid(index: usize) -> Self {
        Self::new(EntryHi::invalid_slot(index), EntryLo::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.lo.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.lo.dirty()
    }
}
