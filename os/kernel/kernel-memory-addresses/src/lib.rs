//! # Physical and Virtual Memory Address Types (MIPS32)
//!
//! Strongly typed wrappers for the 32-bit addresses handled by the virtual
//! memory core of a software-managed-TLB machine.
//!
//! ## Overview
//!
//! The machine has a single page size of 4 KiB and a 32-bit address space
//! split into fixed segments:
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────┐
//!             │ kuseg: user space, mapped   │
//!             │ through the TLB             │
//! 0x8000_0000 ├─────────────────────────────┤ MIPS_KSEG0
//!             │ kseg0: direct-mapped RAM,   │
//!             │ cached, kernel only         │
//! 0xA000_0000 ├─────────────────────────────┤ MIPS_KSEG1
//!             │ kseg1: direct-mapped I/O,   │
//!             │ uncached                    │
//! 0xC000_0000 ├─────────────────────────────┤ MIPS_KSEG2
//!             │ kseg2: kernel, mapped       │
//! 0xFFFF_FFFF └─────────────────────────────┘
//! ```
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical RAM. |
//! | [`PhysicalPage`] | The page-aligned base of a physical frame. |
//! | [`VirtualAddress`] | A byte address as seen by a running program or the kernel. |
//! | [`VirtualPage`] | The page-aligned base of a virtual page. |
//!
//! Keeping the physical and virtual kinds apart at the type level prevents the
//! classic `paddr`/`vaddr` mix-up, and the page types carry the alignment
//! invariant so a TLB entry can never be built from a misaligned frame.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//! assert_eq!(va.page().base().as_u32(), 0x0040_1000);
//! assert_eq!(va.page_offset(), 0x234);
//!
//! let pa = PhysicalAddress::new(0x0020_3000);
//! assert_eq!(pa.to_kseg0().as_u32(), 0x8020_3000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Page (and frame) size in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the page-number bits of an address.
pub const PAGE_FRAME: u32 = !(PAGE_SIZE - 1);

/// Start of the cached, direct-mapped kernel segment.
pub const MIPS_KSEG0: u32 = 0x8000_0000;

/// Start of the uncached, direct-mapped kernel segment.
pub const MIPS_KSEG1: u32 = 0xA000_0000;

/// Start of the mapped kernel segment.
pub const MIPS_KSEG2: u32 = 0xC000_0000;

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(PAGE_SIZE.is_power_of_two());
};

/// Round `x` down to the nearest page boundary.
#[inline(always)]
#[must_use]
pub const fn align_down(x: u32) -> u32 {
    x & PAGE_FRAME
}

/// Round `x` up to the nearest page boundary.
///
/// Saturates at the last page boundary of the 32-bit space instead of wrapping.
#[inline(always)]
#[must_use]
pub const fn align_up(x: u32) -> u32 {
    match x.checked_add(PAGE_SIZE - 1) {
        Some(v) => v & PAGE_FRAME,
        None => PAGE_FRAME,
    }
}

/// Whether `x` lies on a page boundary.
#[inline(always)]
#[must_use]
pub const fn is_page_aligned(x: u32) -> bool {
    x & (PAGE_SIZE - 1) == 0
}

/// Number of pages needed to cover `bytes` bytes.
#[inline(always)]
#[must_use]
pub const fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE as usize)
}
