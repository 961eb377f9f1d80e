//! # Memory Layout

use kernel_memory_addresses::{MIPS_KSEG0, PAGE_SIZE, is_page_aligned};

/// Top of the user stack; the first byte above it is kernel space.
pub const USERSTACK: u32 = MIPS_KSEG0;

/// Number of pages in every process's stack region (48 KiB).
pub const STACK_PAGES: usize = 12;

/// Lowest address of the user stack region.
#[allow(clippy::cast_possible_truncation)]
pub const USER_STACK_BASE: u32 = USERSTACK - (STACK_PAGES as u32) * PAGE_SIZE;

/// Number of data regions (text, data) an address space can describe.
pub const MAX_DATA_REGIONS: usize = 2;

/// Number of slots in the translation cache.
pub const NUM_TLB: usize = 64;

/// Slots `0..TLB_WIRED` are never picked by random replacement.
pub const TLB_WIRED: usize = 8;

const _: () = {
    assert!(is_page_aligned(USERSTACK));
    assert!(is_page_aligned(USER_STACK_BASE));
    assert!(USER_STACK_BASE < USERSTACK);
    assert!(TLB_WIRED < NUM_TLB);
    assert!(STACK_PAGES > 0);
};
