//! Boot-time frame allocation before the frame table exists.

use kernel_info::boot::RamWindow;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Hands out frames from the bottom of the RAM window by moving a cursor.
///
/// Nothing handed out can be given back: whatever the kernel steals during
/// early boot stays reserved for good.
#[derive(Debug, Clone)]
pub struct BumpAllocator {
    next: PhysicalAddress,
    end: PhysicalAddress,
}

impl BumpAllocator {
    /// Start stealing at the first whole frame of `window`.
    #[must_use]
    pub const fn new(window: RamWindow) -> Self {
        let window = window.page_aligned();
        Self {
            next: window.low,
            end: window.high,
        }
    }

    /// Take `count` consecutive frames, or `None` if the window is exhausted.
    pub fn steal(&mut self, count: usize) -> Option<PhysicalPage> {
        let bytes = u32::try_from(count).ok()?.checked_mul(PAGE_SIZE)?;
        let remaining = self.end - self.next;
        if bytes > remaining {
            return None;
        }
        let page = self.next.page();
        self.next += bytes;
        Some(page)
    }

    /// The part of the window not stolen yet.
    #[must_use]
    pub const fn remaining(&self) -> RamWindow {
        RamWindow::new(self.next, self.end)
    }
}
