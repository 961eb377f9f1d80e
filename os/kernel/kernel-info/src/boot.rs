//! # Kernel Boot Information

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, align_down, align_up};

/// The physical RAM still unclaimed when the kernel starts managing memory.
///
/// `low` is the first free byte after the kernel image, `high` one past the
/// last byte of RAM. Neither needs to be page-aligned; [`RamWindow::frames`]
/// only counts whole frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RamWindow {
    pub low: PhysicalAddress,
    pub high: PhysicalAddress,
}

impl RamWindow {
    /// # Panics
    /// If `low` lies above `high`.
    #[must_use]
    pub const fn new(low: PhysicalAddress, high: PhysicalAddress) -> Self {
        assert!(low.as_u32() <= high.as_u32(), "RAM window is inverted");
        Self { low, high }
    }

    /// The window shrunk to whole frames.
    #[must_use]
    pub const fn page_aligned(self) -> Self {
        let low = align_up(self.low.as_u32());
        let high = align_down(self.high.as_u32());
        if low >= high {
            Self::new(PhysicalAddress::new(low), PhysicalAddress::new(low))
        } else {
            Self::new(PhysicalAddress::new(low), PhysicalAddress::new(high))
        }
    }

    /// Number of whole frames inside the window.
    #[must_use]
    pub const fn frames(self) -> usize {
        let aligned = self.page_aligned();
        ((aligned.high.as_u32() - aligned.low.as_u32()) / PAGE_SIZE) as usize
    }

    /// Size of the window in bytes.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.high.as_u32() - self.low.as_u32()
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whole_frames_only() {
        let w = RamWindow::new(PhysicalAddress::new(0x1_0010), PhysicalAddress::new(0x1_5100));
        let aligned = w.page_aligned();
        assert_eq!(aligned.low.as_u32(), 0x1_1000);
        assert_eq!(aligned.high.as_u32(), 0x1_5000);
        assert_eq!(w.frames(), 4);
    }

    #[test]
    fn tiny_window_has_no_frames() {
        let w = RamWindow::new(PhysicalAddress::new(0x1_0010), PhysicalAddress::new(0x1_0f00));
        assert_eq!(w.frames(), 0);
        assert!(!w.is_empty());
    }
}
