use crate::VmError;
use alloc::vec::Vec;
use kernel_alloc::FrameAlloc;
use kernel_memory_addresses::PhysicalPage;

/// Flat page-index-to-frame map of one region.
///
/// `None` until the region is loaded; afterwards entry `i` is the frame
/// backing page `i` of the region.
#[derive(Debug, Default)]
pub struct LinearPageTable {
    frames: Option<Vec<PhysicalPage>>,
}

impl LinearPageTable {
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: None }
    }

    /// Whether [`populate`](Self::populate) has run.
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.frames.is_some()
    }

    /// Allocate and zero one frame for each of `pages` pages.
    ///
    /// On failure the frames obtained so far stay in the table, so
    /// [`release`](Self::release) returns them.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the table or a frame cannot be allocated.
    ///
    /// # Panics
    /// If the table is already populated.
    pub fn populate<A: FrameAlloc>(&mut self, pages: usize, frames: &A) -> Result<(), VmError> {
        assert!(!self.is_populated(), "page table populated twice");

        let mut table = Vec::new();
        table.try_reserve_exact(pages)?;
        let table = self.frames.insert(table);

        for _ in 0..pages {
            table.push(frames.alloc_zeroed()?);
        }
        Ok(())
    }

    /// Return every frame to `frames` and drop the table.
    pub fn release<A: FrameAlloc>(&mut self, frames: &A) {
        for frame in self.frames.take().into_iter().flatten() {
            frames.free_frames(frame);
        }
    }

    /// The frame backing page `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PhysicalPage> {
        self.frames.as_ref()?.get(index).copied()
    }

    /// The frames in page order; empty when not populated.
    #[must_use]
    pub fn frames(&self) -> &[PhysicalPage] {
        self.frames.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }
}
