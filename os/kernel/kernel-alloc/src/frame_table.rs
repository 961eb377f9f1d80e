//! # Frame Table
//!
//! One [`FrameState`] per managed frame, stored at the bottom of the RAM window
//! it describes. The frames holding the table itself are never handed out.
//!
//! ```text
//! window.low                                               window.high
//! ┌──────────────┬────┬────┬────┬────┬────┬────┬─────┬────┐
//! │ frame table  │ H3 │ T  │ T  │ F  │ H1 │ F  │ ... │ F  │
//! └──────────────┴────┴────┴────┴────┴────┴────┴─────┴────┘
//!                ▲ first managed frame
//! ```
//!
//! Allocation is first-fit over the states; a run is described by its first
//! entry alone, so releasing only needs the address the caller got back.

use crate::PhysMapper;
use kernel_info::boot::RamWindow;
use kernel_memory_addresses::{PhysicalPage, pages_for};

/// Allocation state of one frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameState {
    Free,
    /// First frame of an allocation spanning `run_length` frames.
    Head { run_length: u32 },
    /// Any later frame of an allocation.
    Tail,
}

/// Per-frame bookkeeping over the managed part of RAM.
#[derive(Debug)]
pub struct FrameTable<'m> {
    /// Lowest frame of the window, where the table itself starts.
    start: PhysicalPage,
    first: PhysicalPage,
    states: &'m mut [FrameState],
    free: usize,
}

impl<'m> FrameTable<'m> {
    /// Frames needed to store the table for a window of `frames` frames.
    #[must_use]
    pub const fn overhead(frames: usize) -> usize {
        let pages = pages_for(frames * size_of::<FrameState>());
        if pages > frames { frames } else { pages }
    }

    /// Build the table at the bottom of `window` and mark every other frame free.
    ///
    /// # Safety
    /// The whole-frame part of `window` must be RAM that nothing else uses,
    /// reachable through `mapper` for `'m`.
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn place<M: PhysMapper>(mapper: &'m M, window: RamWindow) -> Self {
        let window = window.page_aligned();
        let total = window.frames();
        let overhead = Self::overhead(total);
        let managed = total - overhead;
        let start = window.low.page();
        let first = start.add_pages(overhead as u32);

        if managed == 0 {
            return Self {
                start,
                first,
                states: &mut [],
                free: 0,
            };
        }

        let base = mapper.phys_to_ptr(window.low).cast::<FrameState>();
        for index in 0..managed {
            // SAFETY: the table fits into the overhead frames, which are page
            // aligned and owned by the caller.
            unsafe { base.add(index).write(FrameState::Free) };
        }

        Self {
            start,
            first,
            // SAFETY: all `managed` entries were just initialized.
            states: unsafe { core::slice::from_raw_parts_mut(base, managed) },
            free: managed,
        }
    }

    /// First-fit allocation of `count` consecutive frames.
    #[allow(clippy::cast_possible_truncation)]
    pub fn allocate(&mut self, count: usize) -> Option<PhysicalPage> {
        debug_assert!(count > 0);
        let run_length = u32::try_from(count).ok()?;
        let start = self.find_free_run(count)?;

        self.states[start] = FrameState::Head { run_length };
        self.states[start + 1..start + count].fill(FrameState::Tail);
        self.free -= count;

        Some(self.first.add_pages(start as u32))
    }

    fn find_free_run(&self, count: usize) -> Option<usize> {
        let mut run = 0;
        for (index, state) in self.states.iter().enumerate() {
            if *state == FrameState::Free {
                run += 1;
                if run == count {
                    return Some(index + 1 - count);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    /// Free the allocation starting at `first`; returns its length in frames.
    ///
    /// # Panics
    /// If `first` is not the first frame of a live allocation.
    pub fn release(&mut self, first: PhysicalPage) -> usize {
        let Some(index) = self.index_of(first) else {
            panic!("{first:?} is not managed by the frame table");
        };
        let FrameState::Head { run_length } = self.states[index] else {
            panic!(
                "{first:?} is not the start of an allocation ({:?})",
                self.states[index]
            );
        };

        let run = run_length as usize;
        for state in &mut self.states[index + 1..index + run] {
            debug_assert_eq!(*state, FrameState::Tail);
            *state = FrameState::Free;
        }
        self.states[index] = FrameState::Free;
        self.free += run;
        run
    }

    /// Index of `page` in the table, if it is a managed frame.
    #[must_use]
    pub fn index_of(&self, page: PhysicalPage) -> Option<usize> {
        let index = page.number().checked_sub(self.first.number())? as usize;
        (index < self.states.len()).then_some(index)
    }

    #[must_use]
    pub fn state(&self, page: PhysicalPage) -> Option<FrameState> {
        self.index_of(page).map(|i| self.states[i])
    }

    /// The frame holding the start of the table, i.e. the bottom of the window.
    #[must_use]
    pub const fn table_frame(&self) -> PhysicalPage {
        self.start
    }

    /// The lowest frame the table hands out.
    #[must_use]
    pub const fn first_frame(&self) -> PhysicalPage {
        self.first
    }

    /// Number of managed frames.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free
    }
}
