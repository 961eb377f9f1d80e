//! # Physical Frame Allocation
//!
//! Hands out 4 KiB physical frames, singly or as contiguous runs, to the
//! kernel heap and to user address spaces.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              PhysFrameAllocator                     │
//! │    • one SpinLock around all bookkeeping            │
//! │    • Stealing → Managed, exactly once               │
//! └───────────┬─────────────────────────┬───────────────┘
//!             │ before bootstrap        │ after bootstrap
//! ┌───────────▼─────────────┐ ┌─────────▼───────────────┐
//! │     BumpAllocator       │ │      FrameTable         │
//! │  • moves a cursor       │ │  • FrameState per frame │
//! │  • never frees          │ │  • first-fit runs       │
//! └─────────────────────────┘ └─────────┬───────────────┘
//!                                       │ lives in RAM, reached via
//!                             ┌─────────▼───────────────┐
//!                             │      PhysMapper         │
//!                             │  KSEG0 / HostRam        │
//!                             └─────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`PhysFrameAllocator::new`] takes the RAM window left after the kernel
//!    image. Early requests are served by moving a cursor through it.
//! 2. [`PhysFrameAllocator::bootstrap`] places the [`FrameTable`] at the
//!    bottom of whatever is left and switches over for good. Frames stolen
//!    before that point are never returned.
//! 3. From then on, [`FrameAlloc::alloc_frames`] does a first-fit search and
//!    [`FrameAlloc::free_frames`] releases a whole run given its first frame.
//!
//! Zeroing and copying frames happens through the [`PhysMapper`] outside the
//! allocator lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "host"))]
extern crate alloc;

mod bump;
mod frame_table;
pub mod phys_mapper;

#[cfg(test)]
mod tests_prop;

pub use bump::BumpAllocator;
pub use frame_table::{FrameState, FrameTable};
#[cfg(any(test, feature = "host"))]
pub use phys_mapper::HostRam;
pub use phys_mapper::{Kseg0PhysMapper, PhysMapper};

use kernel_info::boot::RamWindow;
use kernel_memory_addresses::PhysicalPage;
use kernel_sync::SpinLock;
use log::{debug, info, warn};

/// Why a frame request could not be served.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("requested zero frames")]
    EmptyRequest,
}

/// Source of physical frames.
///
/// Implementations serialize internally, so every method takes `&self`.
pub trait FrameAlloc {
    type Mapper: PhysMapper;

    /// Allocate `count` physically contiguous frames and return the first.
    ///
    /// # Errors
    /// [`FrameAllocError::EmptyRequest`] for `count == 0`,
    /// [`FrameAllocError::OutOfMemory`] if no run of that length is free.
    fn alloc_frames(&self, count: usize) -> Result<PhysicalPage, FrameAllocError>;

    /// Release the allocation starting at `first`.
    fn free_frames(&self, first: PhysicalPage);

    /// How the frames handed out can be reached.
    fn mapper(&self) -> &Self::Mapper;

    /// Allocate one frame and fill it with zeros.
    ///
    /// # Errors
    /// See [`alloc_frames`](Self::alloc_frames).
    fn alloc_zeroed(&self) -> Result<PhysicalPage, FrameAllocError> {
        let frame = self.alloc_frames(1)?;
        // SAFETY: the frame was just handed to us.
        unsafe { self.mapper().zero_page(frame) };
        Ok(frame)
    }
}

enum AllocatorState<'m> {
    /// Early boot: frames come off the bottom of the window and stay taken.
    Stealing(BumpAllocator),
    /// Regular operation.
    Managed(FrameTable<'m>),
}

/// The kernel's physical frame allocator.
pub struct PhysFrameAllocator<'m, M: PhysMapper> {
    mapper: &'m M,
    state: SpinLock<AllocatorState<'m>>,
}

impl<'m, M: PhysMapper> PhysFrameAllocator<'m, M> {
    /// An allocator in boot mode over `window`.
    ///
    /// # Safety
    /// The whole-frame part of `window` must be unused RAM that `mapper`
    /// reaches, and nothing but this allocator may use it for `'m`.
    #[must_use]
    pub const unsafe fn new(mapper: &'m M, window: RamWindow) -> Self {
        Self {
            mapper,
            state: SpinLock::new(AllocatorState::Stealing(BumpAllocator::new(window))),
        }
    }

    /// Place the frame table over the RAM not stolen so far and leave boot mode.
    ///
    /// # Panics
    /// When called a second time.
    pub fn bootstrap(&self) {
        let mut state = self.state.lock();
        let AllocatorState::Stealing(bump) = &*state else {
            panic!("frame allocator bootstrapped twice");
        };

        let window = bump.remaining();
        // SAFETY: `new` handed us the window, and the bump allocator never
        // gave out anything above its cursor.
        let table = unsafe { FrameTable::place(self.mapper, window) };

        info!(
            "frame table: RAM {}..{}, {} frame(s) of bookkeeping, {} frame(s) managed from {}",
            window.low,
            window.high,
            window.frames() - table.len(),
            table.len(),
            table.first_frame()
        );
        *state = AllocatorState::Managed(table);
    }

    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        matches!(*self.state.lock(), AllocatorState::Managed(_))
    }

    /// Frames under frame-table management; zero before bootstrap.
    #[must_use]
    pub fn total_frame_count(&self) -> usize {
        match &*self.state.lock() {
            AllocatorState::Stealing(_) => 0,
            AllocatorState::Managed(table) => table.len(),
        }
    }

    /// Frames currently free; zero before bootstrap.
    #[must_use]
    pub fn free_frame_count(&self) -> usize {
        match &*self.state.lock() {
            AllocatorState::Stealing(_) => 0,
            AllocatorState::Managed(table) => table.free_count(),
        }
    }

    /// Current state of `frame`, `None` if it is not under management.
    #[must_use]
    pub fn frame_state(&self, frame: PhysicalPage) -> Option<FrameState> {
        match &*self.state.lock() {
            AllocatorState::Stealing(_) => None,
            AllocatorState::Managed(table) => table.state(frame),
        }
    }
}

impl<M: PhysMapper> FrameAlloc for PhysFrameAllocator<'_, M> {
    type Mapper = M;

    fn alloc_frames(&self, count: usize) -> Result<PhysicalPage, FrameAllocError> {
        if count == 0 {
            return Err(FrameAllocError::EmptyRequest);
        }

        let mut state = self.state.lock();
        let frame = match &mut *state {
            AllocatorState::Stealing(bump) => bump.steal(count),
            AllocatorState::Managed(table) => table.allocate(count),
        };
        frame.ok_or_else(|| {
            debug!("no run of {count} free frame(s)");
            FrameAllocError::OutOfMemory
        })
    }

    /// # Panics
    /// If `first` holds the frame table, lies above the managed RAM or is not
    /// the first frame of a live allocation.
    fn free_frames(&self, first: PhysicalPage) {
        let mut state = self.state.lock();
        match &mut *state {
            AllocatorState::Stealing(_) => {
                warn!("ignoring release of {first} before the frame table exists");
            }
            AllocatorState::Managed(table) if first < table.table_frame() => {
                warn!("ignoring release of {first}, stolen during boot");
            }
            AllocatorState::Managed(table) => {
                table.release(first);
            }
        }
    }

    fn mapper(&self) -> &M {
        self.mapper
    }
}

impl<M: PhysMapper> core::fmt::Debug for PhysFrameAllocator<'_, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhysFrameAllocator")
            .field("bootstrapped", &self.is_bootstrapped())
            .field("free", &self.free_frame_count())
            .finish_non_exhaustive()
    }
}
