//! # Per-Process Address Space
//!
//! Two data regions (text, then data) plus a fixed stack, each backed by a
//! [`LinearPageTable`]. All frames are allocated up front by
//! [`prepare_load`](AddressSpace::prepare_load); there is no demand paging.
//!
//! ## Lifecycle
//!
//! ```text
//! new ─► define_region ×≤2 ─► prepare_load ─► (loader writes) ─► complete_load
//!                                  │                                   │
//!                                  └──────────── define_stack ◄────────┘
//!        copy: new + same regions + prepare_load + page copies
//!        destroy: every frame back to the allocator
//! ```
//!
//! The address space does not hold on to the allocator; operations that need
//! frames take it as an argument. Dropping a space that still owns frames
//! leaks them and logs a warning; use [`destroy`](AddressSpace::destroy).

use crate::page_table::LinearPageTable;
use crate::region::{Region, RegionPermissions, RegionTable};
use crate::{FatalReason, VmError};
use kernel_alloc::{FrameAlloc, PhysMapper};
use kernel_info::memory::{MAX_DATA_REGIONS, USERSTACK};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_sync::InterruptControl;
use kernel_tlb::{Tlb, TlbCpu};
use log::{debug, warn};

/// Which region of an address space an address falls into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegionSlot {
    /// Data region `0` (text) or `1` (data).
    Data(usize),
    Stack,
}

/// The page of a region an address falls into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegionHit {
    pub slot: RegionSlot,
    pub page: usize,
}

#[derive(Debug, Default)]
pub struct AddressSpace {
    regions: RegionTable,
    data_tables: [LinearPageTable; MAX_DATA_REGIONS],
    stack_table: LinearPageTable,
    loaded: bool,
}

impl AddressSpace {
    /// An empty address space: no regions, no frames, not loaded.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: RegionTable::new(),
            data_tables: [LinearPageTable::new(), LinearPageTable::new()],
            stack_table: LinearPageTable::new(),
            loaded: false,
        }
    }

    /// Record the region covering `size` bytes at `vaddr`, rounded out to pages.
    ///
    /// # Errors
    /// [`VmError::UnsupportedRegionCount`] if two regions are defined already.
    pub fn define_region(
        &mut self,
        vaddr: VirtualAddress,
        size: usize,
        permissions: RegionPermissions,
    ) -> Result<(), VmError> {
        let region = Region::covering(vaddr, size, permissions);
        match self.regions.add_region(region) {
            Ok(slot) => {
                debug!(
                    "region {slot}: {} +{} page(s) {permissions:?}",
                    region.base(),
                    region.pages()
                );
                Ok(())
            }
            Err(e) => {
                warn!("too many regions, ignoring {vaddr} +{size:#x}");
                Err(e)
            }
        }
    }

    /// Allocate and zero a frame for every page of both data regions and the stack.
    ///
    /// On failure the space keeps whatever it got and must be destroyed.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`].
    ///
    /// # Panics
    /// If any page table is already populated.
    pub fn prepare_load<A: FrameAlloc>(&mut self, frames: &A) -> Result<(), VmError> {
        assert!(
            self.tables().all(|t| !t.is_populated()),
            "prepare_load on an address space that already has frames"
        );

        for (slot, table) in self.data_tables.iter_mut().enumerate() {
            table.populate(self.regions.slot(slot).pages(), frames)?;
        }
        self.stack_table.populate(Region::STACK.pages(), frames)?;

        debug!("address space loaded with {} frame(s)", self.frame_count());
        Ok(())
    }

    /// Mark loading as done and flush the TLB, so the text region is
    /// re-faulted read-only.
    pub fn complete_load<T: Tlb, I: InterruptControl>(&mut self, cpu: &TlbCpu<T, I>) {
        self.loaded = true;
        cpu.invalidate_all();
    }

    /// The initial user stack pointer.
    ///
    /// # Panics
    /// If called before [`prepare_load`](Self::prepare_load).
    #[must_use]
    pub fn define_stack(&self) -> VirtualAddress {
        assert!(
            self.stack_table.is_populated(),
            "define_stack before the stack has frames"
        );
        VirtualAddress::new(USERSTACK)
    }

    /// A deep copy with its own frames, for `fork`.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`]; nothing allocated for the copy is leaked.
    pub fn copy<A: FrameAlloc>(&self, frames: &A) -> Result<Self, VmError> {
        let mut new = Self::new();
        new.regions = self.regions;
        new.loaded = self.loaded;

        if let Err(e) = new.prepare_load(frames) {
            new.destroy(frames);
            return Err(e);
        }

        let mapper = frames.mapper();
        for (from, to) in self.tables().zip(new.tables()) {
            for (&src, &dst) in from.frames().iter().zip(to.frames()) {
                // SAFETY: `src` belongs to `self`, `dst` was just allocated.
                unsafe { mapper.copy_page(src, dst) };
            }
        }

        debug!("address space copied ({} frame(s))", new.frame_count());
        Ok(new)
    }

    /// Return every frame to `frames`.
    pub fn destroy<A: FrameAlloc>(mut self, frames: &A) {
        self.release_frames(frames);
    }

    fn release_frames<A: FrameAlloc>(&mut self, frames: &A) {
        for table in &mut self.data_tables {
            table.release(frames);
        }
        self.stack_table.release(frames);
    }

    /// Check that the space can answer faults at all.
    ///
    /// # Errors
    /// [`FatalReason::RegionUnset`] unless both data regions and the stack
    /// are defined and backed by frames.
    pub fn ensure_ready(&self) -> Result<(), VmError> {
        let regions_set = self.regions.slots().iter().all(Region::is_set);
        let tables_set = self.tables().all(LinearPageTable::is_populated);
        if regions_set && tables_set {
            Ok(())
        } else {
            Err(FatalReason::RegionUnset.into())
        }
    }

    /// Find the region and page `addr` falls into.
    ///
    /// Data region 0 wins over data region 1, which wins over the stack.
    #[must_use]
    pub fn classify(&self, addr: VirtualAddress) -> Option<RegionHit> {
        self.regions
            .slots()
            .iter()
            .enumerate()
            .take(self.regions.len())
            .find_map(|(slot, region)| {
                region.page_index(addr).map(|page| RegionHit {
                    slot: RegionSlot::Data(slot),
                    page,
                })
            })
            .or_else(|| {
                Region::STACK.page_index(addr).map(|page| RegionHit {
                    slot: RegionSlot::Stack,
                    page,
                })
            })
    }

    /// The frame backing `hit`, if the page table has one.
    #[must_use]
    pub fn frame_for(&self, hit: RegionHit) -> Option<PhysicalPage> {
        self.table(hit.slot).get(hit.page)
    }

    /// Whether a store into `slot` is allowed.
    ///
    /// Only the text region turns read-only, and only after loading.
    #[must_use]
    pub const fn is_writable(&self, slot: RegionSlot) -> bool {
        !(matches!(slot, RegionSlot::Data(0)) && self.loaded)
    }

    /// Physical address behind `addr`, following the same rules as a fault.
    #[must_use]
    pub fn translate(&self, addr: VirtualAddress) -> Option<PhysicalAddress> {
        let hit = self.classify(addr)?;
        Some(self.frame_for(hit)?.join(addr.page_offset()))
    }

    /// Copy `bytes` into user memory at `dst`.
    ///
    /// Ignores the read-only state of the text region; this is how the loader
    /// fills it.
    ///
    /// # Errors
    /// [`VmError::SegmentationFault`] naming the first unmapped address; no
    /// byte is written in that case.
    pub fn copy_out<M: PhysMapper>(
        &self,
        mapper: &M,
        dst: VirtualAddress,
        bytes: &[u8],
    ) -> Result<(), VmError> {
        self.check_mapped(dst, bytes.len())?;
        let mut addr = dst;
        for chunk in PageChunks::new(dst, bytes.len()) {
            let pa = self.translate(addr).ok_or(VmError::SegmentationFault(addr))?;
            // SAFETY: the chunk stays within one frame owned by this space.
            unsafe { mapper.write_phys(pa, &bytes[chunk.clone()]) };
            addr += chunk_len(&chunk);
        }
        Ok(())
    }

    /// Fill `buf` from user memory at `src`.
    ///
    /// # Errors
    /// [`VmError::SegmentationFault`] naming the first unmapped address.
    pub fn copy_in<M: PhysMapper>(
        &self,
        mapper: &M,
        src: VirtualAddress,
        buf: &mut [u8],
    ) -> Result<(), VmError> {
        self.check_mapped(src, buf.len())?;
        let mut addr = src;
        for chunk in PageChunks::new(src, buf.len()) {
            let pa = self.translate(addr).ok_or(VmError::SegmentationFault(addr))?;
            // SAFETY: the chunk stays within one frame owned by this space.
            unsafe { mapper.read_phys(pa, &mut buf[chunk.clone()]) };
            addr += chunk_len(&chunk);
        }
        Ok(())
    }

    fn check_mapped(&self, start: VirtualAddress, len: usize) -> Result<(), VmError> {
        let mut addr = start;
        for chunk in PageChunks::new(start, len) {
            if self.translate(addr).is_none() {
                return Err(VmError::SegmentationFault(addr));
            }
            addr = addr
                .checked_add(chunk_len(&chunk))
                .ok_or(VmError::SegmentationFault(addr))?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub const fn regions(&self) -> &RegionTable {
        &self.regions
    }

    #[must_use]
    pub const fn stack_region(&self) -> &Region {
        &Region::STACK
    }

    /// Number of frames this space currently owns.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.tables().map(LinearPageTable::len).sum()
    }

    fn table(&self, slot: RegionSlot) -> &LinearPageTable {
        match slot {
            RegionSlot::Data(i) => &self.data_tables[i],
            RegionSlot::Stack => &self.stack_table,
        }
    }

    fn tables(&self) -> impl Iterator<Item = &LinearPageTable> {
        self.data_tables.iter().chain(core::iter::once(&self.stack_table))
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        let owned = self.frame_count();
        if owned != 0 {
            warn!("address space dropped without destroy, leaking {owned} frame(s)");
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn chunk_len(chunk: &core::ops::Range<usize>) -> u32 {
    (chunk.end - chunk.start) as u32
}

/// Splits `len` bytes starting at a user address into per-page index ranges.
struct PageChunks {
    offset: usize,
    done: usize,
    len: usize,
}

impl PageChunks {
    const fn new(start: VirtualAddress, len: usize) -> Self {
        Self {
            offset: start.page_offset() as usize,
            done: 0,
            len,
        }
    }
}

impl Iterator for PageChunks {
    type Item = core::ops::Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done == self.len {
            return None;
        }
        let room = PAGE_SIZE as usize - self.offset;
        let take = room.min(self.len - self.done);
        let range = self.done..self.done + take;
        self.done += take;
        self.offset = 0;
        Some(range)
    }
}
