use crate::VmError;
use kernel_info::memory::{MAX_DATA_REGIONS, STACK_PAGES, USER_STACK_BASE};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, VirtualPage, pages_for};

bitflags::bitflags! {
    /// Access rights a program header asks for.
    ///
    /// Bit values follow the ELF `p_flags` encoding. They are recorded with the
    /// region; the fault handler only makes the first data region read-only once
    /// loading has completed.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct RegionPermissions: u8 {
        const EXECUTE = 1 << 0;
        const WRITE   = 1 << 1;
        const READ    = 1 << 2;
    }
}

/// A page-aligned range of user virtual memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    base: VirtualPage,
    pages: usize,
    permissions: RegionPermissions,
}

impl Default for Region {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Region {
    /// An unset region slot.
    pub const EMPTY: Self = Self {
        base: VirtualPage::from_number(0),
        pages: 0,
        permissions: RegionPermissions::empty(),
    };

    /// The fixed user stack, ending at `USERSTACK`.
    pub const STACK: Self = Self {
        base: VirtualPage::containing(VirtualAddress::new(USER_STACK_BASE)),
        pages: STACK_PAGES,
        permissions: RegionPermissions::READ.union(RegionPermissions::WRITE),
    };

    /// The smallest page-aligned region covering `size` bytes at `vaddr`.
    #[must_use]
    pub const fn covering(vaddr: VirtualAddress, size: usize, permissions: RegionPermissions) -> Self {
        let bytes = size.saturating_add(vaddr.page_offset() as usize);
        Self {
            base: vaddr.page(),
            pages: pages_for(bytes),
            permissions,
        }
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base.base()
    }

    #[must_use]
    pub const fn pages(&self) -> usize {
        self.pages
    }

    #[must_use]
    pub const fn permissions(&self) -> RegionPermissions {
        self.permissions
    }

    /// One past the last byte, widened so a region may end at 4 GiB.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.base().as_u32() as u64 + (self.pages as u64) * (PAGE_SIZE as u64)
    }

    /// Whether the region has a non-null base and at least one page.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.base.number() != 0 && self.pages != 0
    }

    #[must_use]
    pub const fn contains(&self, addr: VirtualAddress) -> bool {
        let a = addr.as_u32() as u64;
        a >= self.base.base().as_u32() as u64 && a < self.end()
    }

    /// Page index of `addr` within the region.
    #[must_use]
    pub const fn page_index(&self, addr: VirtualAddress) -> Option<usize> {
        if self.contains(addr) {
            Some(((addr.as_u32() - self.base.base().as_u32()) / PAGE_SIZE) as usize)
        } else {
            None
        }
    }
}

/// The data regions of an address space, filled in definition order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RegionTable {
    slots: [Region; MAX_DATA_REGIONS],
    len: usize,
}

impl RegionTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [Region::EMPTY; MAX_DATA_REGIONS],
            len: 0,
        }
    }

    /// Store `region` in the next free slot and return the slot index.
    ///
    /// # Errors
    /// [`VmError::UnsupportedRegionCount`] once every slot is used; the table
    /// is left unchanged.
    pub const fn add_region(&mut self, region: Region) -> Result<usize, VmError> {
        if self.len == MAX_DATA_REGIONS {
            return Err(VmError::UnsupportedRegionCount);
        }
        let slot = self.len;
        self.slots[slot] = region;
        self.len += 1;
        Ok(slot)
    }

    /// The region in `slot`, or [`Region::EMPTY`] for an unused slot.
    #[must_use]
    pub const fn slot(&self, slot: usize) -> &Region {
        &self.slots[slot]
    }

    /// The defined regions in definition order.
    #[must_use]
    pub fn defined(&self) -> &[Region] {
        &self.slots[..self.len]
    }

    /// All slots, including unused ones.
    #[must_use]
    pub const fn slots(&self) -> &[Region; MAX_DATA_REGIONS] {
        &self.slots
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
