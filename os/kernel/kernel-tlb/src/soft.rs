use crate::{EntryHi, Tlb, TlbEntry};
use kernel_info::memory::{NUM_TLB, TLB_WIRED};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Software model of the R3000 translation cache.
///
/// Holds [`NUM_TLB`] slots and a `Random` register that counts down from
/// `NUM_TLB - 1` to [`TLB_WIRED`] and wraps, so random replacement never
/// evicts a wired slot.
///
/// Like the hardware, the model refuses to hold two slots with the same
/// `EntryHi`; the R3000 shuts its TLB down in that case, the model panics.
#[derive(Debug, Clone)]
pub struct SoftTlb {
    slots: [TlbEntry; NUM_TLB],
    random: usize,
}

impl Default for SoftTlb {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftTlb {
    /// A TLB with every slot invalidated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(TlbEntry::invalid),
            random: NUM_TLB - 1,
        }
    }

    /// Translate `addr` the way the hardware would, ignoring permissions.
    #[must_use]
    pub fn lookup(&self, addr: VirtualAddress) -> Option<PhysicalAddress> {
        let entry = self.entry_for(addr)?;
        Some(entry.lo.frame().join(addr.page_offset()))
    }

    /// The valid slot matching the page of `addr`, if any.
    #[must_use]
    pub fn entry_for(&self, addr: VirtualAddress) -> Option<TlbEntry> {
        let hi = EntryHi::for_page(addr.page());
        self.slots
            .iter()
            .copied()
            .find(|e| e.is_valid() && e.hi.vpn() == hi.vpn())
    }

    #[must_use]
    pub const fn entries(&self) -> &[TlbEntry] {
        &self.slots
    }

    /// Number of slots holding a valid translation.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|e| e.is_valid()).count()
    }

    /// The slot the next random write goes to.
    #[must_use]
    pub const fn random_index(&self) -> usize {
        self.random
    }

    fn advance_random(&mut self) -> usize {
        let slot = self.random;
        self.random = if slot <= TLB_WIRED {
            NUM_TLB - 1
        } else {
            slot - 1
        };
        slot
    }

    fn store(&mut self, index: usize, entry: TlbEntry) {
        assert!(index < NUM_TLB, "TLB index {index} out of range");
        if let Some(other) = self
            .slots
            .iter()
            .enumerate()
            .position(|(i, e)| i != index && e.hi == entry.hi)
        {
            panic!(
                "duplicate TLB entry for {:?}: slots {index} and {other}",
                entry.hi.page()
            );
        }
        self.slots[index] = entry;
    }
}

impl Tlb for SoftTlb {
    fn slots(&self) -> usize {
        NUM_TLB
    }

    fn read(&self, index: usize) -> TlbEntry {
        self.slots[index]
    }

    fn write(&mut self, index: usize, entry: TlbEntry) {
        self.store(index, entry);
    }

    fn write_random(&mut self, entry: TlbEntry) -> usize {
        let index = self.advance_random();
        self.store(index, entry);
        index
    }
}
