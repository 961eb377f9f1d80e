use crate::fault::{FaultKind, handle_fault};
use crate::{AddressSpace, RegionPermissions, VmError};
use kernel_alloc::{FrameAlloc, PhysFrameAllocator, PhysMapper};
use kernel_info::boot::RamWindow;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_sync::InterruptControl;
use kernel_tlb::{Tlb, TlbCpu, TlbShootdown};
use log::info;

/// The virtual memory system of a uniprocessor kernel.
///
/// Owns the physical frame allocator and this CPU's TLB; address spaces are
/// owned by their processes and passed in.
///
/// # Example
///
/// ```
/// use kernel_alloc::HostRam;
/// use kernel_memory_addresses::VirtualAddress;
/// use kernel_sync::HostInterrupts;
/// use kernel_tlb::SoftTlb;
/// use kernel_vmem::{RegionPermissions, Vm};
///
/// let ram = HostRam::with_size(1024 * 1024);
/// let vm = unsafe { Vm::new(&ram, ram.window(), SoftTlb::new(), HostInterrupts::new()) };
/// vm.bootstrap();
///
/// let mut space = vm.as_create();
/// vm.as_define_region(&mut space, VirtualAddress::new(0x0040_0000), 0x1800, RegionPermissions::all()).unwrap();
/// vm.as_define_region(&mut space, VirtualAddress::new(0x1000_0000), 0x100, RegionPermissions::all()).unwrap();
/// vm.as_prepare_load(&mut space).unwrap();
/// vm.as_complete_load(&mut space);
///
/// assert_eq!(vm.as_define_stack(&space).as_u32(), 0x8000_0000);
/// vm.fault(0, VirtualAddress::new(0x0040_1000), Some(&space)).unwrap();
/// vm.as_destroy(space);
/// ```
pub struct Vm<'m, M: PhysMapper, T: Tlb, I: InterruptControl> {
    frames: PhysFrameAllocator<'m, M>,
    cpu: TlbCpu<T, I>,
}

impl<'m, M: PhysMapper, T: Tlb, I: InterruptControl> Vm<'m, M, T, I> {
    /// # Safety
    /// `ram` must be unused RAM reachable through `mapper`, see
    /// [`PhysFrameAllocator::new`].
    pub const unsafe fn new(mapper: &'m M, ram: RamWindow, tlb: T, interrupts: I) -> Self {
        Self {
            // SAFETY: forwarded to the caller.
            frames: unsafe { PhysFrameAllocator::new(mapper, ram) },
            cpu: TlbCpu::new(tlb, interrupts),
        }
    }

    /// Switch the frame allocator from boot-time stealing to the frame table.
    ///
    /// # Panics
    /// When called twice.
    pub fn bootstrap(&self) {
        self.frames.bootstrap();
        info!(
            "vm: {} of {} frame(s) free",
            self.frames.free_frame_count(),
            self.frames.total_frame_count()
        );
    }

    #[must_use]
    pub const fn frames(&self) -> &PhysFrameAllocator<'m, M> {
        &self.frames
    }

    #[must_use]
    pub const fn cpu(&self) -> &TlbCpu<T, I> {
        &self.cpu
    }

    /// Allocate `count` contiguous kernel pages; `None` when out of memory.
    ///
    /// The pages are reached through KSEG0, so no TLB entry is involved.
    #[must_use]
    pub fn alloc_kpages(&self, count: usize) -> Option<VirtualAddress> {
        self.frames
            .alloc_frames(count)
            .ok()
            .map(|first| first.base().to_kseg0())
    }

    /// Release pages obtained from [`alloc_kpages`](Self::alloc_kpages).
    ///
    /// # Panics
    /// If `address` is not a page-aligned KSEG0 address, or not the start of
    /// an allocation.
    pub fn free_kpages(&self, address: VirtualAddress) {
        let Some(pa) = address.kseg0_to_phys() else {
            panic!("free_kpages: {address} is not a KSEG0 address");
        };
        let Some(first) = PhysicalPage::try_from_addr(pa) else {
            panic!("free_kpages: {address} is not page-aligned");
        };
        self.frames.free_frames(first);
    }

    /// Answer a TLB exception of trap type `kind_code` at `address`.
    ///
    /// `current` is the faulting thread's address space, `None` for kernel
    /// threads.
    ///
    /// # Errors
    /// See [`handle_fault`]; an unknown trap type is [`VmError::InvalidFault`].
    pub fn fault(
        &self,
        kind_code: u32,
        address: VirtualAddress,
        current: Option<&AddressSpace>,
    ) -> Result<(), VmError> {
        let kind = FaultKind::try_from(kind_code)?;
        handle_fault(&self.cpu, current, kind, address).map(|_| ())
    }

    #[must_use]
    pub const fn as_create(&self) -> AddressSpace {
        AddressSpace::new()
    }

    pub fn as_destroy(&self, space: AddressSpace) {
        space.destroy(&self.frames);
    }

    /// # Errors
    /// [`VmError::UnsupportedRegionCount`] for a third region.
    pub fn as_define_region(
        &self,
        space: &mut AddressSpace,
        vaddr: VirtualAddress,
        size: usize,
        permissions: RegionPermissions,
    ) -> Result<(), VmError> {
        space.define_region(vaddr, size, permissions)
    }

    /// # Errors
    /// [`VmError::OutOfMemory`]; the space must then be destroyed.
    pub fn as_prepare_load(&self, space: &mut AddressSpace) -> Result<(), VmError> {
        space.prepare_load(&self.frames)
    }

    pub fn as_complete_load(&self, space: &mut AddressSpace) {
        space.complete_load(&self.cpu);
    }

    #[must_use]
    pub fn as_define_stack(&self, space: &AddressSpace) -> VirtualAddress {
        space.define_stack()
    }

    /// # Errors
    /// [`VmError::OutOfMemory`].
    pub fn as_copy(&self, old: &AddressSpace) -> Result<AddressSpace, VmError> {
        old.copy(&self.frames)
    }

    /// Make `space` current on this CPU.
    ///
    /// Every process runs with ASID 0, so switching means flushing the TLB.
    /// Kernel threads (`None`) keep whatever is loaded.
    pub fn as_activate(&self, space: Option<&AddressSpace>) {
        if space.is_some() {
            self.cpu.invalidate_all();
        }
    }

    /// Nothing to do: the next activation flushes anyway.
    pub const fn as_deactivate(&self, _space: Option<&AddressSpace>) {}

    /// # Errors
    /// [`VmError::SegmentationFault`] if any byte of the range is unmapped.
    pub fn copy_out(
        &self,
        space: &AddressSpace,
        dst: VirtualAddress,
        bytes: &[u8],
    ) -> Result<(), VmError> {
        space.copy_out(self.frames.mapper(), dst, bytes)
    }

    /// # Errors
    /// [`VmError::SegmentationFault`] if any byte of the range is unmapped.
    pub fn copy_in(
        &self,
        space: &AddressSpace,
        src: VirtualAddress,
        buf: &mut [u8],
    ) -> Result<(), VmError> {
        space.copy_in(self.frames.mapper(), src, buf)
    }

    /// # Panics
    /// Always; see [`kernel_tlb::tlb_shootdown`].
    pub fn tlb_shootdown(&self, request: &TlbShootdown) -> ! {
        kernel_tlb::tlb_shootdown(request)
    }

    /// # Panics
    /// Always; see [`kernel_tlb::tlb_shootdown_all`].
    pub fn tlb_shootdown_all(&self) -> ! {
        kernel_tlb::tlb_shootdown_all()
    }
}
