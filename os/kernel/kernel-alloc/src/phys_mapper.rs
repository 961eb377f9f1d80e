//! # Reaching Physical Memory from the Kernel
//!
//! Code can only dereference virtual addresses. On MIPS every physical byte
//! below 512 MiB is visible in KSEG0 at `0x8000_0000 + pa`, cached and without
//! a TLB entry; this is how the kernel reads and writes frames it hands to user
//! address spaces and where it keeps the frame table itself.
//!
//! [`PhysMapper`] abstracts over that so the allocator and the address space
//! code run unchanged on a development host, where [`HostRam`] plays the part
//! of physical memory.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Converts physical addresses into pointers usable by the running code.
///
/// # Safety
/// For every address of the RAM the allocator manages, implementations must
/// return a pointer valid for reads and writes from that address to the end
/// of that RAM, contiguous across frames, for as long as the mapper lives.
/// The provided methods and the frame table rely on this.
pub unsafe trait PhysMapper {
    /// Pointer to the byte at `pa`.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// View the bytes at `pa` as a `T`.
    ///
    /// # Safety
    /// - `pa` must be suitably aligned for `T` and the bytes must form a valid `T`.
    /// - No other reference to the same bytes may be alive during `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        // SAFETY: forwarded to the caller.
        unsafe { &mut *self.phys_to_ptr(pa).cast::<T>() }
    }

    /// Fill `page` with zeros.
    ///
    /// # Safety
    /// `page` must be owned by the caller and not referenced elsewhere.
    #[inline]
    unsafe fn zero_page(&self, page: PhysicalPage) {
        // SAFETY: the trait contract covers the whole frame.
        unsafe { core::ptr::write_bytes(self.phys_to_ptr(page.base()), 0, PAGE_SIZE as usize) };
    }

    /// Copy the contents of frame `src` into frame `dst`.
    ///
    /// # Safety
    /// Both frames must be owned by the caller, and they must differ.
    #[inline]
    unsafe fn copy_page(&self, src: PhysicalPage, dst: PhysicalPage) {
        debug_assert_ne!(src, dst);
        let from = self.phys_to_ptr(src.base());
        let to = self.phys_to_ptr(dst.base());
        // SAFETY: distinct frames never overlap.
        unsafe { core::ptr::copy_nonoverlapping(from, to, PAGE_SIZE as usize) };
    }

    /// Copy `bytes` into physical memory starting at `pa`.
    ///
    /// # Safety
    /// The range must lie inside one frame owned by the caller.
    #[inline]
    unsafe fn write_phys(&self, pa: PhysicalAddress, bytes: &[u8]) {
        debug_assert!(pa.page_offset() as usize + bytes.len() <= PAGE_SIZE as usize);
        // SAFETY: forwarded to the caller.
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.phys_to_ptr(pa), bytes.len()) };
    }

    /// Fill `buf` from physical memory starting at `pa`.
    ///
    /// # Safety
    /// The range must lie inside one frame owned by the caller.
    #[inline]
    unsafe fn read_phys(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        debug_assert!(pa.page_offset() as usize + buf.len() <= PAGE_SIZE as usize);
        // SAFETY: forwarded to the caller.
        unsafe { core::ptr::copy_nonoverlapping(self.phys_to_ptr(pa), buf.as_mut_ptr(), buf.len()) };
    }
}

/// [`PhysMapper`] for the MIPS KSEG0 direct map.
///
/// Only valid for RAM below 512 MiB, which is all the machine has.
#[derive(Debug, Default, Copy, Clone)]
pub struct Kseg0PhysMapper;

// SAFETY: KSEG0 maps all of low physical memory permanently.
unsafe impl PhysMapper for Kseg0PhysMapper {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        core::ptr::with_exposed_provenance_mut(pa.to_kseg0().as_u32() as usize)
    }
}

#[cfg(any(test, feature = "host"))]
pub use host::HostRam;

#[cfg(any(test, feature = "host"))]
mod host {
    use super::PhysMapper;
    use alloc::boxed::Box;
    use core::ptr::NonNull;
    use kernel_info::boot::RamWindow;
    use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, is_page_aligned};

    /// A 4 KiB-aligned frame of simulated RAM.
    #[repr(C, align(4096))]
    struct Frame([u8; PAGE_SIZE as usize]);

    /// Heap-backed stand-in for physical memory.
    ///
    /// Physical address `base` is the first byte of the first frame. Asking
    /// for an address outside the simulated range panics.
    pub struct HostRam {
        base: PhysicalAddress,
        frames: NonNull<[Frame]>,
    }

    // SAFETY: the frames are only reached through raw pointers; callers
    // synchronize access to them like they would for real RAM.
    unsafe impl Send for HostRam {}
    // SAFETY: see above.
    unsafe impl Sync for HostRam {}

    impl HostRam {
        /// Simulate `frames` zeroed frames starting at physical address `base`.
        ///
        /// # Panics
        /// If `base` is not page-aligned.
        #[must_use]
        pub fn new(base: PhysicalAddress, frames: usize) -> Self {
            assert!(is_page_aligned(base.as_u32()), "RAM base must be page-aligned");
            let memory: Box<[Frame]> = (0..frames).map(|_| Frame([0; PAGE_SIZE as usize])).collect();
            Self {
                base,
                frames: NonNull::from(Box::leak(memory)),
            }
        }

        /// Simulate `bytes` of RAM starting at physical address 0.
        #[must_use]
        pub fn with_size(bytes: usize) -> Self {
            Self::new(PhysicalAddress::zero(), bytes / PAGE_SIZE as usize)
        }

        /// The whole simulated range as a boot-time RAM window.
        #[must_use]
        #[allow(clippy::cast_possible_truncation)]
        pub fn window(&self) -> RamWindow {
            let end = self.base + (self.frames.len() * PAGE_SIZE as usize) as u32;
            RamWindow::new(self.base, end)
        }
    }

    // SAFETY: every in-range address points into the owned frame buffer, which
    // lives until the mapper is dropped.
    unsafe impl PhysMapper for HostRam {
        fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
            let offset = pa
                .checked_offset_from(self.base)
                .map(|o| o as usize)
                .filter(|&o| o < self.frames.len() * PAGE_SIZE as usize);
            let Some(offset) = offset else {
                panic!("{pa:?} lies outside the simulated RAM");
            };
            // SAFETY: `offset` is inside the allocation.
            unsafe { self.frames.cast::<u8>().as_ptr().add(offset) }
        }
    }

    impl Drop for HostRam {
        fn drop(&mut self) {
            // SAFETY: `frames` came from `Box::leak` and is released once.
            drop(unsafe { Box::from_raw(self.frames.as_ptr()) });
        }
    }

    impl core::fmt::Debug for HostRam {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("HostRam")
                .field("base", &self.base)
                .field("frames", &self.frames.len())
                .finish()
        }
    }
}
