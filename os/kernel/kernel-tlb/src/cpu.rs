use crate::{Tlb, TlbEntry};
use kernel_sync::{InterruptControl, SpinLock};
use log::trace;

/// Where [`TlbCpu::install`] put an entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TlbWrite {
    /// An invalid slot was reused.
    Free(usize),
    /// Every slot was valid; the hardware picked a victim.
    Replaced(usize),
}

impl TlbWrite {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Free(index) | Self::Replaced(index) => index,
        }
    }
}

/// The translation cache of one CPU together with its interrupt control.
///
/// Every access runs with interrupts masked, so a handler on this CPU can
/// never observe or modify the TLB halfway through an update.
#[derive(Debug)]
pub struct TlbCpu<T, I> {
    tlb: SpinLock<T>,
    irq: I,
}

impl<T: Tlb, I: InterruptControl> TlbCpu<T, I> {
    pub const fn new(tlb: T, irq: I) -> Self {
        Self {
            tlb: SpinLock::new(tlb),
            irq,
        }
    }

    /// Run `f` on the TLB with interrupts disabled.
    #[inline]
    pub fn with_tlb<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.tlb.with_lock_irq(&self.irq, f)
    }

    /// Insert `entry`, preferring an invalid slot over random replacement.
    pub fn install(&self, entry: TlbEntry) -> TlbWrite {
        self.with_tlb(|tlb| {
            let written = match (0..tlb.slots()).find(|&i| !tlb.read(i).is_valid()) {
                Some(index) => {
                    tlb.write(index, entry);
                    TlbWrite::Free(index)
                }
                None => TlbWrite::Replaced(tlb.write_random(entry)),
            };
            trace!(
                "tlb: {} -> {} in slot {} ({})",
                entry.hi.page(),
                entry.lo.frame(),
                written.index(),
                if entry.is_writable() { "rw" } else { "ro" }
            );
            written
        })
    }

    /// Invalidate every slot, wired ones included.
    pub fn invalidate_all(&self) {
        self.with_tlb(|tlb| {
            for index in 0..tlb.slots() {
                tlb.write(index, TlbEntry::invalid(index));
            }
        });
    }

    pub const fn interrupts(&self) -> &I {
        &self.irq
    }

    pub fn into_inner(self) -> T {
        self.tlb.into_inner()
    }
}
