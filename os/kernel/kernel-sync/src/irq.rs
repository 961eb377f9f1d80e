//! Interrupt masking on the current CPU.
//!
//! The platform decides *how* interrupts are masked (the MIPS status register's
//! `IE` bit, `cli`/`sti` on x86, an atomic flag in host tests); the kernel only
//! needs the three operations of [`InterruptControl`] and a scope that restores
//! the previous state on every exit path, [`IrqGuard`].

use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// Per-CPU interrupt enable state.
///
/// Implementations act on the CPU the caller is running on.
pub trait InterruptControl {
    /// Whether interrupts are currently enabled.
    fn enabled(&self) -> bool;

    /// Mask all interrupts.
    fn disable(&self);

    /// Unmask interrupts.
    fn enable(&self);
}

impl<I: InterruptControl + ?Sized> InterruptControl for &I {
    #[inline]
    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    #[inline]
    fn disable(&self) {
        (**self).disable();
    }

    #[inline]
    fn enable(&self) {
        (**self).enable();
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// The guard snapshots the enable state first; if interrupts were already off
/// (nested sections) it leaves them off when it goes away.
///
/// # Examples
///
/// ```
/// use core::cell::Cell;
/// use kernel_sync::{InterruptControl, IrqGuard};
///
/// struct Cpu(Cell<bool>);
///
/// impl InterruptControl for Cpu {
///     fn enabled(&self) -> bool { self.0.get() }
///     fn disable(&self) { self.0.set(false) }
///     fn enable(&self) { self.0.set(true) }
/// }
///
/// let cpu = Cpu(Cell::new(true));
/// {
///     let _g = IrqGuard::new(&cpu);
///     assert!(!cpu.enabled());
/// }
/// assert!(cpu.enabled());
/// ```
pub struct IrqGuard<'a, I: InterruptControl + ?Sized> {
    ctl: &'a I,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl<'a, I: InterruptControl + ?Sized> IrqGuard<'a, I> {
    #[inline]
    #[must_use]
    pub fn new(ctl: &'a I) -> Self {
        let were_enabled = ctl.enabled();
        if were_enabled {
            ctl.disable();
        }
        Self { ctl, were_enabled }
    }
}

impl<I: InterruptControl + ?Sized> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        if self.were_enabled {
            self.ctl.enable();
        }
    }
}

/// A [`SpinLock`] guard that also keeps interrupts masked while held.
///
/// Field order is significant: the lock is released before interrupts are
/// restored.
pub struct IrqSpinLockGuard<'a, T, I: InterruptControl + ?Sized> {
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard<'a, I>,
}

impl<T> SpinLock<T> {
    /// Mask interrupts through `ctl`, then acquire the lock.
    ///
    /// Prevents an interrupt handler on this CPU from preempting the critical
    /// section and spinning on the same lock.
    #[inline]
    pub fn lock_irq<'a, I: InterruptControl + ?Sized>(
        &'a self,
        ctl: &'a I,
    ) -> IrqSpinLockGuard<'a, T, I> {
        let irq = IrqGuard::new(ctl);
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }

    /// Closure form of [`lock_irq`](Self::lock_irq).
    #[inline]
    pub fn with_lock_irq<R, I: InterruptControl + ?Sized>(
        &self,
        ctl: &I,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let mut g = self.lock_irq(ctl);
        f(&mut g)
    }
}

impl<T, I: InterruptControl + ?Sized> Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, I: InterruptControl + ?Sized> DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Interrupt state of a simulated CPU, for running the kernel on a host.
///
/// Counts how often interrupts were masked so tests can check that a code path
/// ran inside a critical section.
#[cfg(any(test, feature = "host"))]
#[derive(Debug)]
pub struct HostInterrupts {
    enabled: core::sync::atomic::AtomicBool,
    disables: core::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "host"))]
impl Default for HostInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "host"))]
impl HostInterrupts {
    /// A CPU with interrupts enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: core::sync::atomic::AtomicBool::new(true),
            disables: core::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many times interrupts went from enabled to disabled.
    #[must_use]
    pub fn disable_count(&self) -> usize {
        self.disables.load(core::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "host"))]
impl InterruptControl for HostInterrupts {
    fn enabled(&self) -> bool {
        self.enabled.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn disable(&self) {
        if self.enabled.swap(false, core::sync::atomic::Ordering::SeqCst) {
            self.disables
                .fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        }
    }

    fn enable(&self) {
        self.enabled.store(true, core::sync::atomic::Ordering::SeqCst);
    }
}
