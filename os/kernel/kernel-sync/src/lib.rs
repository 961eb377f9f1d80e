//! # Kernel synchronization primitives
//!
//! - [`SpinLock`]: test-and-test-and-set lock for short critical sections.
//! - [`InterruptControl`] / [`IrqGuard`]: scoped interrupt masking on the
//!   current CPU, independent of how the platform exposes it.
//! - [`SpinLock::lock_irq`]: both at once, for state that an interrupt handler
//!   on the same CPU could also touch (the TLB, for instance).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::{InterruptControl, IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};

#[cfg(any(test, feature = "host"))]
pub use irq::HostInterrupts;
