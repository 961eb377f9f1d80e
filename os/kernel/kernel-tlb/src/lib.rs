//! # Software-Managed Translation Cache
//!
//! The R3000 has no page-table walker: every user access is translated by a
//! 64-slot, fully associative TLB that the kernel fills itself on a miss.
//!
//! - [`EntryHi`] / [`EntryLo`]: the two register halves of a slot, modelled
//!   with `bitfield-struct`.
//! - [`Tlb`]: read, indexed write and random write, the three operations the
//!   hardware offers.
//! - [`SoftTlb`]: a software model of the hardware used on development hosts.
//! - [`TlbCpu`]: owns a CPU's TLB and performs every update with interrupts
//!   masked.
//! - [`tlb_shootdown`] / [`tlb_shootdown_all`]: cross-CPU invalidation, which
//!   a uniprocessor kernel never expects to receive.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod cpu;
mod entry;
mod shootdown;
mod soft;

pub use cpu::{TlbCpu, TlbWrite};
pub use entry::{EntryHi, EntryLo, TlbEntry};
pub use shootdown::{TlbShootdown, tlb_shootdown, tlb_shootdown_all};
pub use soft::SoftTlb;

/// Access to a CPU's translation cache.
///
/// Implementations only move entries in and out; picking a slot and masking
/// interrupts is up to the caller (see [`TlbCpu`]).
pub trait Tlb {
    /// Number of slots.
    fn slots(&self) -> usize;

    /// Read slot `index` (`tlbr`).
    fn read(&self, index: usize) -> TlbEntry;

    /// Write slot `index` (`tlbwi`).
    fn write(&mut self, index: usize, entry: TlbEntry);

    /// Write the slot the `Random` register names (`tlbwr`) and return it.
    fn write_random(&mut self, entry: TlbEntry) -> usize;
}
