//! # Virtual Memory for a Software-Managed TLB
//!
//! Address spaces and TLB refill for a MIPS R3000 class machine: 32-bit
//! addresses, 4 KiB pages and a 64-slot TLB that the kernel fills by hand.
//!
//! ## What you get
//! - [`AddressSpace`]: up to two data regions plus a 12-page stack ending at
//!   `0x8000_0000`, every page backed by a frame from the moment the program
//!   is loaded.
//! - [`handle_fault`]: turns a TLB miss into a TLB write, or into a
//!   [`VmError`] the trap path acts on.
//! - [`Vm`]: the service object the rest of the kernel talks to. It owns the
//!   physical frame allocator and the CPU's TLB.
//!
//! ## Fault resolution
//!
//! ```text
//!  TLB miss at vaddr
//!        │
//!        ├─ write to read-only page ─────────────► ProtectionFault
//!        ├─ no address space / regions unset ────► FatalInvariantViolation
//!        ├─ classify: text │ data │ stack │ none ─► SegmentationFault
//!        ▼
//!  frame = page_table[(vaddr - base) / 4096]
//!        │
//!        ├─ text region and loaded ─► clear DIRTY (read-only)
//!        ▼
//!  TLB: first invalid slot, else random (slots 8..63), interrupts masked
//! ```
//!
//! ## Page tables
//!
//! Each region has a flat array of frames, one per page, allocated and zeroed
//! by [`AddressSpace::prepare_load`]. Nothing is demand-paged, shared or
//! swapped; `fork` copies every frame.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod address_space;
mod error;
mod fault;
mod page_table;
mod region;
mod vm;

pub use address_space::{AddressSpace, RegionHit, RegionSlot};
pub use error::{FatalReason, VmError, errno};
pub use fault::{FaultKind, VM_FAULT_READ, VM_FAULT_READONLY, VM_FAULT_WRITE, handle_fault};
pub use page_table::LinearPageTable;
pub use region::{Region, RegionPermissions, RegionTable};
pub use vm::Vm;
