//! # Machine Configuration and Boot Interface
//!
//! This crate is the single source of truth for the machine and memory layout
//! constants the virtual memory core relies on, and for the information the
//! platform hands to the kernel at boot.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! * **RAM window**: the `[first free byte, end of RAM)` physical range the
//!   firmware/boot code reports once the kernel image is in place
//!   ([`RamWindow`](boot::RamWindow)).
//!
//! ### Memory Layout ([`memory`])
//! * **User address space**: where the user stack ends and how large it is
//! * **Translation cache geometry**: number of TLB slots and wired slots
//!
//! ## User Address Space
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  unmapped (null guard)          │
//!             ├─────────────────────────────────┤
//!             │  data region 1 (text)           │
//!             ├─────────────────────────────────┤
//!             │  data region 2 (data, bss)      │
//!             ├─────────────────────────────────┤
//!             │            ...                  │
//! USER_STACK_ ├─────────────────────────────────┤ USERSTACK - STACK_PAGES * PAGE_SIZE
//!   BASE      │  stack, grows downward          │
//! USERSTACK   └─────────────────────────────────┘ 0x8000_0000 (MIPS_KSEG0)
//! ```
//!
//! ## Configuration Management
//!
//! All layout constants are `const` values with compile-time assertions, so an
//! inconsistent configuration fails the build instead of a boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
