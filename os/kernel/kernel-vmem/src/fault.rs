//! # TLB Miss Handling
//!
//! The R3000 raises an exception for every access the TLB cannot translate.
//! [`handle_fault`] answers one such exception with exactly one TLB write or
//! one error; the trap path decides whether the error kills the process or
//! the kernel (see [`VmError::is_fatal`]).

use crate::{AddressSpace, FatalReason, VmError};
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::InterruptControl;
use kernel_tlb::{Tlb, TlbCpu, TlbEntry, TlbWrite};
use log::trace;

/// Trap code of a load from an unmapped page.
pub const VM_FAULT_READ: u32 = 0;
/// Trap code of a store to an unmapped page.
pub const VM_FAULT_WRITE: u32 = 1;
/// Trap code of a store through a TLB entry without the dirty bit.
pub const VM_FAULT_READONLY: u32 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultKind {
    Read,
    Write,
    /// A store hit a translation that is not writable.
    ReadOnly,
}

impl TryFrom<u32> for FaultKind {
    type Error = VmError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            VM_FAULT_READ => Ok(Self::Read),
            VM_FAULT_WRITE => Ok(Self::Write),
            VM_FAULT_READONLY => Ok(Self::ReadOnly),
            other => Err(VmError::InvalidFault(other)),
        }
    }
}

/// Resolve a fault at `address` in `space` by installing a translation.
///
/// # Errors
/// - [`VmError::ProtectionFault`] for stores to read-only pages; these are
///   never upgraded.
/// - [`VmError::FatalInvariantViolation`] without an address space, or with
///   one whose regions are not fully set up.
/// - [`VmError::SegmentationFault`] if no region covers `address`.
pub fn handle_fault<T: Tlb, I: InterruptControl>(
    cpu: &TlbCpu<T, I>,
    space: Option<&AddressSpace>,
    kind: FaultKind,
    address: VirtualAddress,
) -> Result<TlbWrite, VmError> {
    let page = address.page();
    trace!("fault: {kind:?} at {page}");

    if kind == FaultKind::ReadOnly {
        return Err(VmError::ProtectionFault(address));
    }

    let space = space.ok_or(FatalReason::NoAddressSpace)?;
    space.ensure_ready()?;

    let hit = space
        .classify(address)
        .ok_or(VmError::SegmentationFault(address))?;
    let frame = space.frame_for(hit).ok_or(FatalReason::RegionUnset)?;
    let writable = space.is_writable(hit.slot);

    trace!("fault: {page} -> {frame}");
    Ok(cpu.install(TlbEntry::map(page, frame, writable)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_codes() {
        assert_eq!(FaultKind::try_from(0), Ok(FaultKind::Read));
        assert_eq!(FaultKind::try_from(1), Ok(FaultKind::Write));
        assert_eq!(FaultKind::try_from(2), Ok(FaultKind::ReadOnly));
        assert_eq!(FaultKind::try_from(3), Err(VmError::InvalidFault(3)));
    }
}
