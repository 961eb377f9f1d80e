use alloc::collections::TryReserveError;
use kernel_alloc::FrameAllocError;
use kernel_memory_addresses::VirtualAddress;

/// Status codes the trap dispatcher hands back to user space.
pub mod errno {
    /// Operation not implemented.
    pub const EUNIMP: i32 = 2;
    /// Out of memory.
    pub const ENOMEM: i32 = 3;
    /// Bad memory reference.
    pub const EFAULT: i32 = 6;
    /// Invalid argument.
    pub const EINVAL: i32 = 8;
}

/// What the kernel found broken when it could not even look at a fault.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FatalReason {
    #[error("no current address space")]
    NoAddressSpace,
    #[error("address space regions are not set up")]
    RegionUnset,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("unknown fault type {0}")]
    InvalidFault(u32),
    #[error("segmentation fault at {0}")]
    SegmentationFault(VirtualAddress),
    #[error("write to read-only page at {0}")]
    ProtectionFault(VirtualAddress),
    #[error("an address space holds at most two data regions")]
    UnsupportedRegionCount,
    #[error("fatal VM state: {0}")]
    FatalInvariantViolation(#[from] FatalReason),
}

impl VmError {
    /// The status code the trap path reports for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::OutOfMemory => errno::ENOMEM,
            Self::InvalidFault(_) => errno::EINVAL,
            Self::SegmentationFault(_)
            | Self::ProtectionFault(_)
            | Self::FatalInvariantViolation(_) => errno::EFAULT,
            Self::UnsupportedRegionCount => errno::EUNIMP,
        }
    }

    /// Whether the kernel must halt instead of signalling the process.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::FatalInvariantViolation(_))
    }
}

impl From<FrameAllocError> for VmError {
    fn from(_: FrameAllocError) -> Self {
        Self::OutOfMemory
    }
}

impl From<TryReserveError> for VmError {
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        let addr = VirtualAddress::new(0x1000);
        assert_eq!(VmError::OutOfMemory.errno(), 3);
        assert_eq!(VmError::UnsupportedRegionCount.errno(), 2);
        assert_eq!(VmError::SegmentationFault(addr).errno(), 6);
        assert_eq!(VmError::ProtectionFault(addr).errno(), 6);
        assert_eq!(VmError::InvalidFault(7).errno(), 8);
        assert_eq!(VmError::from(FatalReason::NoAddressSpace).errno(), 6);
    }

    #[test]
    fn only_invariant_violations_are_fatal() {
        assert!(VmError::FatalInvariantViolation(FatalReason::RegionUnset).is_fatal());
        assert!(!VmError::SegmentationFault(VirtualAddress::new(0)).is_fatal());
        assert!(!VmError::OutOfMemory.is_fatal());
    }

    #[test]
    fn allocator_failures_become_out_of_memory() {
        assert_eq!(VmError::from(FrameAllocError::OutOfMemory), VmError::OutOfMemory);
    }

    #[test]
    fn messages_name_the_address() {
        let e = VmError::SegmentationFault(VirtualAddress::new(0x0050_0000));
        assert_eq!(e.to_string(), "segmentation fault at 0x00500000");
    }
}
