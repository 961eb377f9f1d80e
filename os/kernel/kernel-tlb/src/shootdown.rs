use kernel_memory_addresses::VirtualAddress;

/// Request from another CPU to drop a translation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TlbShootdown {
    pub address: VirtualAddress,
}

/// Drop the translation named by `request` on this CPU.
///
/// # Panics
/// Always. Only a single CPU is supported, so no other CPU can ever send one.
pub fn tlb_shootdown(request: &TlbShootdown) -> ! {
    panic!(
        "TLB shootdown for {} requested on a uniprocessor",
        request.address
    );
}

/// Drop every translation on this CPU on behalf of another CPU.
///
/// # Panics
/// Always, see [`tlb_shootdown`].
pub fn tlb_shootdown_all() -> ! {
    panic!("TLB shootdown of all entries requested on a uniprocessor");
}
