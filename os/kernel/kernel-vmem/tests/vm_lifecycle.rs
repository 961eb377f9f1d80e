use kernel_alloc::HostRam;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_sync::HostInterrupts;
use kernel_tlb::{SoftTlb, TlbShootdown, TlbWrite};
use kernel_vmem::{
    AddressSpace, FatalReason, FaultKind, RegionPermissions, VM_FAULT_READ, VM_FAULT_READONLY,
    VM_FAULT_WRITE, Vm, VmError, errno, handle_fault,
};

type TestVm<'m> = Vm<'m, HostRam, SoftTlb, HostInterrupts>;

const TEXT: u32 = 0x0040_0000;
const DATA: u32 = 0x1000_0000;
const STACK_TOP: u32 = 0x8000_0000;

fn boot(ram: &HostRam) -> TestVm<'_> {
    // SAFETY: the simulated RAM is used by nothing else.
    let vm = unsafe { Vm::new(ram, ram.window(), SoftTlb::new(), HostInterrupts::new()) };
    vm.bootstrap();
    vm
}

fn va(addr: u32) -> VirtualAddress {
    VirtualAddress::new(addr)
}

/// A program with two text pages and one data page, frames allocated.
fn prepared(vm: &TestVm<'_>) -> AddressSpace {
    let mut space = vm.as_create();
    vm.as_define_region(&mut space, va(TEXT), 0x1800, RegionPermissions::READ | RegionPermissions::EXECUTE)
        .expect("text region");
    vm.as_define_region(&mut space, va(DATA), 0x100, RegionPermissions::READ | RegionPermissions::WRITE)
        .expect("data region");
    vm.as_prepare_load(&mut space).expect("frames");
    space
}

fn tlb_writable(vm: &TestVm<'_>, addr: u32) -> Option<bool> {
    vm.cpu()
        .with_tlb(|tlb| tlb.entry_for(va(addr)).map(|entry| entry.is_writable()))
}

#[test]
fn prepare_load_backs_every_page() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let before = vm.frames().free_frame_count();

    let space = prepared(&vm);
    assert_eq!(space.frame_count(), 2 + 1 + 12);
    assert_eq!(vm.frames().free_frame_count(), before - 15);
    assert_eq!(vm.as_define_stack(&space), va(STACK_TOP));

    vm.as_destroy(space);
    assert_eq!(vm.frames().free_frame_count(), before);
}

#[test]
fn text_is_writable_while_loading_and_read_only_after() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut space = prepared(&vm);

    vm.fault(VM_FAULT_WRITE, va(TEXT + 0x10), Some(&space)).expect("load-time store");
    assert_eq!(tlb_writable(&vm, TEXT), Some(true));

    vm.as_complete_load(&mut space);
    assert!(space.is_loaded());
    assert_eq!(vm.cpu().with_tlb(|tlb| tlb.valid_count()), 0);

    vm.fault(VM_FAULT_READ, va(TEXT + 0x10), Some(&space)).expect("fetch");
    vm.fault(VM_FAULT_WRITE, va(DATA + 4), Some(&space)).expect("data store");
    vm.fault(VM_FAULT_WRITE, va(STACK_TOP - 8), Some(&space)).expect("stack store");
    assert_eq!(tlb_writable(&vm, TEXT), Some(false));
    assert_eq!(tlb_writable(&vm, DATA), Some(true));
    assert_eq!(tlb_writable(&vm, STACK_TOP - PAGE_SIZE), Some(true));

    let err = vm
        .fault(VM_FAULT_READONLY, va(TEXT + 0x10), Some(&space))
        .expect_err("store to text");
    assert_eq!(err, VmError::ProtectionFault(va(TEXT + 0x10)));
    assert_eq!(err.errno(), errno::EFAULT);
    assert!(!err.is_fatal());

    vm.as_destroy(space);
}

#[test]
fn translations_point_at_the_region_frames() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let space = prepared(&vm);

    vm.fault(VM_FAULT_READ, va(TEXT + PAGE_SIZE + 0x24), Some(&space)).expect("fault");
    let pa = vm.cpu().with_tlb(|tlb| tlb.lookup(va(TEXT + PAGE_SIZE + 0x24)));
    assert_eq!(pa, space.translate(va(TEXT + PAGE_SIZE + 0x24)));
    assert_eq!(pa.map(|pa| pa.page_offset()), Some(0x24));

    vm.as_destroy(space);
}

#[test]
fn addresses_outside_every_region_are_segmentation_faults() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let space = prepared(&vm);

    for addr in [0, TEXT + 2 * PAGE_SIZE, DATA + PAGE_SIZE, 0x7FFF_3FFC] {
        let err = vm.fault(VM_FAULT_READ, va(addr), Some(&space)).expect_err("unmapped");
        assert_eq!(err, VmError::SegmentationFault(va(addr)));
    }
    assert_eq!(vm.cpu().with_tlb(|tlb| tlb.valid_count()), 0);

    vm.as_destroy(space);
}

#[test]
fn faults_without_a_usable_space_are_fatal() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);

    let err = vm.fault(VM_FAULT_READ, va(TEXT), None).expect_err("kernel thread");
    assert_eq!(err, VmError::FatalInvariantViolation(FatalReason::NoAddressSpace));
    assert!(err.is_fatal());

    let mut single = vm.as_create();
    vm.as_define_region(&mut single, va(TEXT), 0x1000, RegionPermissions::all())
        .expect("text region");
    vm.as_prepare_load(&mut single).expect("frames");
    let err = vm.fault(VM_FAULT_READ, va(TEXT), Some(&single)).expect_err("data unset");
    assert_eq!(err, VmError::FatalInvariantViolation(FatalReason::RegionUnset));

    let unloaded = vm.as_create();
    let err = vm.fault(VM_FAULT_READ, va(STACK_TOP - 4), Some(&unloaded)).expect_err("no frames");
    assert_eq!(err, VmError::FatalInvariantViolation(FatalReason::RegionUnset));

    vm.as_destroy(single);
    vm.as_destroy(unloaded);
}

#[test]
fn unknown_trap_codes_are_rejected() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let space = prepared(&vm);

    let err = vm.fault(7, va(TEXT), Some(&space)).expect_err("bad code");
    assert_eq!(err, VmError::InvalidFault(7));
    assert_eq!(err.errno(), errno::EINVAL);

    vm.as_destroy(space);
}

#[test]
fn a_third_region_is_refused() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut space = vm.as_create();

    vm.as_define_region(&mut space, va(TEXT), 0x10, RegionPermissions::READ).expect("first");
    vm.as_define_region(&mut space, va(DATA), 0x10, RegionPermissions::WRITE).expect("second");
    let err = vm
        .as_define_region(&mut space, va(0x2000_0000), 0x10, RegionPermissions::READ)
        .expect_err("third");
    assert_eq!(err, VmError::UnsupportedRegionCount);
    assert_eq!(err.errno(), errno::EUNIMP);
    assert_eq!(space.regions().len(), 2);
}

#[test]
fn regions_are_rounded_out_to_whole_pages() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut space = vm.as_create();

    vm.as_define_region(&mut space, va(TEXT + 0xFF0), 0x20, RegionPermissions::READ)
        .expect("straddling region");
    let region = space.regions().slot(0);
    assert_eq!(region.base(), va(TEXT));
    assert_eq!(region.pages(), 2);
}

#[test]
fn copies_are_independent() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut parent = prepared(&vm);

    vm.copy_out(&parent, va(DATA + 0x40), b"parent").expect("write data");
    vm.copy_out(&parent, va(STACK_TOP - 3), b"top").expect("write stack");
    vm.as_complete_load(&mut parent);

    let child = vm.as_copy(&parent).expect("fork");
    assert!(child.is_loaded());
    assert_eq!(child.frame_count(), parent.frame_count());

    let mut buf = [0; 6];
    vm.copy_in(&child, va(DATA + 0x40), &mut buf).expect("read child");
    assert_eq!(&buf, b"parent");

    vm.copy_out(&child, va(DATA + 0x40), b"child!").expect("write child");
    vm.copy_in(&parent, va(DATA + 0x40), &mut buf).expect("read parent");
    assert_eq!(&buf, b"parent");

    vm.copy_out(&parent, va(STACK_TOP - 3), b"new").expect("write parent stack");
    vm.copy_in(&child, va(STACK_TOP - 3), &mut buf[..3]).expect("read child stack");
    assert_eq!(&buf[..3], b"top");
    vm.copy_in(&child, va(DATA + 0x40), &mut buf).expect("read child data");
    assert_eq!(&buf, b"child!");

    let mut top = [0; 3];
    vm.copy_in(&parent, va(STACK_TOP - 3), &mut top).expect("read parent stack");
    assert_eq!(&top, b"new");

    // The copy also answers faults with text read-only.
    vm.as_activate(Some(&child));
    vm.fault(VM_FAULT_READ, va(TEXT), Some(&child)).expect("child fetch");
    assert_eq!(tlb_writable(&vm, TEXT), Some(false));

    vm.as_destroy(child);
    vm.as_destroy(parent);
}

#[test]
fn user_copies_span_page_boundaries_and_stop_at_holes() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let space = prepared(&vm);

    let bytes: Vec<u8> = (0..=255).collect();
    vm.copy_out(&space, va(TEXT + PAGE_SIZE - 100), &bytes).expect("straddling write");
    let mut back = vec![0; bytes.len()];
    vm.copy_in(&space, va(TEXT + PAGE_SIZE - 100), &mut back).expect("straddling read");
    assert_eq!(back, bytes);

    let err = vm
        .copy_out(&space, va(TEXT + 2 * PAGE_SIZE - 4), &[1; 8])
        .expect_err("runs off the text region");
    assert_eq!(err, VmError::SegmentationFault(va(TEXT + 2 * PAGE_SIZE)));

    let mut untouched = [0; 4];
    vm.copy_in(&space, va(TEXT + 2 * PAGE_SIZE - 4), &mut untouched).expect("read tail");
    assert_eq!(untouched, [0; 4]);

    vm.as_destroy(space);
}

#[test]
fn out_of_memory_leaves_a_destroyable_space() {
    // 16 frames, one of which holds the frame table.
    let ram = HostRam::with_size(16 * PAGE_SIZE as usize);
    let vm = boot(&ram);
    let free = vm.frames().free_frame_count();
    assert_eq!(free, 15);

    let mut space = vm.as_create();
    vm.as_define_region(&mut space, va(TEXT), 10 * PAGE_SIZE as usize, RegionPermissions::all())
        .expect("text region");
    vm.as_define_region(&mut space, va(DATA), 2 * PAGE_SIZE as usize, RegionPermissions::all())
        .expect("data region");

    let err = vm.as_prepare_load(&mut space).expect_err("24 pages do not fit");
    assert_eq!(err, VmError::OutOfMemory);
    assert_eq!(err.errno(), errno::ENOMEM);
    assert_eq!(vm.frames().free_frame_count(), 0);

    vm.as_destroy(space);
    assert_eq!(vm.frames().free_frame_count(), free);
}

#[test]
fn failed_copies_release_their_frames() {
    let ram = HostRam::with_size(24 * PAGE_SIZE as usize);
    let vm = boot(&ram);
    let parent = prepared(&vm);
    let free = vm.frames().free_frame_count();
    assert!(free < parent.frame_count());

    assert_eq!(vm.as_copy(&parent).expect_err("no room"), VmError::OutOfMemory);
    assert_eq!(vm.frames().free_frame_count(), free);

    vm.as_destroy(parent);
}

#[test]
fn a_full_tlb_is_refilled_by_replacement() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut space = vm.as_create();
    vm.as_define_region(&mut space, va(TEXT), 40 * PAGE_SIZE as usize, RegionPermissions::all())
        .expect("text region");
    vm.as_define_region(&mut space, va(DATA), 20 * PAGE_SIZE as usize, RegionPermissions::all())
        .expect("data region");
    vm.as_prepare_load(&mut space).expect("frames");
    vm.as_activate(Some(&space));

    let pages = (0..40)
        .map(|i| TEXT + i * PAGE_SIZE)
        .chain((0..20).map(|i| DATA + i * PAGE_SIZE))
        .chain((1..=12).map(|i| STACK_TOP - i * PAGE_SIZE));

    let mut replaced = 0;
    for (n, addr) in pages.enumerate() {
        let write = handle_fault(vm.cpu(), Some(&space), FaultKind::Read, va(addr)).expect("mapped");
        match write {
            TlbWrite::Free(index) => assert_eq!(index, n),
            TlbWrite::Replaced(index) => {
                assert!(n >= 64);
                assert!((8..64).contains(&index));
                replaced += 1;
            }
        }
        assert!(vm.cpu().with_tlb(|tlb| tlb.lookup(va(addr)).is_some()));
    }
    assert_eq!(replaced, 72 - 64);
    assert_eq!(vm.cpu().with_tlb(|tlb| tlb.valid_count()), 64);

    vm.as_activate(None);
    assert_eq!(vm.cpu().with_tlb(|tlb| tlb.valid_count()), 64);
    vm.as_deactivate(Some(&space));
    vm.as_activate(Some(&space));
    assert_eq!(vm.cpu().with_tlb(|tlb| tlb.valid_count()), 0);

    vm.as_destroy(space);
}

#[test]
fn kernel_pages_live_in_kseg0() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let free = vm.frames().free_frame_count();

    let pages = vm.alloc_kpages(3).expect("three pages");
    assert!(pages.is_kseg0());
    assert_eq!(pages.page_offset(), 0);
    assert_eq!(vm.frames().free_frame_count(), free - 3);

    assert_eq!(vm.alloc_kpages(free), None);
    assert_eq!(vm.alloc_kpages(0), None);

    vm.free_kpages(pages);
    assert_eq!(vm.frames().free_frame_count(), free);
}

#[test]
fn kernel_pages_taken_during_boot_are_never_returned() {
    let ram = HostRam::with_size(1024 * 1024);
    // SAFETY: the simulated RAM is used by nothing else.
    let vm: TestVm<'_> =
        unsafe { Vm::new(&ram, ram.window(), SoftTlb::new(), HostInterrupts::new()) };

    let early = vm.alloc_kpages(2).expect("stolen");
    vm.bootstrap();
    let free = vm.frames().free_frame_count();

    vm.free_kpages(early);
    assert_eq!(vm.frames().free_frame_count(), free);
    let frame = PhysicalPage::containing(early.kseg0_to_phys().expect("kseg0"));
    assert_eq!(vm.frames().frame_state(frame), None);
}

#[test]
#[should_panic(expected = "not a KSEG0 address")]
fn freeing_a_user_address_panics() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    vm.free_kpages(va(TEXT));
}

#[test]
#[should_panic(expected = "not managed")]
fn freeing_the_frame_table_panics() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    vm.free_kpages(va(STACK_TOP));
}

#[test]
#[should_panic(expected = "already has frames")]
fn preparing_twice_panics() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    let mut space = prepared(&vm);
    let _ = vm.as_prepare_load(&mut space);
}

#[test]
#[should_panic(expected = "TLB shootdown")]
fn shootdown_is_not_supported() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    vm.tlb_shootdown(&TlbShootdown { address: va(TEXT) });
}

#[test]
#[should_panic(expected = "TLB shootdown")]
fn shootdown_all_is_not_supported() {
    let ram = HostRam::with_size(1024 * 1024);
    let vm = boot(&ram);
    vm.tlb_shootdown_all();
}
