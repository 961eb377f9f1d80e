#![cfg(test)]
//! Property tests for the frame allocator.
//!
//! Random interleavings of allocations and releases must never hand out a
//! frame that still belongs to a live allocation, and a release must return
//! exactly the frames of its allocation.

use crate::{FrameAlloc, FrameAllocError, FrameState, HostRam, PhysFrameAllocator};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::vec::Vec;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Release the live allocation at this position (modulo the live count).
    Free(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..=6).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

fn frames_of(first: PhysicalPage, count: usize) -> impl Iterator<Item = PhysicalPage> {
    (0..count).map(move |i| first.add_pages(u32::try_from(i).expect("small run")))
}

proptest! {
    #[test]
    fn live_allocations_never_overlap(ops in prop::collection::vec(arb_op(), 1..200)) {
        let ram = HostRam::with_size(48 * PAGE_SIZE as usize);
        let pmm = unsafe { PhysFrameAllocator::new(&ram, ram.window()) };
        pmm.bootstrap();

        let mut live: Vec<(PhysicalPage, usize)> = Vec::new();
        let mut owned: BTreeSet<PhysicalPage> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Alloc(count) => match pmm.alloc_frames(count) {
                    Ok(first) => {
                        for frame in frames_of(first, count) {
                            prop_assert!(owned.insert(frame), "{:?} handed out twice", frame);
                        }
                        live.push((first, count));
                    }
                    Err(e) => prop_assert_eq!(e, FrameAllocError::OutOfMemory),
                },
                Op::Free(pick) if !live.is_empty() => {
                    let (first, count) = live.swap_remove(pick % live.len());
                    pmm.free_frames(first);
                    for frame in frames_of(first, count) {
                        prop_assert!(owned.remove(&frame));
                        prop_assert_eq!(pmm.frame_state(frame), Some(FrameState::Free));
                    }
                }
                Op::Free(_) => {}
            }

            prop_assert_eq!(pmm.free_frame_count() + owned.len(), pmm.total_frame_count());
        }
    }

    #[test]
    fn release_restores_exactly_the_run(before in 0usize..5, count in 1usize..8, after in 0usize..5) {
        let ram = HostRam::with_size(32 * PAGE_SIZE as usize);
        let pmm = unsafe { PhysFrameAllocator::new(&ram, ram.window()) };
        pmm.bootstrap();

        let left = (before > 0).then(|| pmm.alloc_frames(before).expect("left"));
        let run = pmm.alloc_frames(count).expect("run");
        let right = (after > 0).then(|| pmm.alloc_frames(after).expect("right"));

        pmm.free_frames(run);
        prop_assert_eq!(pmm.free_frame_count(), pmm.total_frame_count() - before - after);

        if let Some(left) = left {
            prop_assert_eq!(pmm.frame_state(left), Some(FrameState::Head { run_length: u32::try_from(before).expect("small") }));
        }
        if let Some(right) = right {
            prop_assert_eq!(pmm.frame_state(right), Some(FrameState::Head { run_length: u32::try_from(after).expect("small") }));
        }
        prop_assert_eq!(pmm.alloc_frames(count), Ok(run));
    }
}
