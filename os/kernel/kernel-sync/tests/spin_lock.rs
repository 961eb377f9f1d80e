use kernel_sync::SpinLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

/// Stand-in for a piece of allocator bookkeeping guarded by the lock.
#[derive(Debug, Default)]
struct Counters {
    allocated: usize,
    released: usize,
}

#[test]
fn guard_releases_on_drop() {
    let lock = SpinLock::new(Counters::default());

    {
        let mut g = lock.lock();
        g.allocated = 3;
        assert!(lock.is_locked());
    }
    assert!(!lock.is_locked());

    let g = lock.lock();
    assert_eq!(g.allocated, 3);
}

#[test]
fn try_lock_fails_while_held() {
    let lock = SpinLock::new(7_u32);

    let held = lock.try_lock().expect("lock is free");
    assert_eq!(*held, 7);
    assert!(lock.try_lock().is_none());

    drop(held);
    assert!(lock.try_lock().is_some());
}

#[test]
fn with_lock_returns_closure_result() {
    let lock = SpinLock::new(Counters::default());
    let outstanding = lock.with_lock(|c| {
        c.allocated += 5;
        c.released += 2;
        c.allocated - c.released
    });
    assert_eq!(outstanding, 3);
    assert!(!lock.is_locked());
}

#[test]
fn exclusive_access_without_locking() {
    let mut lock = SpinLock::new(vec![0_u8; 4]);
    lock.get_mut()[2] = 9;
    assert_eq!(lock.into_inner(), vec![0, 0, 9, 0]);
}

#[test]
fn concurrent_updates_are_serialized() {
    const THREADS: usize = 6;
    const ROUNDS: usize = 4_000;

    let lock = Arc::new(SpinLock::new(Counters::default()));
    let inside = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..ROUNDS {
                    lock.with_lock(|c| {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        c.allocated += 1;
                        c.released += 1;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                    thread::yield_now();
                }
            })
        })
        .collect();

    for w in workers {
        w.join().expect("worker panicked");
    }

    lock.with_lock(|c| {
        assert_eq!(c.allocated, THREADS * ROUNDS);
        assert_eq!(c.released, THREADS * ROUNDS);
    });
}

#[test]
fn panic_inside_critical_section_unlocks() {
    let lock = SpinLock::new(0_u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        lock.with_lock(|v| {
            *v = 12;
            panic!("fault inside critical section");
        });
    }));
    assert!(res.is_err());

    assert_eq!(lock.with_lock(|v| *v), 12);
}

#[test]
fn usable_from_a_static() {
    static FRAMES: SpinLock<usize> = SpinLock::new(0);
    FRAMES.with_lock(|n| *n += 1);
    assert!(FRAMES.with_lock(|n| *n) >= 1);
}
