//! Integration test: handles copied, moved and dropped across threads.
//!
//! Every scenario checks the one invariant that matters under contention:
//! each managed object is destroyed exactly once, and the control block is
//! freed exactly once, after the last reference of any kind is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crossbeam_channel::unbounded;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tether::{EventKind, LifecycleEvent, LifecycleHook, Shared, SharedHook};
use tether_test_utils::{init_logging, DeleterLog, DropLedger, RecordingHook, Tracked};

const THREADS: usize = 8;
const ROUNDS: usize = 1_000;

#[test]
fn barrier_release_deletes_once() {
    init_logging();
    for round in 0..50_u64 {
        let ledger = DropLedger::new();
        let root = Shared::new(ledger.track(round));
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let mine = root.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    drop(mine);
                })
            })
            .collect();
        drop(root);

        for worker in workers {
            worker.join().expect("worker panicked");
        }
        assert_eq!(ledger.drops(round), 1, "round {round}");
    }
}

#[test]
fn contended_clone_and_drop_keeps_count() {
    let (recorder, hook) = RecordingHook::new();
    let log = DeleterLog::new();
    let root = Shared::builder()
        .hook(hook)
        .deleter(log.deleter("contended"))
        .build(vec![1_u32, 2, 3]);

    thread::scope(|s| {
        for _ in 0..THREADS {
            let root = &root;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    let copy = root.clone();
                    assert_eq!(copy.len(), 3);
                    drop(copy);
                }
            });
        }
    });

    assert_eq!(root.use_count(), 1);
    assert!(log.is_empty());
    assert_eq!(recorder.count(EventKind::SharedAcquired), THREADS * ROUNDS);

    drop(root);
    assert_eq!(log.count("contended"), 1);
    assert_eq!(recorder.count(EventKind::ObjectDestroyed), 1);
    assert_eq!(recorder.count(EventKind::BlockFreed), 1);
}

#[test]
fn handles_sent_over_channel() {
    let ledger = DropLedger::new();
    let (tx, rx) = unbounded::<Shared<Tracked>>();
    let handle = Shared::new(ledger.track(42));

    let consumers: Vec<_> = (0..THREADS)
        .map(|_| {
            let rx = rx.clone();
            thread::spawn(move || {
                let mut seen = 0_usize;
                for received in rx.iter() {
                    assert_eq!(received.id(), 42);
                    seen += 1;
                }
                seen
            })
        })
        .collect();
    drop(rx);

    for _ in 0..ROUNDS {
        tx.send(handle.clone()).expect("consumers alive");
    }
    drop(tx);
    drop(handle);

    let total: usize = consumers
        .into_iter()
        .map(|c| c.join().expect("consumer panicked"))
        .sum();
    assert_eq!(total, ROUNDS);
    assert_eq!(ledger.drops(42), 1);
}

/// Each thread runs a seeded mix of clone, drop, reset and swap on its own
/// slots, all sharing a few objects.
#[test]
fn seeded_interleavings_delete_each_object_once() {
    const OBJECTS: u64 = 4;
    const SLOTS: usize = 6;

    for seed in 0..16_u64 {
        let ledger = DropLedger::new();
        let roots: Vec<_> = (0..OBJECTS).map(|id| Shared::new(ledger.track(id))).collect();
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let mut slots: Vec<Shared<_>> =
                    (0..SLOTS).map(|i| roots[i % roots.len()].clone()).collect();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed * 1_000 + t as u64);
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        let a = (rng.next_u64() as usize) % SLOTS;
                        let b = (rng.next_u64() as usize) % SLOTS;
                        match rng.next_u64() % 4 {
                            0 => {
                                let copy = slots[b].clone();
                                slots[a] = copy;
                            }
                            1 => slots[a].reset(),
                            2 => {
                                let (lo, hi) = (a.min(b), a.max(b));
                                if lo != hi {
                                    let (left, right) = slots.split_at_mut(hi);
                                    left[lo].swap(&mut right[0]);
                                }
                            }
                            _ => {
                                let mut moved = slots[b].take();
                                slots[a].move_from(&mut moved);
                            }
                        }
                    }
                })
            })
            .collect();
        drop(roots);

        for worker in workers {
            worker.join().expect("worker panicked");
        }
        assert!(
            ledger.all_dropped_once(0..OBJECTS),
            "seed {seed}: drops {:?}",
            ledger.drop_order()
        );
        assert_eq!(ledger.total(), OBJECTS as usize);
    }
}

// ── Releases racing to zero ──────────────────────────────────────────

/// Hook owned only by the control block. Parks the first owner release
/// that leaves one owner behind until the test lets it go.
struct ParkOnRelease {
    armed: AtomicBool,
    parked: Arc<Barrier>,
    resume: Arc<Barrier>,
    dropped: Arc<AtomicBool>,
    alive_on_resume: Arc<AtomicBool>,
}

impl LifecycleHook for ParkOnRelease {
    fn on_event(&self, event: &LifecycleEvent) {
        if let LifecycleEvent::SharedReleased { remaining: 1, .. } = event {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.parked.wait();
                self.resume.wait();
                let alive = !self.dropped.load(Ordering::SeqCst);
                self.alive_on_resume.store(alive, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for ParkOnRelease {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn last_release_waits_for_inflight_release_event() {
    init_logging();
    let ledger = DropLedger::new();
    let parked = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));
    let dropped = Arc::new(AtomicBool::new(false));
    let alive_on_resume = Arc::new(AtomicBool::new(false));

    let hook: SharedHook = Arc::new(ParkOnRelease {
        armed: AtomicBool::new(true),
        parked: Arc::clone(&parked),
        resume: Arc::clone(&resume),
        dropped: Arc::clone(&dropped),
        alive_on_resume: Arc::clone(&alive_on_resume),
    });
    let first = Shared::builder().hook(hook).build(ledger.track(5));
    let second = first.clone();

    let releaser = thread::spawn(move || drop(first));
    parked.wait();

    // The releasing thread is inside its `remaining: 1` event. Drive the
    // count to zero and free the block underneath it.
    drop(second);
    assert_eq!(ledger.drops(5), 1);
    assert!(
        !dropped.load(Ordering::SeqCst),
        "hook dropped while one of its events was still running"
    );

    resume.wait();
    releaser.join().expect("releaser panicked");
    assert!(alive_on_resume.load(Ordering::SeqCst));
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn hooked_barrier_release_frees_block_once() {
    for round in 0..50_u64 {
        let ledger = DropLedger::new();
        let (recorder, hook) = RecordingHook::new();
        let root = Shared::builder().hook(hook).build(ledger.track(round));
        let barrier = Arc::new(Barrier::new(THREADS + 1));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let mine = root.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    drop(mine);
                })
            })
            .collect();
        barrier.wait();
        drop(root);

        for worker in workers {
            worker.join().expect("worker panicked");
        }
        assert_eq!(ledger.drops(round), 1, "round {round}");
        assert_eq!(recorder.count(EventKind::SharedReleased), THREADS + 1);
        assert_eq!(recorder.count(EventKind::ObjectDestroyed), 1);
        assert_eq!(recorder.count(EventKind::BlockFreed), 1);
    }
}
