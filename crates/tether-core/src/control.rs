//! The shared control block and its atomic counting protocol.
//!
//! One [`ControlBlock`] is allocated per adopted object and shared by every
//! handle to it. It holds two counters:
//!
//! - `shared`: number of owners. The object is destroyed by the decrement
//!   that moves it from one to zero.
//! - `teardown`: number of observers, plus one reference held collectively
//!   by the owners while any owner remains. The block is freed by the
//!   decrement that moves it from one to zero.
//!
//! Folding the owners into `teardown` means "both counts are zero" is never
//! computed from two loads: the last owner destroys the object, then drops
//! the owners' teardown reference, and whichever decrement of `teardown`
//! reaches zero (the last owner's or the last observer's) frees the block.
//!
//! ```text
//! shared:    1 ─┬─ clone ──▶ 2 ── drop ──▶ 1 ── drop ──▶ 0  (deleter runs)
//! teardown:  1 ─┴──────────────────────────────────────▶ 0  (block freed)
//! ```
//!
//! Every zero-crossing is decided by the value returned from a single
//! atomic read-modify-write, never by a follow-up load.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize, Ordering};

use crate::deleter::Deleter;
use crate::hook::{BlockId, LifecycleEvent, SharedHook};

/// Counts above this abort the process instead of risking wraparound.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Outcome of a decrement on one of the block's counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Decrement {
    /// The counter is still positive; carries its post-decrement value.
    Remaining(usize),
    /// This decrement moved the counter from one to zero. Exactly one
    /// caller ever sees this per counter.
    ReachedZero,
    /// The counter was already zero and was left untouched.
    Underflow,
}

impl Decrement {
    /// Whether this decrement was the one-to-zero transition.
    pub fn reached_zero(self) -> bool {
        matches!(self, Self::ReachedZero)
    }
}

/// Shared bookkeeping for one managed object.
pub struct ControlBlock<T> {
    ptr: NonNull<T>,
    shared: AtomicUsize,
    teardown: AtomicUsize,
    deleter: UnsafeCell<Option<Deleter<T>>>,
    hook: Option<SharedHook>,
}

// SAFETY: the counters are atomic; `deleter` is only touched by the single
// thread that observed `shared` reach zero. Owners on any thread may read
// `T` and the last one may drop it, hence `T: Send + Sync`.
unsafe impl<T: Send + Sync> Send for ControlBlock<T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for ControlBlock<T> {}

impl<T> ControlBlock<T> {
    /// Allocate a block owning `ptr` with one owner and no observers.
    ///
    /// The returned pointer carries the first owner reference and the
    /// owners' teardown reference. Allocation failure goes through the
    /// global allocator's `handle_alloc_error`.
    pub fn create(
        ptr: NonNull<T>,
        deleter: Deleter<T>,
        hook: Option<SharedHook>,
    ) -> NonNull<Self> {
        let block = NonNull::from(Box::leak(Box::new(Self {
            ptr,
            shared: AtomicUsize::new(1),
            teardown: AtomicUsize::new(1),
            deleter: UnsafeCell::new(Some(deleter)),
            hook,
        })));
        // SAFETY: just allocated, not yet shared.
        let created = unsafe { block.as_ref() };
        created.emit(LifecycleEvent::BlockCreated { block: created.id() });
        block
    }

    /// Identity of this block, for diagnostics.
    pub fn id(&self) -> BlockId {
        BlockId(self as *const Self as usize)
    }

    /// The managed object's address. Only the deleter may assume it is
    /// live once `shared` has reached zero.
    pub fn managed_ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// The hook attached at creation, if any.
    pub fn hook(&self) -> Option<&SharedHook> {
        self.hook.as_ref()
    }

    /// Add an owner. Returns the owner count after the increment.
    ///
    /// The caller must already hold an owner reference; this never revives
    /// a block whose count has reached zero.
    pub fn increment_shared(&self) -> usize {
        // Relaxed: a new owner can only be made from an existing one, which
        // already keeps the object alive.
        let prev = self.shared.fetch_add(1, Ordering::Relaxed);
        if prev > MAX_REFCOUNT {
            std::process::abort();
        }
        debug_assert!(prev != 0, "increment_shared on a released block");
        let use_count = prev + 1;
        self.emit(LifecycleEvent::SharedAcquired {
            block: self.id(),
            use_count,
        });
        use_count
    }

    /// Remove an owner.
    ///
    /// Never wraps: a decrement at zero is reported as
    /// [`Decrement::Underflow`] and changes nothing. On
    /// [`Decrement::ReachedZero`] the caller must run
    /// [`invoke_deleter`](Self::invoke_deleter) and then release the
    /// owners' teardown reference with
    /// [`decrement_observer`](Self::decrement_observer);
    /// [`release_shared`](Self::release_shared) does all three.
    ///
    /// # Safety
    ///
    /// The caller must give up an owner reference it actually holds.
    pub unsafe fn decrement_shared(&self) -> Decrement {
        // Unless this decrement reaches zero, another owner may free the
        // block as soon as it lands. Nothing in `self` is read after it.
        let block = self.id();
        let hook = self.hook.clone();
        // Release: this owner's uses of the object happen-before the
        // destruction performed by whoever reaches zero.
        let outcome = match self
            .shared
            .fetch_update(Ordering::Release, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            Ok(1) => {
                // Acquire: synchronise with every earlier owner's Release.
                atomic::fence(Ordering::Acquire);
                Decrement::ReachedZero
            }
            Ok(prev) => Decrement::Remaining(prev - 1),
            Err(_) => {
                log::error!("block {block} shared count decremented below zero");
                return Decrement::Underflow;
            }
        };
        if let Some(hook) = hook {
            hook.on_event(&LifecycleEvent::SharedReleased {
                block,
                remaining: match outcome {
                    Decrement::Remaining(n) => n,
                    _ => 0,
                },
            });
        }
        outcome
    }

    /// Add an observer. Observers keep the block, not the object, alive.
    ///
    /// The caller must hold an owner or observer reference.
    pub fn increment_observer(&self) {
        let prev = self.teardown.fetch_add(1, Ordering::Relaxed);
        if prev > MAX_REFCOUNT {
            std::process::abort();
        }
        debug_assert!(prev != 0, "increment_observer on a freed block");
    }

    /// Release an observer reference, or the owners' teardown reference.
    ///
    /// [`Decrement::Remaining`] carries the teardown count: observers plus
    /// one while any owner remains. On [`Decrement::ReachedZero`] both
    /// counts are zero and the caller must free the block with
    /// [`destroy`](Self::destroy); [`release_observer`](Self::release_observer)
    /// does both.
    ///
    /// # Safety
    ///
    /// The caller must give up a teardown reference it actually holds:
    /// an observer reference, or the owners' reference right after
    /// `decrement_shared` returned `ReachedZero`.
    pub unsafe fn decrement_observer(&self) -> Decrement {
        let block = self.id();
        match self
            .teardown
            .fetch_update(Ordering::Release, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            Ok(1) => {
                atomic::fence(Ordering::Acquire);
                Decrement::ReachedZero
            }
            Ok(prev) => Decrement::Remaining(prev - 1),
            Err(_) => {
                log::error!("block {block} observer count decremented below zero");
                Decrement::Underflow
            }
        }
    }

    /// Run the deleter on the managed object. A second call does nothing.
    ///
    /// # Safety
    ///
    /// Only the caller that received [`Decrement::ReachedZero`] from
    /// [`decrement_shared`](Self::decrement_shared) may call this, and no
    /// one may use the managed object afterwards.
    pub unsafe fn invoke_deleter(&self) {
        // SAFETY: the unique zero transition gives this caller exclusive
        // access to the deleter slot.
        let deleter = unsafe { (*self.deleter.get()).take() };
        if let Some(deleter) = deleter {
            // SAFETY: `ptr` is the pointer the deleter was created for and
            // no owner remains to observe it.
            unsafe { deleter.delete(self.ptr) };
            self.emit(LifecycleEvent::ObjectDestroyed { block: self.id() });
        }
    }

    /// Snapshot of the owner count. Stale as soon as it is read; never use
    /// it to decide whether to destroy anything.
    pub fn shared_count(&self) -> usize {
        self.shared.load(Ordering::Acquire)
    }

    /// Snapshot of the observer count, excluding the owners' teardown
    /// reference. May be off by one while the last owner is mid-release.
    pub fn observer_count(&self) -> usize {
        let teardown = self.teardown.load(Ordering::Acquire);
        let owners_hold = usize::from(self.shared.load(Ordering::Acquire) > 0);
        teardown.saturating_sub(owners_hold)
    }

    /// Deallocate the block.
    ///
    /// # Safety
    ///
    /// `this` must come from [`create`](Self::create), the caller must have
    /// received [`Decrement::ReachedZero`] from
    /// [`decrement_observer`](Self::decrement_observer), and the block must
    /// not be used afterwards.
    pub unsafe fn destroy(this: NonNull<Self>) {
        // SAFETY: caller contract; the block is still allocated here.
        let block = unsafe { this.as_ref() };
        block.emit(LifecycleEvent::BlockFreed { block: block.id() });
        // SAFETY: allocated by Box in `create`, no references remain.
        drop(unsafe { Box::from_raw(this.as_ptr()) });
    }

    /// Release one owner and perform whatever teardown it triggers: run the
    /// deleter on the one-to-zero transition, then free the block if no
    /// observers remain.
    ///
    /// # Safety
    ///
    /// `this` must be live and the caller must give up an owner reference
    /// it holds. The block may be freed on return.
    pub unsafe fn release_shared(this: NonNull<Self>) -> Decrement {
        // SAFETY: the caller's owner reference keeps the block alive.
        let block = unsafe { this.as_ref() };
        let outcome = unsafe { block.decrement_shared() };
        if outcome.reached_zero() {
            unsafe {
                block.invoke_deleter();
                if block.decrement_observer().reached_zero() {
                    Self::destroy(this);
                }
            }
        }
        outcome
    }

    /// Release one observer, freeing the block if it was the last
    /// reference of any kind.
    ///
    /// # Safety
    ///
    /// `this` must be live and the caller must give up an observer
    /// reference it holds. The block may be freed on return.
    pub unsafe fn release_observer(this: NonNull<Self>) -> Decrement {
        // SAFETY: the caller's observer reference keeps the block alive.
        let outcome = unsafe { this.as_ref().decrement_observer() };
        if outcome.reached_zero() {
            unsafe { Self::destroy(this) };
        }
        outcome
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(hook) = &self.hook {
            hook.on_event(&event);
        }
    }
}

impl<T> fmt::Debug for ControlBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("id", &self.id())
            .field("shared", &self.shared_count())
            .field("observers", &self.observer_count())
            .finish()
    }
}
