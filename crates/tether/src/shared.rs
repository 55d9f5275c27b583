//! The shared-ownership handle.
//!
//! A [`Shared<T>`] is either empty or one of the owners of a heap object.
//! Cloning adds an owner, dropping removes one, and the object's
//! [`Deleter`] runs when the last owner goes away. All of that bookkeeping
//! is delegated to the [`ControlBlock`]; the handle only ever reads counts
//! to report them.
//!
//! ```text
//!            new / from_box / reset_to          clone / assign
//!   Empty ─────────────────────────────▶ Owning ◀──────────────▶ Owning
//!     ▲                                    │
//!     └──── take / reset / move_from ──────┘ (drop releases one owner)
//! ```

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use tether_core::{ControlBlock, Deleter, HandleError, LogHook, SharedHook};

/// An owned object and the block that counts its owners.
struct Ownership<T> {
    object: NonNull<T>,
    block: NonNull<ControlBlock<T>>,
}

impl<T> Clone for Ownership<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ownership<T> {}

/// A shared-ownership handle to a heap-allocated `T`.
///
/// Unlike `Arc`, a handle may be empty, may carry a custom [`Deleter`],
/// and can be reset in place. Dereferencing an empty handle panics; use
/// [`get_ref`](Self::get_ref) or [`try_get`](Self::try_get) when emptiness
/// is expected.
///
/// Copies of a handle may be cloned and dropped concurrently from any
/// number of threads. A single handle is mutated through `&mut self`, so
/// it cannot be raced on.
pub struct Shared<T> {
    owned: Option<Ownership<T>>,
    _marker: PhantomData<T>,
}

// SAFETY: owners on different threads share `&T` and any of them may end up
// dropping the `T`, exactly as with `Arc<T>`.
unsafe impl<T: Send + Sync> Send for Shared<T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for Shared<T> {}

// Compile-time assertion: Shared<T> is Send + Sync for thread-safe T.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Shared<String>>();
};

impl<T> Shared<T> {
    /// An empty handle. Allocates nothing.
    pub const fn null() -> Self {
        Self {
            owned: None,
            _marker: PhantomData,
        }
    }

    /// Move `value` to the heap and take sole ownership of it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Take sole ownership of a boxed object.
    pub fn from_box(value: Box<T>) -> Self {
        Self::with_deleter(value, Deleter::boxed())
    }

    /// Take sole ownership of a boxed object, destroying it with `deleter`.
    pub fn with_deleter(value: Box<T>, deleter: Deleter<T>) -> Self {
        Self::adopt(NonNull::from(Box::leak(value)), deleter, None)
    }

    /// Take ownership of a raw pointer from `Box::into_raw`. A null pointer
    /// yields an empty handle without allocating a control block.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from `Box::into_raw` and must not be
    /// owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        unsafe { Self::from_raw_with_deleter(ptr, Deleter::boxed()) }
    }

    /// Take ownership of a raw pointer, destroying it with `deleter`. A null
    /// pointer yields an empty handle and `deleter` is dropped unused.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must be valid for reads for as long as any owner
    /// exists, must not be owned by anything else, and `deleter` must be
    /// able to destroy it.
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: Deleter<T>) -> Self {
        match NonNull::new(ptr) {
            Some(object) => Self::adopt(object, deleter, None),
            None => Self::null(),
        }
    }

    /// Start configuring a new handle.
    pub fn builder() -> SharedBuilder<T> {
        SharedBuilder::new()
    }

    fn adopt(object: NonNull<T>, deleter: Deleter<T>, hook: Option<SharedHook>) -> Self {
        Self {
            owned: Some(Ownership {
                object,
                block: ControlBlock::create(object, deleter, hook),
            }),
            _marker: PhantomData,
        }
    }

    // ── Copy and move ─────────────────────────────────────────────

    /// Become another owner of whatever `source` owns, releasing what this
    /// handle owned first. A no-op when both already share a block.
    ///
    /// The old owner reference is released before the new one is taken,
    /// so hooks see `SharedReleased` for the old block ahead of
    /// `SharedAcquired` for the new one.
    pub fn assign(&mut self, source: &Shared<T>) {
        if Self::ptr_eq(self, source) {
            return;
        }
        // `source` holds its own reference, so releasing ours cannot free
        // the block it points at.
        self.reset();
        *self = source.clone();
    }

    /// Take over what `source` owns, leaving `source` empty and releasing
    /// what this handle owned. No owner count changes for the moved state.
    pub fn move_from(&mut self, source: &mut Shared<T>) {
        *self = source.take();
    }

    /// Move the owned state out, leaving this handle empty.
    pub fn take(&mut self) -> Shared<T> {
        mem::take(self)
    }

    /// Install `other` and return the previously owned state.
    pub fn replace(&mut self, other: Shared<T>) -> Shared<T> {
        mem::replace(self, other)
    }

    /// Exchange owned state with `other`. No counts change.
    pub fn swap(&mut self, other: &mut Shared<T>) {
        mem::swap(self, other);
    }

    // ── Reset ─────────────────────────────────────────────────────

    /// Release the owned object, if any, and become empty.
    pub fn reset(&mut self) {
        if let Some(owned) = self.owned.take() {
            // SAFETY: `owned` held one owner reference, given up here.
            let _ = unsafe { ControlBlock::release_shared(owned.block) };
        }
    }

    /// Release the owned object and take sole ownership of `value`.
    pub fn reset_to(&mut self, value: T) {
        self.reset_box(Box::new(value));
    }

    /// Release the owned object and take sole ownership of a boxed one.
    ///
    /// The new control block inherits this handle's lifecycle hook. It is
    /// allocated before the old object is released, so an allocation
    /// failure leaves the handle untouched.
    pub fn reset_box(&mut self, value: Box<T>) {
        self.reset_with_deleter(value, Deleter::boxed());
    }

    /// Like [`reset_box`](Self::reset_box) with a custom deleter.
    pub fn reset_with_deleter(&mut self, value: Box<T>, deleter: Deleter<T>) {
        let fresh = Self::adopt(NonNull::from(Box::leak(value)), deleter, self.hook());
        *self = fresh;
    }

    /// Release the owned object and take ownership of a raw pointer from
    /// `Box::into_raw`. A null pointer leaves the handle empty.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw).
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        let fresh = match NonNull::new(ptr) {
            Some(object) => Self::adopt(object, Deleter::boxed(), self.hook()),
            None => Self::null(),
        };
        *self = fresh;
    }

    // ── Access ────────────────────────────────────────────────────

    /// The managed object's address, or null when empty. Does not affect
    /// ownership; the pointer dangles once every owner is gone.
    pub fn get(&self) -> *const T {
        match self.owned {
            Some(owned) => owned.object.as_ptr(),
            None => ptr::null(),
        }
    }

    /// Borrow the managed object, or `None` when empty.
    pub fn get_ref(&self) -> Option<&T> {
        // SAFETY: this handle's owner reference keeps the object alive for
        // the lifetime of `&self`.
        self.owned.map(|owned| unsafe { owned.object.as_ref() })
    }

    /// Borrow the managed object, failing with [`HandleError::Empty`].
    pub fn try_get(&self) -> Result<&T, HandleError> {
        self.get_ref().ok_or(HandleError::Empty)
    }

    /// Borrow the managed object without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The handle must not be empty.
    pub unsafe fn get_unchecked(&self) -> &T {
        debug_assert!(self.owned.is_some(), "get_unchecked on an empty handle");
        // SAFETY: caller guarantees the handle owns an object.
        unsafe { self.owned.unwrap_unchecked().object.as_ref() }
    }

    /// Mutably borrow the managed object if this is its only owner.
    pub fn get_mut(&mut self) -> Result<&mut T, HandleError> {
        let Some(mut owned) = self.owned else {
            return Err(HandleError::Empty);
        };
        let use_count = self.use_count();
        if use_count != 1 {
            return Err(HandleError::NotUnique { use_count });
        }
        // SAFETY: a count of one read with Acquire means every other owner
        // has released (and synchronised with us), and no new owner can be
        // made without borrowing this handle. Observers never touch the
        // object.
        Ok(unsafe { owned.object.as_mut() })
    }

    // ── Introspection ─────────────────────────────────────────────

    /// Number of owners, or 0 when empty. A snapshot only.
    pub fn use_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::shared_count)
    }

    /// Number of observers registered on the control block, or 0 when empty.
    pub fn observer_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::observer_count)
    }

    /// Whether this handle owns an object.
    pub fn is_owning(&self) -> bool {
        self.owned.is_some()
    }

    /// Whether this handle is empty.
    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    /// Whether two handles share a control block. Two empty handles are
    /// equal.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.owned, other.owned) {
            (Some(a), Some(b)) => a.block == b.block,
            (None, None) => true,
            _ => false,
        }
    }

    /// The control block, for building observer bookkeeping on top.
    pub fn control_block(&self) -> Option<&ControlBlock<T>> {
        // SAFETY: the block outlives every owner reference, including ours.
        self.owned.map(|owned| unsafe { owned.block.as_ref() })
    }

    fn hook(&self) -> Option<SharedHook> {
        self.control_block().and_then(|block| block.hook().cloned())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.control_block() {
            block.increment_shared();
        }
        Self {
            owned: self.owned,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        match self.get_ref() {
            Some(value) => value,
            None => panic!("dereferenced an empty Shared handle"),
        }
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get_ref() {
            Some(value) => f
                .debug_struct("Shared")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("Shared(empty)"),
        }
    }
}

impl<T> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.get(), f)
    }
}

// ── SharedBuilder ──────────────────────────────────────────────────

/// Per-construction options for a [`Shared`] handle.
///
/// ```
/// use tether::{Deleter, Shared};
///
/// let handle = Shared::builder()
///     .deleter(Deleter::with_box(|b: Box<u32>| assert_eq!(*b, 5)))
///     .log_lifecycle()
///     .build(5u32);
/// assert_eq!(handle.use_count(), 1);
/// ```
pub struct SharedBuilder<T> {
    deleter: Deleter<T>,
    hook: Option<SharedHook>,
}

impl<T> SharedBuilder<T> {
    /// Default deleter, no hook.
    pub fn new() -> Self {
        Self {
            deleter: Deleter::boxed(),
            hook: None,
        }
    }

    /// Destroy the object with `deleter` instead of dropping the box.
    pub fn deleter(mut self, deleter: Deleter<T>) -> Self {
        self.deleter = deleter;
        self
    }

    /// Report the control block's transitions to `hook`.
    pub fn hook(mut self, hook: SharedHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Report transitions through the `log` facade with the default
    /// [`HookConfig`](tether_core::HookConfig).
    pub fn log_lifecycle(self) -> Self {
        self.hook(LogHook::default().into_shared())
    }

    /// Move `value` to the heap and build the handle.
    pub fn build(self, value: T) -> Shared<T> {
        self.build_box(Box::new(value))
    }

    /// Build a handle owning a boxed object.
    pub fn build_box(self, value: Box<T>) -> Shared<T> {
        Shared::adopt(NonNull::from(Box::leak(value)), self.deleter, self.hook)
    }

    /// Build a handle owning a raw pointer. A null pointer yields an empty
    /// handle and the configured deleter is dropped unused.
    ///
    /// # Safety
    ///
    /// Same contract as [`Shared::from_raw_with_deleter`].
    pub unsafe fn build_raw(self, ptr: *mut T) -> Shared<T> {
        match NonNull::new(ptr) {
            Some(object) => Shared::adopt(object, self.deleter, self.hook),
            None => Shared::null(),
        }
    }
}

impl<T> Default for SharedBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
