//! Type-erased destruction of a managed object.
//!
//! A [`Deleter`] is consumed exactly once, by the control block, when the
//! owner count reaches zero. The default deleter reclaims a `Box<T>`
//! allocation; custom deleters are arbitrary `FnOnce` closures stored by
//! value, so they may carry state (a log sink, a pool to return to).
//!
//! Deleters must not panic. A panic escapes from whichever `Drop` released
//! the last owner, and the control block is leaked.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

type DeleteFn<T> = Box<dyn FnOnce(NonNull<T>) + Send + 'static>;

enum Kind<T> {
    /// Reclaim a `Box<T>` allocation.
    Boxed,
    /// Caller-supplied destruction.
    Custom(DeleteFn<T>),
}

/// Destroys a managed object when its last owner is released.
pub struct Deleter<T> {
    kind: Kind<T>,
}

impl<T> Deleter<T> {
    /// The default deleter: the pointer must come from `Box::into_raw`.
    pub const fn boxed() -> Self {
        Self { kind: Kind::Boxed }
    }

    /// A custom deleter receiving the raw managed pointer.
    ///
    /// The closure takes over whatever the pointer owns. It may leak the
    /// object, return it to a pool, or free it however it was allocated.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(NonNull<T>) + Send + 'static,
    {
        Self {
            kind: Kind::Custom(Box::new(f)),
        }
    }

    /// A custom deleter receiving the object back as a `Box<T>`.
    ///
    /// Only meaningful for objects that were adopted from a `Box`, which is
    /// every safe constructor. Dropping the box destroys the object; the
    /// closure may also move the value out first.
    pub fn with_box<F>(f: F) -> Self
    where
        F: FnOnce(Box<T>) + Send + 'static,
        T: 'static,
    {
        Self::new(move |ptr: NonNull<T>| {
            // SAFETY: every owner of this deleter adopted `ptr` from a Box,
            // and the control block calls the deleter at most once.
            let boxed = unsafe { Box::from_raw(ptr.as_ptr()) };
            f(boxed)
        })
    }

    /// Whether this is the default `Box` deleter.
    pub fn is_boxed(&self) -> bool {
        matches!(self.kind, Kind::Boxed)
    }

    /// Destroy the object behind `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was paired with, it must still
    /// be live, and nothing may use it afterwards.
    pub(crate) unsafe fn delete(self, ptr: NonNull<T>) {
        match self.kind {
            // SAFETY: default-deleter pointers come from Box::into_raw (caller contract).
            Kind::Boxed => drop(unsafe { Box::from_raw(ptr.as_ptr()) }),
            Kind::Custom(f) => f(ptr),
        }
    }
}

impl<T> Default for Deleter<T> {
    fn default() -> Self {
        Self::boxed()
    }
}

impl<T> fmt::Debug for Deleter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Boxed => f.write_str("Deleter::Boxed"),
            Kind::Custom(_) => f.write_str("Deleter::Custom"),
        }
    }
}
