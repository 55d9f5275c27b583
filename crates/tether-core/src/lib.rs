//! Control blocks, deleters and lifecycle hooks for Tether shared handles.
//!
//! This is the leaf crate of the Tether workspace. It owns everything that
//! decides *when* a shared object dies; the `tether` crate builds the
//! user-facing `Shared<T>` handle on top of it.
//!
//! # Architecture
//!
//! ```text
//! Shared<T> ──┐
//! Shared<T> ──┼──▶ ControlBlock<T>
//! Shared<T> ──┘    ├── shared:   AtomicUsize   (owners)
//!                  ├── teardown: AtomicUsize   (observers + owners' reference)
//!                  ├── Deleter<T>              (type-erased, consumed once)
//!                  ├── Option<SharedHook>      (instrumentation)
//!                  └── NonNull<T> ──▶ managed object
//! ```
//!
//! `unsafe` is confined to the [`control`] and [`deleter`] modules.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod deleter;
pub mod error;
pub mod hook;

pub use config::{ConfigError, EventFilter, HookConfig};
pub use control::{ControlBlock, Decrement};
pub use deleter::Deleter;
pub use error::HandleError;
pub use hook::{
    BlockId, EventKind, LifecycleEvent, LifecycleHook, LogHook, NoopHook, SharedHook,
};
