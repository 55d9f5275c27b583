//! Tether: atomically reference-counted shared-ownership handles.
//!
//! A [`Shared<T>`] lets any number of owners share one heap object and
//! destroys it, through a per-object [`Deleter`], when the last owner is
//! released. Handles can be empty, reset in place, and instrumented with a
//! [`LifecycleHook`].
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tether::prelude::*;
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&log);
//! let a = Shared::with_deleter(
//!     Box::new(String::from("config")),
//!     Deleter::with_box(move |b: Box<String>| sink.lock().unwrap().push(*b)),
//! );
//!
//! let b = a.clone();
//! assert_eq!(a.use_count(), 2);
//! drop(a);
//! assert_eq!(b.use_count(), 1);
//! assert!(log.lock().unwrap().is_empty());
//!
//! drop(b);
//! assert_eq!(*log.lock().unwrap(), vec!["config".to_string()]);
//! ```
//!
//! # Modules
//!
//! | Item | Crate | Contents |
//! |------|-------|----------|
//! | [`Shared`], [`SharedBuilder`] | `tether` | The handle |
//! | [`base`] | `tether-core` | Control blocks, deleters, hooks, config, errors |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod shared;

pub use shared::{Shared, SharedBuilder};

/// Control blocks, deleters, hooks and configuration (`tether-core`).
///
/// Most users only need [`Deleter`] and, for instrumentation,
/// [`LogHook`]; both are also available at the crate root.
pub use tether_core as base;

pub use tether_core::{
    ConfigError, ControlBlock, Decrement, Deleter, EventFilter, EventKind, HandleError,
    HookConfig, LifecycleEvent, LifecycleHook, LogHook, NoopHook, SharedHook,
};

/// Common imports for typical Tether usage.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Deleter, HandleError, LifecycleEvent, LifecycleHook, LogHook, Shared};
}
