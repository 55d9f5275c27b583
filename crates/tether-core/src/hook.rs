//! Optional lifecycle instrumentation.
//!
//! A control block may carry a [`LifecycleHook`] that is told about every
//! count transition it performs. Hooks observe; they never influence the
//! protocol, and a block without a hook pays one branch per operation.
//!
//! [`LogHook`] forwards events to the `log` facade. [`NoopHook`] discards
//! them. Any `Fn(&LifecycleEvent) + Send + Sync` closure is also a hook.

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, HookConfig};

/// Opaque identity of a control block, stable for the block's lifetime.
///
/// Derived from the block's address, so an id may be reused by a later
/// block once the earlier one has been freed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Discriminant of a [`LifecycleEvent`], used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`LifecycleEvent::BlockCreated`].
    BlockCreated,
    /// See [`LifecycleEvent::SharedAcquired`].
    SharedAcquired,
    /// See [`LifecycleEvent::SharedReleased`].
    SharedReleased,
    /// See [`LifecycleEvent::ObjectDestroyed`].
    ObjectDestroyed,
    /// See [`LifecycleEvent::BlockFreed`].
    BlockFreed,
}

impl EventKind {
    /// Every kind, in the order they occur over a block's life.
    pub const ALL: [EventKind; 5] = [
        EventKind::BlockCreated,
        EventKind::SharedAcquired,
        EventKind::SharedReleased,
        EventKind::ObjectDestroyed,
        EventKind::BlockFreed,
    ];

    pub(crate) const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A count transition performed by a control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A block was allocated for a newly adopted object.
    BlockCreated {
        /// The new block.
        block: BlockId,
    },
    /// An owner was added.
    SharedAcquired {
        /// The block whose count changed.
        block: BlockId,
        /// Owner count after the increment.
        use_count: usize,
    },
    /// An owner was removed.
    SharedReleased {
        /// The block whose count changed.
        block: BlockId,
        /// Owner count after the decrement.
        remaining: usize,
    },
    /// The deleter ran on the managed object.
    ObjectDestroyed {
        /// The block that owned the object.
        block: BlockId,
    },
    /// The block itself is about to be deallocated.
    BlockFreed {
        /// The block being freed.
        block: BlockId,
    },
}

impl LifecycleEvent {
    /// The event's discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BlockCreated { .. } => EventKind::BlockCreated,
            Self::SharedAcquired { .. } => EventKind::SharedAcquired,
            Self::SharedReleased { .. } => EventKind::SharedReleased,
            Self::ObjectDestroyed { .. } => EventKind::ObjectDestroyed,
            Self::BlockFreed { .. } => EventKind::BlockFreed,
        }
    }

    /// The block the event concerns.
    pub fn block(&self) -> BlockId {
        match *self {
            Self::BlockCreated { block }
            | Self::SharedAcquired { block, .. }
            | Self::SharedReleased { block, .. }
            | Self::ObjectDestroyed { block }
            | Self::BlockFreed { block } => block,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockCreated { block } => write!(f, "block {block} created"),
            Self::SharedAcquired { block, use_count } => {
                write!(f, "block {block} acquired, use_count={use_count}")
            }
            Self::SharedReleased { block, remaining } => {
                write!(f, "block {block} released, remaining={remaining}")
            }
            Self::ObjectDestroyed { block } => write!(f, "block {block} object destroyed"),
            Self::BlockFreed { block } => write!(f, "block {block} freed"),
        }
    }
}

/// Receiver for [`LifecycleEvent`]s.
///
/// Called synchronously on whichever thread performed the transition,
/// possibly from inside a `Drop` impl. Implementations must not panic and
/// must not touch the handle that triggered the event.
pub trait LifecycleHook: Send + Sync {
    /// Observe one transition.
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> LifecycleHook for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Reference-counted hook shared by every block it is attached to.
pub type SharedHook = Arc<dyn LifecycleHook>;

/// Hook that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl LifecycleHook for NoopHook {
    fn on_event(&self, _event: &LifecycleEvent) {}
}

/// Hook that emits events as `log` records.
#[derive(Clone, Debug)]
pub struct LogHook {
    config: HookConfig,
}

impl LogHook {
    /// Build a hook from a validated config.
    pub fn new(config: HookConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Wrap this hook for attachment to control blocks.
    pub fn into_shared(self) -> SharedHook {
        Arc::new(self)
    }
}

impl Default for LogHook {
    fn default() -> Self {
        Self {
            config: HookConfig::default(),
        }
    }
}

impl LifecycleHook for LogHook {
    fn on_event(&self, event: &LifecycleEvent) {
        if self.config.events.contains(event.kind()) {
            log::log!(target: self.config.target, self.config.level, "{event}");
        }
    }
}
