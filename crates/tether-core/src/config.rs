//! Configuration for lifecycle instrumentation.
//!
//! [`HookConfig`] controls what [`LogHook`](crate::hook::LogHook) emits and
//! where. It is validated once, when the hook is built; all values are
//! immutable afterwards.

use std::error::Error;
use std::fmt;

use crate::hook::EventKind;

// ── EventFilter ────────────────────────────────────────────────────

/// Set of [`EventKind`]s a hook is interested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventFilter {
    bits: u8,
}

impl EventFilter {
    /// Accept every event kind.
    pub const fn all() -> Self {
        Self {
            bits: EventKind::BlockCreated.bit()
                | EventKind::SharedAcquired.bit()
                | EventKind::SharedReleased.bit()
                | EventKind::ObjectDestroyed.bit()
                | EventKind::BlockFreed.bit(),
        }
    }

    /// Accept no event kind.
    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    /// Only the events that bracket an object's lifetime: block creation,
    /// object destruction and block release. Skips per-copy traffic.
    pub const fn lifetime_only() -> Self {
        Self::none()
            .with(EventKind::BlockCreated)
            .with(EventKind::ObjectDestroyed)
            .with(EventKind::BlockFreed)
    }

    /// Return a copy of this filter that also accepts `kind`.
    pub const fn with(self, kind: EventKind) -> Self {
        Self {
            bits: self.bits | kind.bit(),
        }
    }

    /// Return a copy of this filter that rejects `kind`.
    pub const fn without(self, kind: EventKind) -> Self {
        Self {
            bits: self.bits & !kind.bit(),
        }
    }

    /// Whether `kind` passes the filter.
    pub const fn contains(self, kind: EventKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Whether the filter rejects everything.
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ── HookConfig ─────────────────────────────────────────────────────

/// Configuration for [`LogHook`](crate::hook::LogHook).
#[derive(Clone, Debug)]
pub struct HookConfig {
    /// Level every lifecycle record is emitted at.
    ///
    /// Default: `Trace`.
    pub level: log::Level,

    /// Log target for lifecycle records. Must not be empty.
    ///
    /// Default: `"tether::lifecycle"`, so records can be enabled separately
    /// from the rest of the crate (`RUST_LOG=tether::lifecycle=trace`).
    pub target: &'static str,

    /// Which event kinds are emitted. Default: all of them.
    pub events: EventFilter,
}

impl HookConfig {
    /// Default record level.
    pub const DEFAULT_LEVEL: log::Level = log::Level::Trace;

    /// Default log target.
    pub const DEFAULT_TARGET: &'static str = "tether::lifecycle";

    /// Create a config with the default target and filter at `level`.
    pub fn new(level: log::Level) -> Self {
        Self {
            level,
            target: Self::DEFAULT_TARGET,
            events: EventFilter::all(),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.events.is_empty() {
            return Err(ConfigError::NoEvents);
        }
        Ok(())
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`HookConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The log target is empty or whitespace.
    EmptyTarget,
    /// The event filter rejects every event; use
    /// [`NoopHook`](crate::hook::NoopHook) instead.
    NoEvents,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTarget => write!(f, "log target must not be empty"),
            Self::NoEvents => write!(f, "event filter rejects every event"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HookConfig::default();
        assert_eq!(config.level, log::Level::Trace);
        assert_eq!(config.target, "tether::lifecycle");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn blank_target_rejected() {
        let config = HookConfig {
            target: "  ",
            ..HookConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyTarget));
    }

    #[test]
    fn empty_filter_rejected() {
        let config = HookConfig {
            events: EventFilter::none(),
            ..HookConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoEvents));
    }

    #[test]
    fn filter_with_and_without() {
        let filter = EventFilter::none().with(EventKind::BlockFreed);
        assert!(filter.contains(EventKind::BlockFreed));
        assert!(!filter.contains(EventKind::BlockCreated));
        assert!(filter.without(EventKind::BlockFreed).is_empty());
    }

    #[test]
    fn lifetime_only_skips_copy_traffic() {
        let filter = EventFilter::lifetime_only();
        assert!(filter.contains(EventKind::BlockCreated));
        assert!(filter.contains(EventKind::ObjectDestroyed));
        assert!(filter.contains(EventKind::BlockFreed));
        assert!(!filter.contains(EventKind::SharedAcquired));
        assert!(!filter.contains(EventKind::SharedReleased));
    }

    #[test]
    fn all_contains_every_kind() {
        for kind in EventKind::ALL {
            assert!(EventFilter::all().contains(kind), "{kind:?}");
        }
    }
}
