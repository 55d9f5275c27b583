//! Test utilities and fixtures for Tether development.
//!
//! Provides drop accounting ([`DropLedger`], [`Tracked`]), a logging
//! deleter factory ([`DeleterLog`]) and an event-capturing
//! [`RecordingHook`] for asserting on control-block transitions.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{DeleterLog, DropLedger, RecordingHook, Tracked};

/// Route `log` records to the test harness's captured output.
///
/// Safe to call from every test; only the first call installs a logger.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
