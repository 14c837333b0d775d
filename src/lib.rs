//! Standby Memory Cleaner
//!
//! A Windows background service that watches effective free memory and
//! purges the standby page list when it drops below a configured
//! threshold.
//!
//! ## Architecture
//!
//! - **Decision core** (`core`): platform-neutral policy loop,
//!   configuration, and the capability seam for the privileged
//!   memory-list calls. Unit-testable on any platform through fakes.
//! - **Windows bindings** (`windows`): the ntdll capability resolved at
//!   startup, the registry configuration store, and the event log sink.
//! - **Service plumbing** (`service`): registration against the service
//!   manager; the dispatch entry point lives in the companion service
//!   binary.
//!
//! ## Safety
//!
//! - Purging requires elevation; a one-time self-check at startup keeps an
//!   unprivileged service from spinning uselessly.
//! - One purge decision per tick bounds the purge rate by the configured
//!   interval.
//! - A failing diagnostic query degrades to a fixed backoff instead of
//!   hot-looping.

pub mod core;
#[cfg(target_os = "windows")]
pub mod service;
#[cfg(target_os = "windows")]
pub mod windows;

// Re-exports
pub use crate::core::config::{ConfigStore, MemoryConfigStore, PolicyConfig};
pub use crate::core::memlist::{
    MemoryListCounts, MemoryListOps, MemorySnapshot, NtStatus, ProbeError, PurgeError,
};
pub use crate::core::monitor::{MonitorContext, StandbyMonitor, Tick, ERROR_BACKOFF};
pub use crate::core::sink::{EventSink, TracingSink};
#[cfg(target_os = "windows")]
pub use crate::windows::ntapi::NtMemoryOps;
