//! Windows bindings: the resolved ntdll capability, registry-backed
//! configuration, and the event log sink

pub mod eventlog;
pub mod ntapi;
pub mod registry;
pub mod system;

pub use ntapi::NtMemoryOps;
