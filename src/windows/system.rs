//! System-level Windows queries

use sysinfo::System;
use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

/// Hardware page size in bytes.
///
/// Callers cache the result; the value never changes for the lifetime of
/// the machine.
pub fn page_size() -> u64 {
    let info = unsafe {
        let mut info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info
    };
    u64::from(info.dwPageSize)
}

#[derive(Debug, Clone)]
pub struct SystemOverview {
    pub os_name: String,
    pub kernel_version: String,
    pub total_memory_mb: u64,
    pub available_memory_mb: u64,
}

/// Coarse memory overview for the status display.
pub fn system_overview() -> SystemOverview {
    let mut sys = System::new();
    sys.refresh_memory();

    SystemOverview {
        os_name: System::name().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        total_memory_mb: sys.total_memory() / 1024 / 1024,
        available_memory_mb: sys.available_memory() / 1024 / 1024,
    }
}
