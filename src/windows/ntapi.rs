//! NT memory list capability resolved from ntdll
//!
//! The memory-list query and the standby purge both ride the same
//! undocumented system-information channel. Neither entry point is
//! exported through import libraries, so both are resolved from ntdll at
//! startup; resolution failure is terminal for the service.

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::ptr;

use windows::core::{s, w};
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

use crate::core::memlist::{MemoryListCounts, MemoryListOps, NtStatus, ProbeError, PurgeError};

/// System-information class selecting the memory list channel.
const SYSTEM_MEMORY_LIST_INFORMATION: u32 = 0x50;

/// Command value instructing the kernel to discard the standby list.
const MEMORY_PURGE_STANDBY_LIST: u32 = 4;

/// Layout of the kernel's memory list accounting structure.
///
/// The query must be sized to exactly this struct or it fails with a
/// length-mismatch status.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct SystemMemoryListInformation {
    zero_page_count: u64,
    free_page_count: u64,
    modified_page_count: u64,
    modified_no_write_page_count: u64,
    bad_page_count: u64,
    page_count_by_priority: [u64; 8],
    repurposed_pages_by_priority: [u64; 8],
    standby_repurposed_by_priority: [u64; 8],
}

type NtQuerySystemInformationFn =
    unsafe extern "system" fn(u32, *mut c_void, u32, *mut u32) -> i32;
type NtSetSystemInformationFn = unsafe extern "system" fn(u32, *mut c_void, u32) -> i32;

/// An ntdll export needed by the capability could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityError {
    pub symbol: &'static str,
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to resolve {} from ntdll.dll", self.symbol)
    }
}

impl std::error::Error for CapabilityError {}

/// Capability handle over the two privileged ntdll entry points.
///
/// Immutable after resolution; the monitor is the only caller.
pub struct NtMemoryOps {
    query: NtQuerySystemInformationFn,
    set: NtSetSystemInformationFn,
}

impl NtMemoryOps {
    /// Resolve both entry points from ntdll.
    pub fn resolve() -> Result<Self, CapabilityError> {
        unsafe {
            let ntdll = GetModuleHandleW(w!("ntdll.dll")).map_err(|_| CapabilityError {
                symbol: "ntdll.dll",
            })?;
            let query = GetProcAddress(ntdll, s!("NtQuerySystemInformation")).ok_or(
                CapabilityError {
                    symbol: "NtQuerySystemInformation",
                },
            )?;
            let set = GetProcAddress(ntdll, s!("NtSetSystemInformation")).ok_or(
                CapabilityError {
                    symbol: "NtSetSystemInformation",
                },
            )?;

            Ok(Self {
                query: mem::transmute::<_, NtQuerySystemInformationFn>(query),
                set: mem::transmute::<_, NtSetSystemInformationFn>(set),
            })
        }
    }
}

impl MemoryListOps for NtMemoryOps {
    fn query_memory_list(&self) -> Result<MemoryListCounts, ProbeError> {
        let mut info = SystemMemoryListInformation::default();
        let status = NtStatus(unsafe {
            (self.query)(
                SYSTEM_MEMORY_LIST_INFORMATION,
                &mut info as *mut _ as *mut c_void,
                mem::size_of::<SystemMemoryListInformation>() as u32,
                ptr::null_mut(),
            )
        });

        if !status.is_success() {
            return Err(ProbeError { status });
        }

        Ok(MemoryListCounts {
            zero_page_count: info.zero_page_count,
            free_page_count: info.free_page_count,
            modified_page_count: info.modified_page_count,
            modified_no_write_page_count: info.modified_no_write_page_count,
            bad_page_count: info.bad_page_count,
            page_count_by_priority: info.page_count_by_priority,
            repurposed_pages_by_priority: info.repurposed_pages_by_priority,
            standby_repurposed_by_priority: info.standby_repurposed_by_priority,
        })
    }

    fn purge_standby_list(&self) -> Result<(), PurgeError> {
        let mut command = MEMORY_PURGE_STANDBY_LIST;
        let status = NtStatus(unsafe {
            (self.set)(
                SYSTEM_MEMORY_LIST_INFORMATION,
                &mut command as *mut _ as *mut c_void,
                mem::size_of::<u32>() as u32,
            )
        });

        if status.is_success() {
            Ok(())
        } else {
            Err(PurgeError { status })
        }
    }
}
