//! Registry-backed configuration store

use std::ffi::c_void;

use tracing::warn;
use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegGetValueW, RegSetValueExW, HKEY, HKEY_LOCAL_MACHINE,
    KEY_READ, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, RRF_RT_REG_DWORD,
};

use crate::core::config::ConfigStore;

/// Configuration key path under HKEY_LOCAL_MACHINE.
const CONFIG_SUBKEY: PCWSTR = w!("SOFTWARE\\StandbyCleaner");

/// Config store persisting DWORD tunables under a fixed registry path.
///
/// The key is opened (created on first use) per read, matching the
/// per-tick read cadence of the monitor. Any registry failure degrades to
/// the compiled-in default; the monitor never sees an error from here.
#[derive(Debug, Default)]
pub struct RegistryConfigStore;

impl RegistryConfigStore {
    pub fn new() -> Self {
        Self
    }

    fn read_or_init(key: HKEY, name: &str, default: u32) -> u32 {
        let wide_name = HSTRING::from(name);
        let mut data: u32 = 0;
        let mut size = std::mem::size_of::<u32>() as u32;

        let status = unsafe {
            RegGetValueW(
                key,
                PCWSTR::null(),
                PCWSTR(wide_name.as_ptr()),
                RRF_RT_REG_DWORD,
                None,
                Some(&mut data as *mut u32 as *mut c_void),
                Some(&mut size),
            )
        };
        if status == ERROR_SUCCESS {
            return data;
        }

        // Absent or unreadable: initialize it so the next read sees the
        // same value the caller gets now.
        let status = unsafe {
            RegSetValueExW(
                key,
                PCWSTR(wide_name.as_ptr()),
                0,
                REG_DWORD,
                Some(&default.to_le_bytes()),
            )
        };
        if status != ERROR_SUCCESS {
            warn!("failed to initialize registry value {}", name);
        }
        default
    }
}

impl ConfigStore for RegistryConfigStore {
    fn get_or_init(&self, name: &str, default: u32) -> u32 {
        let mut key = HKEY::default();
        let status = unsafe {
            RegCreateKeyExW(
                HKEY_LOCAL_MACHINE,
                CONFIG_SUBKEY,
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_READ | KEY_WRITE,
                None,
                &mut key,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            warn!("failed to open configuration key, using default for {}", name);
            return default;
        }

        let value = Self::read_or_init(key, name, default);
        unsafe {
            let _ = RegCloseKey(key);
        }
        value
    }
}
