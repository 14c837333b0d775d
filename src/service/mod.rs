//! Service registration against the Windows service manager

use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use windows_service::service::{
    ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState, ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

pub const SERVICE_NAME: &str = "StandbyCleaner";
pub const SERVICE_DISPLAY_NAME: &str = "Standby Memory Cleaner";

/// Name of the companion binary the service manager launches.
const SERVICE_BINARY: &str = "standby-cleaner-service.exe";

fn service_binary_path() -> Result<PathBuf, Box<dyn Error>> {
    let mut path = std::env::current_exe()?;
    path.set_file_name(SERVICE_BINARY);
    Ok(path)
}

/// Register the monitor service for automatic start and start it.
///
/// Installing when the service already exists leaves it untouched and
/// succeeds.
pub fn install() -> Result<(), Box<dyn Error>> {
    let manager = ServiceManager::local_computer(
        None::<&str>,
        ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
    )?;

    if manager
        .open_service(SERVICE_NAME, ServiceAccess::QUERY_STATUS)
        .is_ok()
    {
        return Ok(());
    }

    let info = ServiceInfo {
        name: OsString::from(SERVICE_NAME),
        display_name: OsString::from(SERVICE_DISPLAY_NAME),
        service_type: ServiceType::OWN_PROCESS,
        start_type: ServiceStartType::AutoStart,
        error_control: ServiceErrorControl::Normal,
        executable_path: service_binary_path()?,
        launch_arguments: vec![],
        dependencies: vec![],
        account_name: None,
        account_password: None,
    };

    let service = manager.create_service(&info, ServiceAccess::START)?;
    service.start::<&OsStr>(&[])?;
    Ok(())
}

/// Stop the service if it is running, then remove it.
pub fn uninstall() -> Result<(), Box<dyn Error>> {
    let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
    let service = manager.open_service(
        SERVICE_NAME,
        ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE,
    )?;

    if let Ok(status) = service.query_status() {
        if status.current_state != ServiceState::Stopped {
            let _ = service.stop();
        }
    }

    service.delete()?;
    Ok(())
}
