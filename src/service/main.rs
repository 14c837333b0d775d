//! Windows service entry point for the standby memory cleaner

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::ffi::OsString;
    use std::sync::Arc;
    use std::time::Duration;

    use windows_service::{
        define_windows_service,
        service::{
            ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
            ServiceType,
        },
        service_control_handler::{self, ServiceControlHandlerResult},
        service_dispatcher,
    };

    use standby_cleaner::core::monitor::{MonitorContext, StandbyMonitor};
    use standby_cleaner::core::sink::EventSink;
    use standby_cleaner::service::SERVICE_NAME;
    use standby_cleaner::windows::eventlog::WindowsEventLog;
    use standby_cleaner::windows::ntapi::NtMemoryOps;
    use standby_cleaner::windows::registry::RegistryConfigStore;
    use standby_cleaner::windows::system::page_size;

    define_windows_service!(ffi_service_main, service_main);

    fn service_main(arguments: Vec<OsString>) {
        if let Err(e) = run_service(arguments) {
            eprintln!("Service error: {}", e);
        }
    }

    fn run_service(
        _arguments: Vec<OsString>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = Arc::new(MonitorContext::new());
        let handler_ctx = Arc::clone(&ctx);

        let event_handler = move |control_event| -> ServiceControlHandlerResult {
            match control_event {
                ServiceControl::Stop => {
                    handler_ctx.request_stop();
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            }
        };

        let status_handle = service_control_handler::register(SERVICE_NAME, event_handler)?;
        let set_state = |state: ServiceState, accepted: ServiceControlAccept| {
            status_handle.set_service_status(ServiceStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state: state,
                controls_accepted: accepted,
                exit_code: ServiceExitCode::Win32(0),
                checkpoint: 0,
                wait_hint: Duration::default(),
                process_id: None,
            })
        };

        let sink = WindowsEventLog::new(SERVICE_NAME);

        // Both startup failures below are unrecoverable within the process
        // lifetime: log, report stopped, and never enter the tick loop.
        let ops = match NtMemoryOps::resolve() {
            Ok(ops) => ops,
            Err(e) => {
                sink.error(&e.to_string());
                set_state(ServiceState::Stopped, ServiceControlAccept::empty())?;
                return Ok(());
            }
        };

        let monitor = StandbyMonitor::new(
            Box::new(ops),
            Box::new(RegistryConfigStore::new()),
            Box::new(WindowsEventLog::new(SERVICE_NAME)),
            page_size(),
        );

        if monitor.check_privileges().is_err() {
            set_state(ServiceState::Stopped, ServiceControlAccept::empty())?;
            return Ok(());
        }

        set_state(ServiceState::Running, ServiceControlAccept::STOP)?;
        sink.info("Standby memory cleaner service started.");

        monitor.run(&ctx);

        set_state(ServiceState::Stopped, ServiceControlAccept::empty())?;
        sink.info("Standby memory cleaner service stopped.");
        Ok(())
    }

    service_dispatcher::start(SERVICE_NAME, ffi_service_main)?;
    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("Windows service only runs on Windows");
}
