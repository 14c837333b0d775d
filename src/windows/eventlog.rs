//! Windows event log diagnostic sink

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Security::PSID;
use windows::Win32::System::EventLog::{
    DeregisterEventSource, RegisterEventSourceW, ReportEventW, EVENTLOG_ERROR_TYPE,
    EVENTLOG_INFORMATION_TYPE, REPORT_EVENT_TYPE,
};

use crate::core::sink::EventSink;

/// Event sink backed by the application event log.
///
/// Registration happens per report; a sink that cannot reach the event
/// log drops the message, which is the contract for this channel.
#[derive(Debug)]
pub struct WindowsEventLog {
    source: &'static str,
}

impl WindowsEventLog {
    pub fn new(source: &'static str) -> Self {
        Self { source }
    }

    fn report(&self, kind: REPORT_EVENT_TYPE, message: &str) {
        let source = HSTRING::from(self.source);
        let text = HSTRING::from(message);
        let strings = [PCWSTR(text.as_ptr())];

        unsafe {
            let Ok(handle) = RegisterEventSourceW(PCWSTR::null(), PCWSTR(source.as_ptr()))
            else {
                return;
            };
            let _ = ReportEventW(
                handle,
                kind,
                0,
                0,
                PSID::default(),
                0,
                Some(&strings),
                None,
            );
            let _ = DeregisterEventSource(handle);
        }
    }
}

impl EventSink for WindowsEventLog {
    fn info(&self, message: &str) {
        self.report(EVENTLOG_INFORMATION_TYPE, message);
    }

    fn error(&self, message: &str) {
        self.report(EVENTLOG_ERROR_TYPE, message);
    }
}
