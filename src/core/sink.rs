//! Diagnostic sink abstraction

use tracing::{error, info};

/// Append-only sink for operational notices and errors.
///
/// Fire-and-forget: implementations swallow their own failures, the
/// monitor never checks whether a message landed.
pub trait EventSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that forwards to the tracing subscriber, used for foreground runs.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}
