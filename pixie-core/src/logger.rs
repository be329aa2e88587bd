//! Lifecycle event sink
use tracing::{debug, info};

/// Receives the server's lifecycle events. Both methods default to doing
/// nothing, so an implementation only overrides the severities it wants.
pub trait Logger: Send + Sync {
    /// informational event
    fn log(&self, _subsystem: &str, _msg: &str) {}
    /// debug event
    fn debug(&self, _subsystem: &str, _msg: &str) {}
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {}

/// Forwards events to `tracing` with a `subsystem` field
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, subsystem: &str, msg: &str) {
        info!(subsystem, "{msg}");
    }

    fn debug(&self, subsystem: &str, msg: &str) {
        debug!(subsystem, "{msg}");
    }
}
