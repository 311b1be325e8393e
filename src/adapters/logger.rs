use crate::ports::logger::Logger;

/// [`Logger`] writing to the `tracing` subscriber installed by the application
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str, cause: &str) {
        tracing::error!(cause, "{message}");
    }
}
