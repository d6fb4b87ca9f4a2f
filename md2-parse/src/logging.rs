//! Injectable log sink shared by the parser and the generators.
//!
//! Library calls default to [`NoopSink`]. Binaries that want output pass a
//! [`TracingSink`] and install a `tracing` subscriber.

pub use tracing::Level;

/// Receiver for diagnostic messages.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards messages to the `tracing` macros under the `md2` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "md2", "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "md2", "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "md2", "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "md2", "{message}");
        } else {
            tracing::trace!(target: "md2", "{message}");
        }
    }
}

pub(crate) static NOOP: NoopSink = NoopSink;
