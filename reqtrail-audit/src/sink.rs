//! Destinations for request and response log lines

use parking_lot::Mutex;
use reqtrail_core::LogLevel;

/// Receives formatted log lines together with their channels and level
pub trait LogSink: Send + Sync {
    fn write(&self, channels: &[String], level: LogLevel, message: &str);
}

/// Target of the events emitted by [`TracingSink`]
pub const REQUEST_LOG_TARGET: &str = "reqtrail::request";

/// Forwards log lines to `tracing` under the `reqtrail::request` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn write(&self, channels: &[String], level: LogLevel, message: &str) {
        let channels = channels.join(",");
        let name = level.as_str();
        match level {
            LogLevel::Trace => {
                tracing::trace!(target: REQUEST_LOG_TARGET, channels = %channels, level = name, "{}", message)
            }
            LogLevel::Debug => {
                tracing::debug!(target: REQUEST_LOG_TARGET, channels = %channels, level = name, "{}", message)
            }
            LogLevel::Info | LogLevel::Notice => {
                tracing::info!(target: REQUEST_LOG_TARGET, channels = %channels, level = name, "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(target: REQUEST_LOG_TARGET, channels = %channels, level = name, "{}", message)
            }
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                tracing::error!(target: REQUEST_LOG_TARGET, channels = %channels, level = name, "{}", message)
            }
        }
    }
}

/// One line captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub channels: Vec<String>,
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.level == level)
            .cloned()
            .collect()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.channels.iter().any(|c| c == channel))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, channels: &[String], level: LogLevel, message: &str) {
        self.records.lock().push(LogRecord {
            channels: channels.to_vec(),
            level,
            message: message.to_string(),
        });
    }
}

impl<S: LogSink + ?Sized> LogSink for std::sync::Arc<S> {
    fn write(&self, channels: &[String], level: LogLevel, message: &str) {
        (**self).write(channels, level, message)
    }
}
