use chrono::Local;
use log::{Level, Metadata, Record, SetLoggerError};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

impl LogMessage {
    fn from_record(record: &Record) -> Self {
        Self {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

/// Writes records to stderr and forwards them to a channel for display.
pub struct ForwardingLogger {
    tx: mpsc::UnboundedSender<LogMessage>,
    level: Level,
}

impl ForwardingLogger {
    pub fn new(level: Level) -> (Self, mpsc::UnboundedReceiver<LogMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, level }, rx)
    }

    /// Installs the logger process-wide. Fails if a logger is already set.
    pub fn init(level: Level) -> Result<mpsc::UnboundedReceiver<LogMessage>, SetLoggerError> {
        let (logger, rx) = Self::new(level);
        // The logger lives for the rest of the process.
        log::set_logger(Box::leak(Box::new(logger)))?;
        log::set_max_level(level.to_level_filter());
        Ok(rx)
    }

    fn forward(&self, record: &Record) {
        // A closed receiver only means nobody is displaying logs anymore.
        let _ = self.tx.send(LogMessage::from_record(record));
    }
}

impl log::Log for ForwardingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
            self.forward(record);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn forwards_enabled_records_only() {
        let (logger, mut rx) = ForwardingLogger::new(Level::Info);
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("battery low"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("noise"))
                .build(),
        );

        let message = rx.try_recv().unwrap();
        assert_eq!(message.level, "WARN");
        assert_eq!(message.message, "battery low");
        assert!(chrono::DateTime::parse_from_rfc3339(&message.timestamp).is_ok());
        assert!(rx.try_recv().is_err());
    }
}
