use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// `log` backend keeping the most recent entries in memory
#[derive(Clone)]
pub struct AppLogger {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
    level: LevelFilter,
    echo_stderr: bool,
}

impl AppLogger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
            level: LevelFilter::Info,
            echo_stderr: false,
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Also print every accepted entry to stderr
    pub fn with_stderr(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A panic while logging leaves the buffer usable
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest_message(&self) -> Option<String> {
        self.lock().back().map(|entry| entry.message.clone())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl log::Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            timestamp: Local::now(),
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };

        if self.echo_stderr {
            eprintln!(
                "{} {:<5} {}: {}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.level,
                entry.target,
                entry.message
            );
        }

        let mut entries = self.lock();
        entries.push_back(entry);

        // Keep only the most recent entries
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn emit(logger: &AppLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("box_labels::pipeline")
                .args(format_args!("{message}"))
                .build(),
        );
    }

    #[test]
    fn test_ring_keeps_latest() {
        let logger = AppLogger::new(2);
        emit(&logger, Level::Info, "one");
        emit(&logger, Level::Warn, "two");
        emit(&logger, Level::Error, "three");

        let messages: Vec<_> = logger.get_entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["two", "three"]);
        assert_eq!(logger.latest_message().as_deref(), Some("three"));

        logger.clear();
        assert!(logger.get_entries().is_empty());
    }

    #[test]
    fn test_level_filter() {
        let logger = AppLogger::new(10).with_level(LevelFilter::Warn);
        emit(&logger, Level::Info, "quiet");
        emit(&logger, Level::Warn, "loud");
        let entries = logger.get_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::Warn);
        assert_eq!(entries[0].target, "box_labels::pipeline");
    }
}
