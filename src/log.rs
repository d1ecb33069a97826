use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::LogLevel;

/// Emits one JSON object per log line: `{"ts", "f", "l", "msg"}`.
///
/// `f` is the log record's target (its module path by default), which
/// plays the role the original implementation's `%(funcName)s` played —
/// a logical source identifying where the line came from. Downstream log
/// consumers depend on this exact shape, so this is a small dedicated
/// backend rather than a generic subscriber configured to "look similar".
struct JsonLogger {
    level: LevelFilter,
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = serde_json::json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "f": record.target(),
            "l": record.line().unwrap_or(0),
            "msg": record.args().to_string(),
        });

        println!("{}", line);
    }

    fn flush(&self) {}
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
        }
    }
}

/// Installs the process-wide JSON logger at the given level. Must be
/// called exactly once, before the first log line is emitted.
pub fn init(level: LogLevel) -> Result<(), SetLoggerError> {
    let level_filter: LevelFilter = level.into();
    log::set_max_level(level_filter);
    log::set_boxed_logger(Box::new(JsonLogger {
        level: level_filter,
    }))
}
