use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use time::macros::format_description;
use time::OffsetDateTime;

/// stderr logger with an optional plain-text file sink.
pub struct Logger {
    pub severity: Level,
    pub enable_colors: bool,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(severity: Level, file_path: Option<PathBuf>, enable_colors: bool) -> Self {
        let file = file_path.and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()
                .map(Mutex::new)
        });
        Self {
            severity,
            enable_colors,
            file,
        }
    }

    fn timestamp() -> String {
        let format = format_description!("[hour]:[minute]:[second]");
        OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_else(|_| "--:--:--".to_string())
    }

    fn color(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[36m",
            Level::Debug => "\x1b[35m",
            Level::Trace => "\x1b[37m",
        }
    }

    fn format(timestamp: &str, record: &Record, colored: bool) -> String {
        let level = record.level();
        if colored {
            format!(
                "{}[{timestamp}] {level}\x1b[0m {}: {}",
                Self::color(level),
                record.target(),
                record.args()
            )
        } else {
            format!("[{timestamp}] {level} {}: {}", record.target(), record.args())
        }
    }

    /// Install from `DOCVIEW_LOG` (or `RUST_LOG`), `DOCVIEW_LOG_FILE` and `NO_COLOR`.
    pub fn init() -> Result<(), log::SetLoggerError> {
        let severity = std::env::var("DOCVIEW_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::Info);
        let file_path = std::env::var("DOCVIEW_LOG_FILE").ok().map(PathBuf::from);
        let enable_colors = std::env::var("NO_COLOR").is_err();

        log::set_max_level(LevelFilter::Trace);
        log::set_logger(Box::leak(Box::new(Self::new(
            severity,
            file_path,
            enable_colors,
        ))))
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.severity
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = Self::timestamp();
        let line = Self::format(&timestamp, record, self.enable_colors);
        let _ = writeln!(std::io::stderr(), "{line}");

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", Self::format(&timestamp, record, false));
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_format_has_no_escape_codes() {
        let line = Logger::format(
            "12:00:00",
            &Record::builder()
                .level(Level::Warn)
                .target("docview_server::handlers")
                .args(format_args!("slow upstream"))
                .build(),
            false,
        );
        assert_eq!(line, "[12:00:00] WARN docview_server::handlers: slow upstream");
    }

    #[test]
    fn file_sink_receives_plain_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("docview.log");
        let logger = Logger::new(Level::Info, Some(path.clone()), true);

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("test")
                .args(format_args!("hello"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("test")
                .args(format_args!("filtered"))
                .build(),
        );
        logger.flush();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.ends_with("INFO test: hello\n"));
        assert!(!written.contains("filtered"));
        assert!(!written.contains('\x1b'));
    }
}
