use log::{Level, LevelFilter, Log, Metadata, Record};

/// `log` backend writing to the browser devtools console.
pub struct ConsoleLogger {
    pub severity: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(severity: LevelFilter) -> Self {
        Self { severity }
    }

    /// Install the console logger as the global `log` backend.
    pub fn init(severity: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_max_level(severity);
        log::set_logger(Box::leak(Box::new(Self::new(severity))))
    }

    fn format(record: &Record) -> String {
        format!(
            "[{}] {}: {}",
            record.level().as_str(),
            record.target(),
            record.args()
        )
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.severity
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = Self::format(record);
        match record.level() {
            Level::Error => web_sys::console::error_1(&line.into()),
            Level::Warn => web_sys::console::warn_1(&line.into()),
            Level::Info => web_sys::console::info_1(&line.into()),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line.into()),
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_level_target_and_message() {
        let line = ConsoleLogger::format(
            &Record::builder()
                .level(Level::Warn)
                .target("docview_ui::search")
                .args(format_args!("request failed: {}", 500))
                .build(),
        );
        assert_eq!(line, "[WARN] docview_ui::search: request failed: 500");
    }

    #[test]
    fn filters_below_severity() {
        let logger = ConsoleLogger::new(LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
