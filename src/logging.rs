use chrono::Local;
use log::{LevelFilter, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Appends `timestamp [LEVEL] target: message` lines to a file.
pub struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl FileLogger {
    pub fn new(path: &Path, level: LevelFilter) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }

    fn format(record: &Record) -> String {
        format!(
            "{} [{}] {}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl log::Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", Self::format(record));
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn default_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the file logger as the global logger.
pub fn init_file(path: &Path, debug: bool) -> Result<()> {
    let level = default_level(debug);
    let logger = FileLogger::new(path, level)?;
    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| Error::InternalError(format!("logger already installed: {}", e)))?;
    log::set_max_level(level);
    Ok(())
}

/// Installs `env_logger`; `RUST_LOG` still wins over the default level.
pub fn init_env(debug: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level(debug));
    builder.parse_default_env();
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log};

    #[test]
    fn test_file_logger_appends_enabled_records() {
        let path = std::env::temp_dir().join(format!("market-digest-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let logger = FileLogger::new(&path, LevelFilter::Info).unwrap();

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("market_digest::pipeline")
                .args(format_args!("cycle done"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[INFO] market_digest::pipeline: cycle done"));
        assert!(!contents.contains("hidden"));
        let _ = std::fs::remove_file(&path);
    }
}
