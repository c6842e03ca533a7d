use crate::config::Config;
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, OpenOptions};

/// Route `log` records to the configured log file.
///
/// Best-effort: the terminal belongs to the wrapped command, so failures are
/// silently ignored and the session runs without a logger.
pub fn init(config: &Config) {
    if config.log_level == LevelFilter::Off {
        return;
    }

    if let Some(parent) = config.log_file.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    else {
        return;
    };

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    let _ = WriteLogger::init(config.log_level, log_config, file);
}
