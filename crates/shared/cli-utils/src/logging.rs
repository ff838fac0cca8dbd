//! Logging configuration types.

use std::path::PathBuf;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Timestamp, level, target and spans.
    #[default]
    Full,
    /// Level and message only.
    Compact,
    /// One JSON object per event, for log aggregation.
    Json,
}

/// Rotation strategy for file logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogRotation {
    /// Rotate every minute.
    Minutely,
    /// Rotate every hour.
    Hourly,
    /// Rotate every day at midnight.
    Daily,
    /// Single file.
    #[default]
    Never,
}

/// Stdout logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdoutLogConfig {
    /// Output format.
    pub format: LogFormat,
}

/// File logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogConfig {
    /// Directory the log files are written into.
    pub directory_path: PathBuf,
    /// Output format.
    pub format: LogFormat,
    /// Rotation strategy.
    pub rotation: LogRotation,
    /// File name prefix, e.g. `tps-bench.log`.
    pub file_name: String,
}

/// Resolved logging configuration.
///
/// Build it from [`LogArgs`](crate::LogArgs) and install it once per process with
/// [`LogConfig::init_tracing_subscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Level applied when `RUST_LOG` does not override it.
    pub global_level: LevelFilter,
    /// Stdout output, `None` when quiet.
    pub stdout_logs: Option<StdoutLogConfig>,
    /// File output, `None` when disabled.
    pub file_logs: Option<FileLogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::INFO,
            stdout_logs: Some(StdoutLogConfig { format: LogFormat::Full }),
            file_logs: None,
        }
    }
}

/// Maps a `-v` count to a level filter.
///
/// 0 disables logging, 1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5 and above=TRACE.
pub const fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
