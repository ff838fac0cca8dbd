//! Log-related CLI arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::{
    FileLogConfig, LogConfig, LogFormat, LogRotation, StdoutLogConfig, verbosity_to_level_filter,
};

/// Log-related CLI arguments.
///
/// Verbosity levels: 1=ERROR, 2=WARN, 3=INFO (default), 4=DEBUG, 5=TRACE.
/// Use `-q` to suppress stdout logging entirely.
#[derive(Debug, Clone, Parser)]
pub struct LogArgs {
    /// Increase logging verbosity (1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5=TRACE).
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        default_value = "3",
        env = "TPS_LOG_LEVEL",
        global = true
    )]
    pub level: u8,

    /// Suppress stdout logging.
    #[arg(long = "quiet", short = 'q', global = true)]
    pub stdout_quiet: bool,

    /// Stdout log format.
    #[arg(long = "log-format", default_value = "full", env = "TPS_LOG_FORMAT", global = true)]
    pub stdout_format: LogFormat,

    /// Directory for file logging (enables file logging when set).
    #[arg(long = "log-dir", env = "TPS_LOG_DIR", global = true)]
    pub file_directory: Option<PathBuf>,

    /// File log format.
    #[arg(long = "log-file-format", default_value = "json", global = true)]
    pub file_format: LogFormat,

    /// File log rotation strategy.
    #[arg(long = "log-rotation", default_value = "never", global = true)]
    pub file_rotation: LogRotation,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            level: 3,
            stdout_quiet: false,
            stdout_format: LogFormat::Full,
            file_directory: None,
            file_format: LogFormat::Json,
            file_rotation: LogRotation::Never,
        }
    }
}

impl LogArgs {
    /// Resolves the arguments into a [`LogConfig`] writing files named `file_name`.
    pub fn into_config(self, file_name: &str) -> LogConfig {
        let stdout_logs =
            (!self.stdout_quiet).then_some(StdoutLogConfig { format: self.stdout_format });

        let file_logs = self.file_directory.map(|dir| FileLogConfig {
            directory_path: dir,
            format: self.file_format,
            rotation: self.file_rotation,
            file_name: file_name.to_string(),
        });

        LogConfig { global_level: verbosity_to_level_filter(self.level), stdout_logs, file_logs }
    }
}
