#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod args;
pub use args::LogArgs;

mod logging;
pub use logging::{
    FileLogConfig, LogConfig, LogFormat, LogRotation, StdoutLogConfig, verbosity_to_level_filter,
};

mod tracing;
pub use tracing::{env_filter, init_test_tracing};

mod runtime;
pub use runtime::shutdown_token;
