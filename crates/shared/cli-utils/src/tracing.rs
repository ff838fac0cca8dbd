//! Subscriber setup for the benchmark binaries and tests.

use std::{env, io, sync::Once};

use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::{LogConfig, LogFormat, LogRotation};

/// HTTP and RPC client crates that log every request at debug level. A benchmark issues
/// thousands of requests per second, so they are capped at `warn` unless `RUST_LOG` says
/// otherwise.
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "alloy_transport_http=warn",
    "alloy_rpc_client=warn",
];

/// Filter at `level` with noisy client crates capped. `RUST_LOG` directives come last and win.
pub fn env_filter(level: LevelFilter) -> EnvFilter {
    let mut directives = QUIET_DEPENDENCIES.join(",");
    if let Ok(overrides) = env::var(EnvFilter::DEFAULT_ENV) {
        directives.push(',');
        directives.push_str(&overrides);
    }
    EnvFilter::builder().with_default_directive(level.into()).parse_lossy(directives)
}

impl LogConfig {
    /// Installs the global subscriber.
    ///
    /// When file logging is enabled the returned guard flushes the writer on drop and must be
    /// held until the process exits.
    pub fn init_tracing_subscriber(&self) -> eyre::Result<Option<WorkerGuard>> {
        let stdout_layer =
            self.stdout_logs.as_ref().map(|stdout| fmt_layer(stdout.format, io::stdout, true));

        let (file_layer, guard) = match &self.file_logs {
            Some(file) => {
                let rotation = match file.rotation {
                    LogRotation::Minutely => Rotation::MINUTELY,
                    LogRotation::Hourly => Rotation::HOURLY,
                    LogRotation::Daily => Rotation::DAILY,
                    LogRotation::Never => Rotation::NEVER,
                };
                let appender =
                    RollingFileAppender::new(rotation, &file.directory_path, &file.file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(fmt_layer(file.format, writer, false)), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter(self.global_level))
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;
        Ok(guard)
    }
}

fn fmt_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Full => Box::new(base),
        LogFormat::Compact => Box::new(base.compact()),
        LogFormat::Json => Box::new(base.json()),
    }
}

/// Installs a test-writer subscriber once per process, filtered like the binaries at `info`.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter(LevelFilter::INFO))
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_caps_client_crates() {
        let filter = env_filter(LevelFilter::DEBUG).to_string();
        for directive in QUIET_DEPENDENCIES {
            assert!(filter.contains(directive), "{directive} missing from {filter}");
        }
    }

    #[test]
    fn test_init_test_tracing_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
