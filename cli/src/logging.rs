//! Tracing setup shared by the binary: `RUST_LOG`-filtered stderr output, plus an
//! optional rolling file appender (same pattern `agentcore`'s own modules assume
//! a host sets up before calling into them).

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use crate::log_format::TextWithSpanIds;

/// Guard returned by [`init`]; drop it only at process exit, or buffered file
/// writes from `tracing-appender`'s non-blocking writer are lost.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes a stderr layer (always) plus, when `log_dir` is given, a daily-rolling
/// file layer under it. Level comes from `RUST_LOG`, defaulting to `info`.
pub fn init(log_dir: Option<&Path>) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(TextWithSpanIds::new())
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agentcore-cli.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
            let layer = tracing_subscriber::fmt::layer()
                .event_format(TextWithSpanIds::new())
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    LoggingGuard { _file_guard: file_guard }
}
