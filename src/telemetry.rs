//! Tracing subscriber setup.
//!
//! Filter comes from `RUST_LOG`, falling back to `recipes_api=info`. Output is
//! text or JSON per `LOG_FORMAT`, written through a non-blocking writer to
//! stdout or to a daily-rolling file under `LOG_DIR`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{Config, LogFormat};

const DEFAULT_FILTER: &str = "recipes_api=info,tower_http=info,warn";

/// Install the global subscriber. Keep the returned guard alive for the life
/// of the process; dropping it flushes buffered log lines.
pub fn init(config: &Config) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    let (writer, guard) = match &config.log_dir {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "recipes_api.log")),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_ansi(config.log_dir.is_none())
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(guard)
}
