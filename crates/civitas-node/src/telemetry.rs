//! Logging initialization.
//!
//! Sets up structured logging with tracing, pretty or JSON, to stderr or
//! to a non-blocking file writer.

use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

// The guard flushes the file writer on drop and must live as long as the process.
static LOG_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(None);

/// Initialize logging from the `[logging]` section.
///
/// `RUST_LOG`, when set, overrides the configured level.
pub fn init_telemetry(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let json = config.format == "json";

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).try_init()?;
            } else {
                tracing_subscriber::registry().with(filter).with(layer).try_init()?;
            }

            if let Ok(mut slot) = LOG_GUARD.lock() {
                *slot = Some(guard);
            }
        }
        None => {
            // stdout carries command output, logs go to stderr
            let layer = fmt::layer().with_writer(std::io::stderr);
            if json {
                tracing_subscriber::registry().with(filter).with(layer.json()).try_init()?;
            } else {
                tracing_subscriber::registry().with(filter).with(layer.pretty()).try_init()?;
            }
        }
    }

    Ok(())
}
