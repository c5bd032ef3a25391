use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;
use crate::error::{Result, WsaError};

/// Initializes console output and the rotating JSON log file.
///
/// `RUST_LOG` wins over `config.level`. The returned guard flushes the file
/// writer on drop, so hold it for the life of the process.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wsa_fulfillment={}", config.level)));

    let (file_layer, guard) = if config.enabled {
        fs::create_dir_all(&config.log_dir)?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files.max(1))
            .build(&config.log_dir)
            .map_err(|e| WsaError::Config(format!("Failed to open log file: {}", e)))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().json().with_writer(writer)), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| WsaError::Config(format!("Logging already initialized: {}", e)))?;

    Ok(guard)
}
