//! Tracing setup.
//!
//! Logging is owned by a [`Telemetry`] handle created once by the binary and
//! passed down explicitly. Dropping the handle (or calling
//! [`Telemetry::shutdown`]) flushes any buffered file output.


use std::path::Path;

use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;
use crate::{RagError, Result};

pub const LOG_FILE_PREFIX: &str = "project-rag.log";

/// Handle for the process-wide tracing subscriber
#[derive(Debug)]
pub struct Telemetry {
    file_guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Install the global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured level. Console output
    /// always goes to stderr so stdout stays free for the stdio tool server.
    #[inline]
    pub fn init(config: &LoggingConfig, log_dir: Option<&Path>) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .map_err(|e| RagError::Config(format!("Invalid log filter '{}': {}", config.level, e)))?;

        let (file_layer, file_guard) = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(file_layer)
            .try_init()
            .map_err(|e| RagError::Config(format!("Telemetry already initialized: {}", e)))?;

        info!(
            file_logging = log_dir.is_some(),
            "Telemetry initialized with level '{}'", config.level
        );

        Ok(Self { file_guard })
    }

    /// Flush buffered output and release the file writer
    #[inline]
    pub fn shutdown(mut self) {
        debug!("Shutting down telemetry");
        drop(self.file_guard.take());
    }
}
