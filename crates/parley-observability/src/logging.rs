//! Structured logging built on `tracing`.
//!
//! The terminal UI owns stdout/stderr while it runs, so it logs to a file;
//! the CLI logs to stderr.

use std::path::PathBuf;

use parley_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ObservabilityError, Result};

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Owns the background writer; logs are flushed when it is dropped.
#[derive(Debug)]
pub struct LogManager {
    level: String,
    target: LogTarget,
    _guard: WorkerGuard,
}

impl LogManager {
    /// Install the global subscriber. `level_override` wins over the config
    /// level, and `RUST_LOG` wins over both.
    pub fn init(
        config: &LoggingConfig,
        target: LogTarget,
        level_override: Option<&str>,
    ) -> Result<Self> {
        let level = level_override
            .map(str::to_string)
            .unwrap_or_else(|| config.level.to_string());
        let filter = Self::build_filter(&level)?;

        let (writer, guard) = match &target {
            LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogTarget::File(path) => {
                let dir = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."));
                let file_name = path
                    .file_name()
                    .ok_or_else(|| {
                        ObservabilityError::logging(format!("Not a file path: {:?}", path))
                    })?
                    .to_os_string();
                std::fs::create_dir_all(&dir)?;
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
            }
        };
        let ansi = target == LogTarget::Stderr;

        let registry = tracing_subscriber::registry().with(filter);
        let installed = if config.json_format {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_line_number(true)
                        .with_writer(writer),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(ansi)
                        .with_writer(writer),
                )
                .try_init()
        };
        installed.map_err(|e| ObservabilityError::logging(e.to_string()))?;

        tracing::debug!(
            target: "parley_observability",
            "Logging initialized at level {} -> {:?}",
            level,
            target
        );

        Ok(Self {
            level,
            target,
            _guard: guard,
        })
    }

    fn build_filter(level: &str) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn target(&self) -> &LogTarget {
        &self.target
    }
}

/// Span wrapping work on a single conversation
pub fn conversation_span(conversation_id: &str) -> tracing::Span {
    tracing::info_span!("conversation", conversation_id = %conversation_id)
}
