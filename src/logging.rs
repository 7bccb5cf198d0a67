//! Logging bootstrap
//!
//! Container internals log through `tracing` under the
//! `inject_container` target. This module wires up a subscriber for
//! binaries that want those logs without configuring `tracing-subscriber`
//! themselves; libraries embedding the container should install their own
//! subscriber instead.
//!
//! Requires the `logging-pretty` or `logging-json` feature; without either,
//! the init functions are no-ops.

use tracing::Level;

/// Output format for the bundled subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable colorful output for development.
    #[default]
    Pretty,
    /// JSON structured output for production log pipelines.
    Json,
}

/// Builder for the bundled subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    container_only: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            container_only: false,
        }
    }
}

impl LoggingBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Use JSON output.
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Use pretty output.
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Only show this crate's logs, filtering everything else out.
    pub fn container_only(mut self) -> Self {
        self.container_only = true;
        self
    }

    /// Install the subscriber with the configured settings.
    #[cfg(any(feature = "logging-pretty", feature = "logging-json"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = if self.container_only {
            EnvFilter::new(format!("inject_container={}", self.level))
        } else {
            EnvFilter::new(self.level.to_string())
        };

        match self.format {
            LogFormat::Json => {
                #[cfg(feature = "logging-json")]
                {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_target(true))
                        .init();
                }
                #[cfg(not(feature = "logging-json"))]
                {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_target(true))
                        .init();
                }
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty().with_target(true))
                    .init();
            }
        }
    }

    /// No-op without a subscriber feature.
    #[cfg(not(any(feature = "logging-pretty", feature = "logging-json")))]
    pub fn init(self) {}
}

/// Create a new logging builder.
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a pretty subscriber at DEBUG level.
pub fn init_pretty() {
    builder().pretty().init();
}

/// Install a JSON subscriber at DEBUG level.
pub fn init_json() {
    builder().json().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(!builder.container_only);
    }

    #[test]
    fn test_builder_chain() {
        let builder = LoggingBuilder::new()
            .with_level(Level::TRACE)
            .json()
            .container_only();

        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.container_only);
    }
}
