use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output settings resolved from configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level directive, e.g. `debug` or `guild_metrics=trace,info`
    pub level: String,
    /// Production emits JSON lines without ANSI colors
    pub production: bool,
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the configured level when set. The
/// returned guard must be kept alive until exit so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.production {
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(writer))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(writer),
            )
            .init();
    }

    guard
}

/// Map level names used by other logging stacks onto tracing levels.
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "silly" | "verbose" => "trace".to_string(),
        "warning" => "warn".to_string(),
        "" => "trace".to_string(),
        other => other.to_string(),
    }
}
