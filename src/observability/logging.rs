use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console output plus a JSON log file under `logs/`.
///
/// `RUST_LOG` wins when set; otherwise `debug` picks the crate's level.
pub fn init_logging(debug: bool) {
    // Ensure logs directory exists
    let _ = fs::create_dir_all("logs");

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily("logs", "depot-fetch.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer()
        .with_target(debug)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(std::io::stderr);

    let default_filter = if debug {
        "depot_fetch=debug,info"
    } else {
        "depot_fetch=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // Keep the guard alive for the whole process so the file writer flushes
    std::mem::forget(guard);
}
