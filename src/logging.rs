use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Human-readable console output plus a daily-rotated JSON file under logs/.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "funnel_sync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("funnel_sync=info".parse().unwrap()))
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    // The writer guard must outlive main or buffered lines are dropped on exit
    std::mem::forget(guard);
}
