use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with the given log level.
///
/// Log level can be overridden with the `RUST_LOG` environment variable.
/// When `log_file` is set, a second plain-text layer writes to a file rotated
/// at midnight, keeping `backup_count` files.
pub fn init_tracing(default_level: &str, log_file: Option<&Path>, backup_count: usize) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_file.and_then(|path| {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "accounts.log".to_string());

        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .max_log_files(backup_count.max(1))
            .build(dir)
        {
            Ok(appender) => Some(fmt::layer().with_writer(appender).with_ansi(false)),
            Err(e) => {
                eprintln!("failed to open log file {}: {e}", path.display());
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(file_layer)
        .init();
}

/// Initialize tracing for tests (doesn't fail if already initialized).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("accounts=debug")
        .try_init();
}
