//! Process-wide `tracing` subscriber.
//!
//! Filtering follows `RUST_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing.
///
/// Logs go to stderr unless `POOLCTL_LOG` names a file path. Log files get
/// unique names so concurrent runs do not clobber each other:
/// `{path}.{timestamp}.{pid}`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = std::env::var("POOLCTL_LOG").ok() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
        return;
    };

    let pid = std::process::id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let unique_path = format!("{}.{}.{}", log_path, timestamp, pid);

    let Ok(file) = std::fs::File::create(&unique_path) else {
        eprintln!("Warning: Failed to create log file: {}", unique_path);
        return;
    };

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();
}
