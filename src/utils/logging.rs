use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize logging with tracing
///
/// Reads the filter from the RUST_LOG environment variable when set and
/// falls back to "voxline=debug,warn" otherwise. Call once at process
/// startup; the library itself never installs a subscriber.
///
/// # Example
///
/// ```no_run
/// use voxline::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voxline=debug,warn"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    tracing::info!("Voxline logging initialized");
}
