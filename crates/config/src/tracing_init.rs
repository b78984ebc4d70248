use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber for a service binary.
///
/// Filter resolution order: `RUST_LOG`, then `LOG_LEVEL`, then the
/// caller's `default_level`. Call once at startup.
pub fn init_tracing(default_level: &str) {
    fmt()
        .with_env_filter(resolve_filter(default_level))
        .with_target(true)
        .init();
}

fn resolve_filter(default_level: &str) -> EnvFilter {
    ["RUST_LOG", "LOG_LEVEL"]
        .iter()
        .find_map(|var| EnvFilter::try_from_env(var).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}
