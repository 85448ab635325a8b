use tracing_subscriber::EnvFilter;

/// An explicit `--log-level` beats `RUST_LOG`, which beats the default.
fn filter(flag: Option<&str>, default: &str) -> EnvFilter {
    match flag {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    }
}

/// Human-readable diagnostics on stderr, so they never mix with rendered views.
pub fn init_cli(flag: Option<&str>, default: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(flag, default))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Structured JSON logs for the long-running mock backend.
pub fn init_daemon(flag: Option<&str>, default: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(flag, default))
        .json()
        .try_init();
}
