use tracing_subscriber::EnvFilter;

/// Logs go to stderr so JSON output on stdout stays clean. `RUST_LOG` is
/// honoured only when debug logging is on.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
