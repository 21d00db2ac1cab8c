use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "medtime=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
/// Output goes to stderr so command output on stdout stays clean.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
