use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "COINSHOP_LOG";

/// Installs the global `tracing` subscriber, writing to stderr so stdout stays clean for output.
///
/// `COINSHOP_LOG` takes precedence over `level` when set to a valid filter directive.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}
