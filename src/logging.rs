use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs go to stderr so stdout stays CSV.
///
/// `RUST_LOG` wins when set; otherwise `parkpay=info`, or `parkpay=debug`
/// with `verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "parkpay=debug" } else { "parkpay=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
