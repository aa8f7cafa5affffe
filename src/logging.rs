use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the diagnostic `tracing` subscriber, writing to stderr.
///
/// `filter` is an `EnvFilter` directive such as `warn` or
/// `spotsnap=debug`. An invalid directive falls back to `warn`. Calling this
/// more than once keeps the first subscriber.
pub fn init(filter: &str) {
    let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}
