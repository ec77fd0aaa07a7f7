use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log level
pub const LOG_LEVEL_ENV: &str = "INDEX_SYNC_LOG_LEVEL";

/// Filter directive in effect: `RUST_LOG`, then `INDEX_SYNC_LOG_LEVEL`, then `config_level`
pub fn filter_directive(config_level: &str) -> String {
    if let Ok(directive) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !directive.trim().is_empty() {
            return directive;
        }
    }
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(level) if !level.trim().is_empty() => level,
        _ => config_level.to_string(),
    }
}

/// Install the global subscriber writing to stderr. Safe to call more than once;
/// later calls are ignored.
pub fn init(config_level: &str) {
    let filter = EnvFilter::try_new(filter_directive(config_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Tracing initialized");
    }
}
