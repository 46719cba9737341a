use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "DBMEND_LOG";

const DEFAULT_FILTER: &str = "dbmend=info";

/// Install the global subscriber writing to stderr, so stdout carries only the report.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(json: bool) {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    tracing::debug!(target: "dbmend", json, "logging initialised");
}
