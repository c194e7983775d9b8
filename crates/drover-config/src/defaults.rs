use crate::endpoint::Endpoint;
use crate::logging::LogFormat;

/// Port the daemon listens on when no endpoint is configured.
pub const DEFAULT_PORT: u16 = 10053;

/// Endpoint the daemon listens on when none is configured.
pub const DEFAULT_LISTEN: &str = "tcp://127.0.0.1:10053";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoints used when none are configured.
#[must_use]
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::tcp("127.0.0.1", DEFAULT_PORT)]
}
