//! Configuration shared by the drover daemon and its tests.
//!
//! Values are resolved by `clap` from command-line flags first, then from
//! `DROVER_*` environment variables, then from built-in defaults.

mod defaults;
mod endpoint;
mod logging;

use std::ffi::OsString;

use clap::Parser;

pub use defaults::{
    DEFAULT_LISTEN, DEFAULT_LOG_FILTER, DEFAULT_PORT, default_endpoints, default_log_filter,
    default_log_format,
};
pub use endpoint::{Endpoint, EndpointError};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(name = "droverd", version, about = "Tagged request/response actor daemon")]
pub struct Config {
    /// Endpoints to listen on, for example `tcp://127.0.0.1:10053`.
    #[arg(
        long = "listen",
        env = "DROVER_LISTEN",
        value_delimiter = ',',
        default_value = DEFAULT_LISTEN
    )]
    listen: Vec<Endpoint>,

    /// Tracing filter expression.
    #[arg(long, env = "DROVER_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// Log output format (`json` or `compact`).
    #[arg(long, env = "DROVER_LOG_FORMAT", default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_endpoints(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the `clap` error describing invalid flags or values. Help and
    /// version requests are also reported through this error.
    pub fn load() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns the `clap` error describing invalid flags or values.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// Replaces the listen endpoints.
    #[must_use]
    pub fn with_listen(mut self, listen: Vec<Endpoint>) -> Self {
        self.listen = listen;
        self
    }

    /// Endpoints the daemon binds.
    #[must_use]
    pub fn listen(&self) -> &[Endpoint] {
        &self.listen
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
