//! Structured telemetry initialisation for the daemon.
//!
//! Every module logs under its own target, listed in [`TARGETS`], so an
//! operator can raise the level of one layer without drowning in the others:
//!
//! ```text
//! DROVER_LOG_FILTER="info,droverd::channel=debug"
//! ```

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, info, subscriber::SetGlobalDefaultError, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

use drover_config::{Config, LogFormat};

use crate::actor::ACTOR_TARGET;
use crate::channel::CHANNEL_TARGET;
use crate::dispatch::DISPATCH_TARGET;
use crate::process::PROCESS_TARGET;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

const TARGET_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), "::");

/// Log targets emitted by the daemon, one per layer.
pub const TARGETS: [&str; 4] = [ACTOR_TARGET, CHANNEL_TARGET, DISPATCH_TARGET, PROCESS_TARGET];

/// Proof that the global subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber was already installed globally.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state, whatever configuration they pass. Filter directives naming a
/// daemon target that does not exist are reported once the subscriber is up.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] when a foreign subscriber is already set.
///
/// # Examples
///
/// ```rust
/// use drover_config::Config;
/// use droverd::telemetry;
///
/// # fn main() -> Result<(), droverd::telemetry::TelemetryError> {
/// let config = Config::default();
/// let _first = telemetry::initialise(&config)?;
/// let _second = telemetry::initialise(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| {
            let subscriber = build_subscriber(config, io::stderr, io::stderr().is_terminal())?;
            tracing::subscriber::set_global_default(subscriber)
                .map_err(TelemetryError::Subscriber)?;
            info!(
                target: PROCESS_TARGET,
                filter = config.log_filter(),
                format = %config.log_format(),
                "telemetry initialised"
            );
            for target in unknown_targets(config.log_filter()) {
                warn!(
                    target: PROCESS_TARGET,
                    filter_target = target,
                    known = ?TARGETS,
                    "log filter names an unknown target"
                );
            }
            Ok(())
        })
        .map(|_| TelemetryHandle)
}

/// Builds the fmt subscriber described by `config`, writing to `writer`.
fn build_subscriber<W>(
    config: &Config,
    writer: W,
    ansi: bool,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        // The reactor thread name identifies which actor logged.
        .with_thread_names(true)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

/// Daemon targets named by `filter` that no module logs under.
fn unknown_targets(filter: &str) -> Vec<&str> {
    filter
        .split(',')
        .filter_map(|directive| directive.trim().split(['=', '[']).next())
        .filter(|target| target.starts_with(TARGET_PREFIX) && !TARGETS.contains(target))
        .collect()
}
