//! Supervises daemon start-up and shutdown sequencing.

use std::net::SocketAddr;

use tracing::{error, info};

use drover_config::{Config, Endpoint};

use crate::actor::Actor;
use crate::dispatch::builtin_router;
use crate::reactor::Reactor;
use crate::telemetry::{self, TelemetryError};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon until a termination signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when any start-up step fails or the actor cannot
/// be stopped cleanly.
pub fn run_daemon(config: &Config) -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    run_daemon_with(config, &shutdown)
}

/// Runs the daemon, blocking on `shutdown` between start-up and teardown.
///
/// # Errors
///
/// Returns [`LaunchError`] when any start-up step fails or the actor cannot
/// be stopped cleanly.
pub fn run_daemon_with(config: &Config, shutdown: &dyn ShutdownSignal) -> Result<(), LaunchError> {
    telemetry::initialise(config)?;
    info!(
        target: PROCESS_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        "starting daemon runtime"
    );

    let endpoints = resolve_all(config.listen())?;
    let router = builtin_router();
    info!(target: PROCESS_TARGET, events = ?router.events(), "dispatch ready");

    let reactor = Reactor::new().map_err(|source| LaunchError::Reactor { source })?;
    let mut actor = Actor::new(reactor, router)?;
    actor.run(&endpoints)?;

    let waited = shutdown.wait();
    actor.terminate()?;
    waited?;

    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

/// Logs a fatal launch error through telemetry.
///
/// When the configured telemetry is what failed, the default settings are
/// installed instead so the error still reaches stderr.
///
/// # Errors
///
/// Returns [`TelemetryError`] when no subscriber could be installed at all.
pub fn report_failure(config: &Config, failure: &LaunchError) -> Result<(), TelemetryError> {
    telemetry::initialise(config).or_else(|_| telemetry::initialise(&Config::default()))?;
    error!(target: PROCESS_TARGET, error = %failure, "daemon stopped on error");
    Ok(())
}

fn resolve_all(endpoints: &[Endpoint]) -> Result<Vec<SocketAddr>, LaunchError> {
    endpoints
        .iter()
        .map(|endpoint| endpoint.resolve().map_err(LaunchError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::process::ShutdownError;

    #[derive(Default)]
    struct Immediate {
        waits: AtomicUsize,
    }

    impl ShutdownSignal for Immediate {
        fn wait(&self) -> Result<(), ShutdownError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn loopback_config() -> Config {
        Config::default().with_listen(vec![Endpoint::tcp("127.0.0.1", 0)])
    }

    #[test]
    fn completes_after_shutdown_signal() {
        let shutdown = Immediate::default();
        run_daemon_with(&loopback_config(), &shutdown).expect("daemon run");
        assert_eq!(shutdown.waits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolvable_endpoint_fails_before_waiting() {
        let shutdown = Immediate::default();
        let config =
            Config::default().with_listen(vec![Endpoint::tcp("unresolvable.invalid", 1)]);
        let error = run_daemon_with(&config, &shutdown).expect_err("resolution must fail");
        assert!(matches!(error, LaunchError::Endpoint { .. }));
        assert_eq!(shutdown.waits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failure_is_reported_despite_broken_filter() {
        let config = Config::load_from_iter(["droverd", "--log-filter", "droverd=[invalid"])
            .expect("filter is validated by telemetry");
        let failure = LaunchError::from(TelemetryError::Filter("droverd=[invalid".to_owned()));
        report_failure(&config, &failure).expect("fallback telemetry");
    }
}
